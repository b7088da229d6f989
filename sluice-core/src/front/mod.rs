pub mod bundle;
pub mod conditional;
pub mod context;
pub mod lit;
pub mod memory;
pub mod pin;
pub mod reg;
pub mod signal;

pub use bundle::{mux_bundle, pack, reg_bundle, reg_bundle_init, reg_hint_bundle, Bundle};
pub use conditional::{enclosing_condition, when, ElseArm};
pub use context::{area, entity, with_ctx, Clock, ClockScope, Design};
pub use lit::{bvec_lit, parse_literal, uint_lit, uint_lit_str};
pub use memory::Memory;
pub use pin::{pin_in, pin_in_bit, pin_in_bvec, pin_in_sint, pin_out, tristate_pin, InputPin, OutputPin, TristatePin};
pub use reg::{
    reg, reg_en, reg_en_init, reg_full, reg_fwd, reg_hint, reg_hint_init, reg_init, synchronize,
};
pub use signal::{cat, keep, mux, prng, sim_assert, tap, BVec, Bit, SInt, SignalValue, Source, UInt};
