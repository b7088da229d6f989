pub mod config;
pub mod error;
pub mod export;
pub mod front;
pub mod ir;
pub mod logic;
pub mod passes;
pub mod report;
pub mod sim;

pub use config::{ConfigTree, ConfigValue};
pub use error::{DesignError, PassError, SimError, SluiceError};
pub use export::RtlBackend;
pub use front::bundle::{mux_bundle, pack, reg_bundle, reg_bundle_init, reg_hint_bundle, Bundle};
pub use front::conditional::{enclosing_condition, when};
pub use front::context::{area, entity, Clock, ClockScope, Design};
pub use front::lit::{bvec_lit, uint_lit, uint_lit_str};
pub use front::memory::Memory;
pub use front::pin::{
    pin_in, pin_in_bit, pin_in_bvec, pin_in_sint, pin_out, tristate_pin, InputPin, OutputPin,
    TristatePin,
};
pub use front::reg::{
    reg, reg_en, reg_en_init, reg_full, reg_fwd, reg_hint, reg_hint_init, reg_init, synchronize,
};
pub use front::signal::{
    cat, keep, mux, prng, sim_assert, tap, BVec, Bit, SInt, SignalValue, Source, UInt,
};
pub use ir::circuit::{Circuit, Namespace};
pub use ir::clock::{ClockConfig, ClockId, MemoryResetPolicy, ResetActive, ResetKind, TriggerEdge};
pub use ir::node::{ConnectionKind, NodeId, NodeKind, OutputRef, RegSettings};
pub use ir::subnet::Subnet;
pub use logic::VBits;
pub use passes::{
    postprocess, retime_backward_from_input, retime_forward_to_output, Pass, Postprocess,
    RetimeOptions, TechMapper,
};
pub use report::{ReportEntry, ReportSink, Reporter, RichContent, Severity};
pub use sim::{ns, ps, us, Probe, SimIo, SimProcess, SimTime, Simulation, Suspend, WaveRecorder};
