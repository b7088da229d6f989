pub use sluice_core::front::pin::{InputPin, OutputPin, TristatePin};
pub use sluice_core::front::with_ctx;
pub use sluice_core::passes::strip_signal_aliases::StripSignalAliases;
pub use sluice_core::{
    area, bvec_lit, cat, enclosing_condition, entity, keep, mux, mux_bundle, pack, pin_in, prng,
    pin_in_bit, pin_in_bvec, pin_in_sint, pin_out, postprocess, reg, reg_bundle, reg_bundle_init,
    reg_en, reg_en_init, reg_full, reg_fwd, reg_hint, reg_hint_init, reg_init,
    retime_backward_from_input, retime_forward_to_output, sim_assert, synchronize, tap,
    tristate_pin, uint_lit, uint_lit_str, when, BVec, Bit, Bundle, Circuit, Clock, ClockConfig,
    ClockId, ConfigValue, ConnectionKind, Design, DesignError, Memory, MemoryResetPolicy,
    Namespace, NodeId, NodeKind, OutputRef, Pass, PassError, Postprocess, Probe, RegSettings,
    Reporter, ResetActive, ResetKind, RetimeOptions, SInt, SignalValue, SimError, SimIo,
    SimProcess, SimTime, Simulation, SluiceError, Source, Subnet, Suspend, TechMapper,
    TriggerEdge, UInt, VBits, WaveRecorder,
};
pub use sluice_core::{ns, ps, us};
pub use sluice_stream::{
    check_handshake, expose_input_stream, expose_output_stream, fifo_stream, reg_decouple,
    DualClockFifo, Fifo, FifoArray, FifoLatency, PacketReceiver, PacketSender, RxStreamPins,
    SimPacket, Stream, TransactionalFifo, TxStreamPins,
};
