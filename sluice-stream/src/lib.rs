pub mod fifo;
pub mod sim_helpers;
pub mod stream;

pub use fifo::{DualClockFifo, Fifo, FifoArray, FifoLatency, TransactionalFifo};
pub use sim_helpers::{
    expose_input_stream, expose_output_stream, PacketReceiver, PacketSender, RxStreamPins,
    SimPacket, TxStreamPins,
};
pub use stream::{check_handshake, fifo_stream, reg_decouple, Stream};
