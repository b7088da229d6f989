pub mod eval;
pub mod memory;
pub mod plan;
pub mod process;
pub mod scheduler;
pub mod wave;

pub use memory::MemoryStorage;
pub use plan::{EvalPlan, SimState};
pub use process::{ns, ps, us, SimProcess, SimTime, Suspend};
pub use scheduler::{Probe, SimIo, Simulation};
pub use wave::WaveRecorder;
