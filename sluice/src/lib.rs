//! Facade crate: one `use sluice::prelude::*` pulls in the whole
//! frontend, the pass pipeline, the simulator and the stream library.

pub use sluice_core;
pub use sluice_stream;

pub mod prelude;
