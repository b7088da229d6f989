//! Cooperative simulation processes. A process is a value that the
//! scheduler advances by calling `resume`; the returned suspension
//! names the event that wakes it next. Closures with captured state
//! are admitted through the blanket impl.

use num_rational::Ratio;

use crate::ir::clock::ClockId;
use crate::sim::scheduler::SimIo;

/// Simulation time and durations, in exact rational picoseconds.
pub type SimTime = Ratio<u128>;

pub fn ps(n: u128) -> SimTime {
    Ratio::from_integer(n)
}

pub fn ns(n: u128) -> SimTime {
    Ratio::from_integer(n * 1_000)
}

pub fn us(n: u128) -> SimTime {
    Ratio::from_integer(n * 1_000_000)
}

/// Why a process is suspended.
#[derive(Clone, Debug, PartialEq)]
pub enum Suspend {
    /// Resume at the next active edge of this clock.
    OnClk(ClockId),
    /// Resume after the given duration. A zero duration resumes within
    /// the same event, after combinational convergence.
    WaitFor(SimTime),
    /// Resume within the same event once the combinational cone has
    /// converged.
    Settle,
    /// The process is finished.
    Done,
}

pub trait SimProcess {
    fn resume(&mut self, io: &mut SimIo<'_>) -> Suspend;
}

impl<F> SimProcess for F
where
    F: FnMut(&mut SimIo<'_>) -> Suspend,
{
    fn resume(&mut self, io: &mut SimIo<'_>) -> Suspend {
        self(io)
    }
}
