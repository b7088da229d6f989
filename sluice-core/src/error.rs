use miette::Diagnostic;
use thiserror::Error;

use crate::ir::node::NodeId;

/// Top-level error of the framework. Everything the public API can fail
/// with converts into this.
#[derive(Error, Debug, Diagnostic)]
pub enum SluiceError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Design(#[from] DesignError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Pass(#[from] PassError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Sim(#[from] SimError),
}

/// Construction-time errors. These carry the construction site of the
/// offending node so the user can find the frontend statement at fault.
#[derive(Error, Debug, Diagnostic)]
pub enum DesignError {
    #[error("type mismatch connecting {src_ty} to {dst_ty} at input '{input}' of {node} ({site})")]
    #[diagnostic(help("connected ports must agree in kind and bit width"))]
    TypeMismatch {
        node: String,
        input: String,
        src_ty: String,
        dst_ty: String,
        site: String,
    },
    #[error("input '{input}' of {node} is already connected ({site})")]
    AlreadyConnected {
        node: String,
        input: String,
        site: String,
    },
    #[error("{node} has no input port {port}")]
    NoSuchInput { node: String, port: usize },
    #[error("{node} has no output port {port}")]
    NoSuchOutput { node: String, port: usize },
    #[error("operand widths differ: {lhs} vs {rhs} ({site})")]
    #[diagnostic(help("extend or truncate one operand first"))]
    WidthMismatch {
        lhs: usize,
        rhs: usize,
        site: String,
    },
    #[error("operation requires operands of the same signedness: {lhs} vs {rhs} ({site})")]
    SignednessMismatch {
        lhs: String,
        rhs: String,
        site: String,
    },
    #[error("no clock scope is active; registers and memory ports need an enclosing clock scope")]
    NoClockScope,
    #[error("no design context is active on this thread")]
    NoDesignContext,
    #[error("a design context is already active on this thread")]
    NestedDesignContext,
    #[error("malformed literal '{literal}': {reason}")]
    MalformedLiteral { literal: String, reason: String },
    #[error("slice [{offset}+:{width}] is out of range for a {operand_width} bit operand ({site})")]
    SliceOutOfRange {
        offset: usize,
        width: usize,
        operand_width: usize,
        site: String,
    },
    #[error("extension to {new_width} bits would narrow a {old_width} bit value ({site})")]
    ExtensionNarrows {
        old_width: usize,
        new_width: usize,
        site: String,
    },
    #[error("input pins may only be driven from the simulation; {pin} cannot take a driver")]
    PinNotDrivable { pin: String },
    #[error("the fifo was already generated; no further ports may be attached")]
    FifoSealed,
    #[error("combinational Ready depends on Valid of the same stream")]
    #[diagnostic(help("insert a decoupling register to break the handshake loop"))]
    HandshakeCycle,
    #[error("fifo depth must be at least 2, got {depth}")]
    FifoTooShallow { depth: usize },
}

/// Post-processing errors. A pass either succeeds, logs an advisory, or
/// fails the whole pipeline with one of these.
#[derive(Error, Debug, Diagnostic)]
pub enum PassError {
    #[error("combinational cycle through {}", witness.join(" -> "))]
    #[diagnostic(help("insert a register on the feedback path"))]
    CombinationalCycle { witness: Vec<String> },
    #[error("unsynchronised clock-domain crossing into {node}: driven from domain '{from}' but clocked by '{to}'")]
    #[diagnostic(help("route the value through an explicit synchronizer"))]
    ClockDomainCrossing {
        node: String,
        from: String,
        to: String,
    },
    #[error("sequential node {node} has no clock after post-processing")]
    MissingClock { node: String },
    #[error("retiming failed: {reason}")]
    RetimingFailed { reason: String },
    #[error("technology mapping hook failed: {reason}")]
    TechMappingFailed { reason: String },
    #[error("pass '{pass}' internal error: {reason}")]
    Internal { pass: &'static str, reason: String },
}

/// Simulation-time failures. Undefined values are not errors by
/// themselves; they become one when an assertion samples them.
#[derive(Error, Debug, Diagnostic)]
pub enum SimError {
    #[error("assertion '{message}' failed at {time_ps} ps ({site})")]
    AssertionFailed {
        message: String,
        time_ps: u64,
        site: String,
    },
    #[error("assertion '{message}' witnessed undefined at {time_ps} ps ({site})")]
    #[diagnostic(help("the asserted condition evaluated to an undefined bit"))]
    AssertionUndefined {
        message: String,
        time_ps: u64,
        site: String,
    },
    #[error("simulation check failed at {time_ps} ps: {message}")]
    CheckFailed { message: String, time_ps: u64 },
    #[error("simulation stopped by request at {time_ps} ps")]
    Stopped { time_ps: u64 },
    #[error("evaluation plan error: {reason}")]
    PlanError { reason: String },
    #[error("cannot poke {node}: only input pins may be driven")]
    NotAnInputPin { node: String },
}

impl SimError {
    pub fn is_stop(&self) -> bool {
        matches!(self, SimError::Stopped { .. })
    }
}

pub(crate) fn node_label(id: NodeId, name: Option<&str>, type_name: &str) -> String {
    match name {
        Some(n) => format!("{type_name} '{n}' ({id:?})"),
        None => format!("{type_name} ({id:?})"),
    }
}
