use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::ir::clock::ClockId;
use crate::ir::group::GroupId;
use crate::logic::VBits;

#[derive(Copy, Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A reference to one output port of one node. Input ports hold these.
#[derive(Copy, Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct OutputRef {
    pub node: NodeId,
    pub port: usize,
}

impl std::fmt::Debug for OutputRef {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}.{}", self.node, self.port)
    }
}

impl OutputRef {
    pub fn new(node: NodeId, port: usize) -> Self {
        OutputRef { node, port }
    }
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct InputRef {
    pub node: NodeId,
    pub port: usize,
}

/// The connection type of an output port.
#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum ConnectionKind {
    Bit,
    UInt(usize),
    SInt(usize),
    BVec(usize),
}

impl ConnectionKind {
    pub fn width(&self) -> usize {
        match self {
            ConnectionKind::Bit => 1,
            ConnectionKind::UInt(w) | ConnectionKind::SInt(w) | ConnectionKind::BVec(w) => *w,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, ConnectionKind::SInt(_))
    }

    /// Same-width reinterpretation into a raw bit vector.
    pub fn as_bvec(&self) -> ConnectionKind {
        ConnectionKind::BVec(self.width())
    }

    pub fn with_width(&self, width: usize) -> ConnectionKind {
        match self {
            ConnectionKind::Bit => ConnectionKind::BVec(width),
            ConnectionKind::UInt(_) => ConnectionKind::UInt(width),
            ConnectionKind::SInt(_) => ConnectionKind::SInt(width),
            ConnectionKind::BVec(_) => ConnectionKind::BVec(width),
        }
    }

    /// Ports connect when they agree in width; the kind tag is a frontend
    /// property and reinterprets freely across raw/typed boundaries.
    pub fn connectable(&self, other: &ConnectionKind) -> bool {
        self.width() == other.width()
    }
}

impl std::fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConnectionKind::Bit => write!(f, "Bit"),
            ConnectionKind::UInt(w) => write!(f, "UInt<{w}>"),
            ConnectionKind::SInt(w) => write!(f, "SInt<{w}>"),
            ConnectionKind::BVec(w) => write!(f, "BVec<{w}>"),
        }
    }
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum ShiftDir {
    Left,
    Right,
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum ShiftFill {
    Zero,
    One,
    Arithmetic,
    Rotate,
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum ExtendMode {
    Zero,
    One,
    Sign,
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug, Default)]
pub struct RegSettings {
    pub allow_retiming_forward: bool,
    pub allow_retiming_backward: bool,
    pub hint: bool,
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum CollisionPolicy {
    ReadBeforeWrite,
    WriteBeforeRead,
    DontCare,
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum MemoryInit {
    Undefined,
    Zero,
    Random { seed: u64 },
}

/// The node variant sum. Port conventions are fixed per variant and
/// documented on the index constants below.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Constant(VBits),
    Binary(BinaryOp),
    Unary(UnaryOp),
    Compare(CompareOp),
    /// inputs: [sel, when_false, when_true]
    Mux,
    /// inputs: [operand, amount]
    Shift {
        dir: ShiftDir,
        fill: ShiftFill,
    },
    Extend {
        mode: ExtendMode,
        width: usize,
    },
    Slice {
        offset: usize,
        width: usize,
    },
    /// inputs ordered MSB-first
    Concat,
    /// Pure alias; erased during post-processing.
    SignalAlias,
    /// inputs: [data, enable?, reset_value?]; clocks: [clk]
    Register(RegSettings),
    /// Explicit cross-domain glue; clocks: [destination clk]
    Synchronizer {
        stages: usize,
    },
    Memory {
        word_width: usize,
        depth: usize,
        init: MemoryInit,
    },
    /// inputs: [addr, enable?]; outputs: [data]; clocks: [clk]
    ReadPort {
        memory: NodeId,
        sync: bool,
        latency: usize,
        collision: CollisionPolicy,
    },
    /// inputs: [addr, data, enable]; clocks: [clk]
    WritePort {
        memory: NodeId,
    },
    PinInput,
    /// inputs: [value]
    PinOutput,
    /// inputs: [value, output_enable]; outputs: [read_back]
    PinTristate,
    External {
        kind: String,
        params: BTreeMap<String, String>,
    },
    /// Free-running pseudo-random source; clocks: [clk]
    Prng {
        seed: u64,
    },
    /// Simulation-only observation point; inputs: [value]
    Tap,
    /// inputs: [condition]; clocks: [clk]; fires on defined-and-false
    /// and on undefined at the active edge.
    Assertion {
        message: String,
    },
}

pub mod reg_in {
    pub const DATA: usize = 0;
    pub const ENABLE: usize = 1;
    pub const RESET_VALUE: usize = 2;
}

pub mod read_port_in {
    pub const ADDR: usize = 0;
    pub const ENABLE: usize = 1;
}

pub mod write_port_in {
    pub const ADDR: usize = 0;
    pub const DATA: usize = 1;
    pub const ENABLE: usize = 2;
}

pub mod mux_in {
    pub const SEL: usize = 0;
    pub const WHEN_FALSE: usize = 1;
    pub const WHEN_TRUE: usize = 2;
}

pub mod tristate_in {
    pub const VALUE: usize = 0;
    pub const OUTPUT_ENABLE: usize = 1;
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Constant(_) => "constant",
            NodeKind::Binary(BinaryOp::Add) => "add",
            NodeKind::Binary(BinaryOp::Sub) => "sub",
            NodeKind::Binary(BinaryOp::Mul) => "mul",
            NodeKind::Binary(BinaryOp::Div) => "div",
            NodeKind::Binary(BinaryOp::Rem) => "rem",
            NodeKind::Binary(BinaryOp::And) => "and",
            NodeKind::Binary(BinaryOp::Or) => "or",
            NodeKind::Binary(BinaryOp::Xor) => "xor",
            NodeKind::Unary(UnaryOp::Not) => "not",
            NodeKind::Unary(UnaryOp::Neg) => "neg",
            NodeKind::Compare(_) => "compare",
            NodeKind::Mux => "mux",
            NodeKind::Shift {
                fill: ShiftFill::Rotate,
                ..
            } => "rotate",
            NodeKind::Shift { .. } => "shift",
            NodeKind::Extend { .. } => "extend",
            NodeKind::Slice { .. } => "slice",
            NodeKind::Concat => "concat",
            NodeKind::SignalAlias => "signal",
            NodeKind::Register(_) => "register",
            NodeKind::Synchronizer { .. } => "synchronizer",
            NodeKind::Memory { .. } => "memory",
            NodeKind::ReadPort { .. } => "read_port",
            NodeKind::WritePort { .. } => "write_port",
            NodeKind::PinInput => "pin_in",
            NodeKind::PinOutput => "pin_out",
            NodeKind::PinTristate => "pin_tristate",
            NodeKind::External { .. } => "external",
            NodeKind::Prng { .. } => "prng",
            NodeKind::Tap => "tap",
            NodeKind::Assertion { .. } => "assertion",
        }
    }

    /// Combinational nodes re-evaluate whenever an input changes.
    pub fn is_combinational(&self) -> bool {
        matches!(
            self,
            NodeKind::Constant(_)
                | NodeKind::Binary(_)
                | NodeKind::Unary(_)
                | NodeKind::Compare(_)
                | NodeKind::Mux
                | NodeKind::Shift { .. }
                | NodeKind::Extend { .. }
                | NodeKind::Slice { .. }
                | NodeKind::Concat
                | NodeKind::SignalAlias
                | NodeKind::PinOutput
                | NodeKind::PinTristate
                | NodeKind::Tap
        ) || matches!(self, NodeKind::ReadPort { sync: false, .. })
    }

    /// Sequential nodes act as barriers in combinational traversal and
    /// participate in the capture/advance protocol.
    pub fn is_sequential(&self) -> bool {
        matches!(
            self,
            NodeKind::Register(_)
                | NodeKind::Synchronizer { .. }
                | NodeKind::WritePort { .. }
                | NodeKind::Prng { .. }
        ) || matches!(self, NodeKind::ReadPort { sync: true, .. })
    }

    /// Anchors keep themselves (and their input cones) alive through
    /// dead-code elimination.
    pub fn is_anchor(&self) -> bool {
        matches!(
            self,
            NodeKind::PinInput
                | NodeKind::PinOutput
                | NodeKind::PinTristate
                | NodeKind::External { .. }
                | NodeKind::Tap
                | NodeKind::Assertion { .. }
        )
    }

    pub fn input_name(&self, idx: usize) -> &'static str {
        match self {
            NodeKind::Binary(_) | NodeKind::Compare(_) => ["a", "b"].get(idx).copied().unwrap_or("?"),
            NodeKind::Mux => ["sel", "when_false", "when_true"]
                .get(idx)
                .copied()
                .unwrap_or("?"),
            NodeKind::Shift { .. } => ["in", "amount"].get(idx).copied().unwrap_or("?"),
            NodeKind::Register(_) => ["data", "enable", "reset_value"]
                .get(idx)
                .copied()
                .unwrap_or("?"),
            NodeKind::ReadPort { .. } => ["addr", "enable"].get(idx).copied().unwrap_or("?"),
            NodeKind::WritePort { .. } => ["addr", "data", "enable"]
                .get(idx)
                .copied()
                .unwrap_or("?"),
            NodeKind::PinTristate => ["value", "output_enable"].get(idx).copied().unwrap_or("?"),
            _ => "in",
        }
    }

    pub fn output_name(&self, _idx: usize) -> &'static str {
        "out"
    }
}

#[derive(Clone, Debug, Default)]
pub struct NodeMeta {
    pub name: Option<String>,
    pub comment: Option<String>,
    /// Construction site, captured from the frontend caller.
    pub site: Option<&'static std::panic::Location<'static>>,
}

impl NodeMeta {
    pub fn site_string(&self) -> String {
        match self.site {
            Some(loc) => format!("{}:{}", loc.file(), loc.line()),
            None => "<unknown site>".into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub inputs: SmallVec<[Option<OutputRef>; 4]>,
    pub outputs: SmallVec<[ConnectionKind; 2]>,
    pub clocks: SmallVec<[Option<ClockId>; 1]>,
    pub group: GroupId,
    pub meta: NodeMeta,
    /// Explicit liveness override for dead-code elimination.
    pub keep: bool,
}

impl Node {
    pub fn label(&self) -> String {
        crate::error::node_label(self.id, self.meta.name.as_deref(), self.kind.type_name())
    }

    pub fn input(&self, idx: usize) -> Option<OutputRef> {
        self.inputs.get(idx).copied().flatten()
    }

    pub fn clock(&self, idx: usize) -> Option<ClockId> {
        self.clocks.get(idx).copied().flatten()
    }

    pub fn output_kind(&self, port: usize) -> ConnectionKind {
        self.outputs[port]
    }

    /// Sanity check of the per-variant port conventions.
    pub fn assert_valid(&self) -> Result<(), String> {
        let (want_in, want_out, want_clk) = match &self.kind {
            NodeKind::Constant(_) => (0, 1, 0),
            NodeKind::Binary(_) | NodeKind::Compare(_) | NodeKind::Shift { .. } => (2, 1, 0),
            NodeKind::Unary(_)
            | NodeKind::Extend { .. }
            | NodeKind::Slice { .. }
            | NodeKind::SignalAlias
            | NodeKind::Tap => (1, self.outputs.len(), 0),
            NodeKind::Mux => (3, 1, 0),
            NodeKind::Concat => (self.inputs.len(), 1, 0),
            NodeKind::Register(_) => (3, 1, 1),
            NodeKind::Synchronizer { .. } => (1, 1, 1),
            NodeKind::Memory { .. } => (0, 0, 0),
            NodeKind::ReadPort { .. } => (2, 1, 1),
            NodeKind::WritePort { .. } => (3, 0, 1),
            NodeKind::PinInput => (0, 1, 0),
            NodeKind::PinOutput => (1, 0, 0),
            NodeKind::PinTristate => (2, 1, 0),
            NodeKind::External { .. } => (self.inputs.len(), self.outputs.len(), self.clocks.len()),
            NodeKind::Prng { .. } => (0, 1, 1),
            NodeKind::Assertion { .. } => (1, 0, 1),
        };
        if self.inputs.len() != want_in {
            return Err(format!(
                "{} expects {want_in} inputs, has {}",
                self.label(),
                self.inputs.len()
            ));
        }
        if self.outputs.len() != want_out {
            return Err(format!(
                "{} expects {want_out} outputs, has {}",
                self.label(),
                self.outputs.len()
            ));
        }
        if self.clocks.len() != want_clk {
            return Err(format!(
                "{} expects {want_clk} clock ports, has {}",
                self.label(),
                self.clocks.len()
            ));
        }
        Ok(())
    }
}
