//! Boundary pins. Input pins are driven only by the simulation or the
//! outside world; output pins anchor their input cone.

use crate::front::context::with_ctx;
use crate::front::signal::{new_node, BVec, Bit, SInt, SignalValue, UInt};
use crate::ir::node::{ConnectionKind, NodeId, NodeKind, OutputRef};

#[derive(Copy, Clone, Debug)]
pub struct InputPin {
    node: NodeId,
    kind: ConnectionKind,
}

impl InputPin {
    pub fn id(&self) -> NodeId {
        self.node
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    pub fn set_name(self, name: impl Into<String>) -> Self {
        with_ctx(|ctx| ctx.circuit.node_mut(self.node).meta.name = Some(name.into()));
        self
    }

    #[track_caller]
    pub fn uint(&self) -> UInt {
        UInt::from_expr(OutputRef::new(self.node, 0))
    }

    #[track_caller]
    pub fn sint(&self) -> SInt {
        SInt::from_expr(OutputRef::new(self.node, 0))
    }

    #[track_caller]
    pub fn bvec(&self) -> BVec {
        BVec::from_expr(OutputRef::new(self.node, 0))
    }

    #[track_caller]
    pub fn bit(&self) -> Bit {
        Bit::from_expr(OutputRef::new(self.node, 0))
    }
}

#[derive(Copy, Clone, Debug)]
pub struct OutputPin {
    node: NodeId,
}

impl OutputPin {
    pub fn id(&self) -> NodeId {
        self.node
    }

    pub fn set_name(self, name: impl Into<String>) -> Self {
        with_ctx(|ctx| ctx.circuit.node_mut(self.node).meta.name = Some(name.into()));
        self
    }
}

#[derive(Copy, Clone, Debug)]
pub struct TristatePin {
    node: NodeId,
}

impl TristatePin {
    pub fn id(&self) -> NodeId {
        self.node
    }

    pub fn set_name(self, name: impl Into<String>) -> Self {
        with_ctx(|ctx| ctx.circuit.node_mut(self.node).meta.name = Some(name.into()));
        self
    }

    /// The externally driven read-back value.
    #[track_caller]
    pub fn read_back(&self) -> BVec {
        BVec::from_expr(OutputRef::new(self.node, 0))
    }
}

#[track_caller]
fn pin_in_kind(kind: ConnectionKind) -> InputPin {
    let node = new_node(NodeKind::PinInput, &[], &[kind]);
    InputPin { node, kind }
}

/// An unsigned-vector input pin of the given width.
#[track_caller]
pub fn pin_in(width: usize) -> InputPin {
    pin_in_kind(ConnectionKind::UInt(width))
}

#[track_caller]
pub fn pin_in_bit() -> InputPin {
    pin_in_kind(ConnectionKind::Bit)
}

#[track_caller]
pub fn pin_in_bvec(width: usize) -> InputPin {
    pin_in_kind(ConnectionKind::BVec(width))
}

#[track_caller]
pub fn pin_in_sint(width: usize) -> InputPin {
    pin_in_kind(ConnectionKind::SInt(width))
}

/// Exposes a value at the design boundary.
#[track_caller]
pub fn pin_out<T: SignalValue>(sig: T) -> OutputPin {
    let node = new_node(NodeKind::PinOutput, &[Some(sig.read())], &[]);
    OutputPin { node }
}

/// A bidirectional pin: drives `value` while `output_enable` is high,
/// reads back the external level otherwise.
#[track_caller]
pub fn tristate_pin(value: BVec, output_enable: Bit) -> TristatePin {
    let w = value.width();
    let node = new_node(
        NodeKind::PinTristate,
        &[Some(value.read()), Some(output_enable.read())],
        &[ConnectionKind::BVec(w)],
    );
    TristatePin { node }
}
