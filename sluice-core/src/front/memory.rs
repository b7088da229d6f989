//! Hardware memory blocks. The frontend builds asynchronous read ports
//! and enabled write ports; post-processing fuses registered addresses
//! into synchronous block-ram ports.

use crate::front::conditional::enclosing_condition;
use crate::front::context::with_ctx;
use crate::front::signal::{new_node, BVec, Bit, SignalValue, UInt};
use crate::ir::node::{
    CollisionPolicy, ConnectionKind, MemoryInit, NodeId, NodeKind, OutputRef,
};

#[derive(Copy, Clone, Debug)]
pub struct Memory {
    node: NodeId,
    word_width: usize,
    depth: usize,
}

impl Memory {
    #[track_caller]
    pub fn new(depth: usize, word_width: usize) -> Memory {
        Memory::with_init(depth, word_width, MemoryInit::Undefined)
    }

    #[track_caller]
    pub fn with_init(depth: usize, word_width: usize, init: MemoryInit) -> Memory {
        let node = new_node(
            NodeKind::Memory {
                word_width,
                depth,
                init,
            },
            &[],
            &[],
        );
        Memory {
            node,
            word_width,
            depth,
        }
    }

    pub fn id(&self) -> NodeId {
        self.node
    }

    pub fn word_width(&self) -> usize {
        self.word_width
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn set_name(self, name: impl Into<String>) -> Self {
        with_ctx(|ctx| ctx.circuit.node_mut(self.node).meta.name = Some(name.into()));
        self
    }

    /// Combinational read of the addressed word. The port takes the
    /// current clock scope so later passes can promote it to a
    /// synchronous block-ram port.
    #[track_caller]
    pub fn read(&self, addr: UInt) -> BVec {
        let n = new_node(
            NodeKind::ReadPort {
                memory: self.node,
                sync: false,
                latency: 0,
                collision: CollisionPolicy::DontCare,
            },
            &[Some(addr.read()), None],
            &[ConnectionKind::BVec(self.word_width)],
        );
        self.attach_clock(n);
        BVec::from_expr(OutputRef::new(n, 0))
    }

    /// Writes the addressed word. The write enable is the enclosing
    /// conditional scope, so `when(c, || mem.write(..))` behaves as a
    /// guarded write.
    #[track_caller]
    pub fn write(&self, addr: UInt, value: BVec) {
        let enable = enclosing_condition();
        self.write_en(addr, value, enable);
    }

    #[track_caller]
    pub fn write_en(&self, addr: UInt, value: BVec, enable: Bit) {
        let n = new_node(
            NodeKind::WritePort { memory: self.node },
            &[Some(addr.read()), Some(value.read()), Some(enable.read())],
            &[],
        );
        self.attach_clock(n);
    }

    fn attach_clock(&self, port: NodeId) {
        with_ctx(|ctx| {
            let clk = match ctx.current_clock() {
                Ok(c) => c,
                Err(e) => panic!("{e}"),
            };
            ctx.circuit.node_mut(port).clocks.push(Some(clk));
        });
    }
}
