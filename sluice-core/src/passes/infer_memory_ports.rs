//! Memory-port inference. An asynchronous read whose address comes out
//! of a plain register in the port's own clock domain is fused into a
//! synchronous block-ram read of latency 1; if its data output feeds
//! only registers of the same shape, one of them is absorbed as the
//! output stage (latency 2). Fused reads adopt the read-before-write
//! collision policy, the behaviour of the absorbed address register.

use crate::error::PassError;
use crate::ir::circuit::Circuit;
use crate::ir::node::{read_port_in, reg_in, CollisionPolicy, NodeId, NodeKind, OutputRef};
use crate::ir::subnet::Subnet;
use crate::passes::pass::Pass;
use crate::report::Reporter;

pub struct InferMemoryPorts;

impl Pass for InferMemoryPorts {
    fn name(&self) -> &'static str {
        "infer_memory_ports"
    }

    fn run(
        &self,
        circuit: &mut Circuit,
        subnet: &Subnet,
        reporter: &mut Reporter,
    ) -> Result<(), PassError> {
        for id in circuit.node_ids() {
            if !subnet.contains(id) || !circuit.contains(id) {
                continue;
            }
            let node = circuit.node(id);
            let NodeKind::ReadPort { sync: false, .. } = node.kind else {
                continue;
            };
            if fuse_address_register(circuit, id) {
                reporter.info(
                    "infer_memory_ports",
                    format!("fused registered address into {}", circuit.node(id).label()),
                );
                fuse_output_register(circuit, id);
            }
        }
        Ok(())
    }
}

/// A register is absorbable when it has no enable, no retiming hint
/// role, and sits in the same clock domain as the port.
fn absorbable_register(circuit: &Circuit, reg: NodeId, port_clk: Option<NodeId>) -> bool {
    let node = circuit.node(reg);
    let NodeKind::Register(settings) = node.kind else {
        return false;
    };
    if settings.hint || node.input(reg_in::ENABLE).is_some() {
        return false;
    }
    let (Some(rc), Some(pc)) = (node.clock(0), port_clk.and_then(|p| circuit.node(p).clock(0)))
    else {
        return false;
    };
    circuit.clocks_equivalent(rc, pc)
}

fn fuse_address_register(circuit: &mut Circuit, port: NodeId) -> bool {
    let Some(addr) = circuit.node(port).input(read_port_in::ADDR) else {
        return false;
    };
    if !absorbable_register(circuit, addr.node, Some(port)) {
        return false;
    }
    let Some(pre_reg_addr) = circuit.node(addr.node).input(reg_in::DATA) else {
        return false;
    };
    let reg = addr.node;
    if let Err(e) = circuit.rebind(pre_reg_addr, port, read_port_in::ADDR) {
        log::debug!(target: "sluice", "address fuse skipped: {e}");
        return false;
    }
    if let NodeKind::ReadPort {
        sync, latency, collision, ..
    } = &mut circuit.node_mut(port).kind
    {
        *sync = true;
        *latency = 1;
        *collision = CollisionPolicy::ReadBeforeWrite;
    }
    // the register survives only for other consumers
    if circuit.consumers_of(addr).is_empty() {
        circuit.remove_node(reg);
    }
    true
}

/// Absorbs a single output register into the port as a second latency
/// stage, when every consumer of the read data is such a register.
fn fuse_output_register(circuit: &mut Circuit, port: NodeId) {
    let data = OutputRef::new(port, 0);
    let consumers = circuit.consumers_of(data);
    if consumers.is_empty() {
        return;
    }
    let all_regs = consumers.iter().all(|c| {
        c.port == reg_in::DATA && absorbable_register(circuit, c.node, Some(port))
    });
    if !all_regs {
        return;
    }
    // rewire each consumer register's consumers straight to the port
    for c in consumers {
        circuit.bypass_output_to_input(c.node, 0, reg_in::DATA);
        circuit.remove_node(c.node);
    }
    if let NodeKind::ReadPort { latency, .. } = &mut circuit.node_mut(port).kind {
        *latency = 2;
    }
}
