//! Dead-code elimination. A node survives iff it lies on a path to an
//! anchor: a pin, assertion, tap, external node, or an explicit keep
//! flag. Memory write ports are live exactly when their memory feeds a
//! live read port.

use fnv::FnvHashSet;

use crate::error::PassError;
use crate::ir::circuit::Circuit;
use crate::ir::node::{NodeId, NodeKind};
use crate::ir::subnet::Subnet;
use crate::passes::pass::Pass;
use crate::report::Reporter;

pub struct EliminateDeadCode;

impl Pass for EliminateDeadCode {
    fn name(&self) -> &'static str {
        "eliminate_dead_code"
    }

    fn run(
        &self,
        circuit: &mut Circuit,
        subnet: &Subnet,
        reporter: &mut Reporter,
    ) -> Result<(), PassError> {
        let live = mark_live(circuit);
        let mut removed = 0usize;
        for id in circuit.node_ids() {
            if !subnet.contains(id) || live.contains(&id) {
                continue;
            }
            circuit.remove_node(id);
            removed += 1;
        }
        if removed > 0 {
            reporter.info("eliminate_dead_code", format!("removed {removed} dead nodes"));
        }
        Ok(())
    }
}

pub(crate) fn mark_live(circuit: &Circuit) -> FnvHashSet<NodeId> {
    let mut live: FnvHashSet<NodeId> = FnvHashSet::default();
    let mut worklist: Vec<NodeId> = circuit
        .iter_nodes()
        .filter(|n| n.kind.is_anchor() || n.keep)
        .map(|n| n.id)
        .collect();

    loop {
        while let Some(id) = worklist.pop() {
            if !live.insert(id) {
                continue;
            }
            let node = circuit.node(id);
            for input in node.inputs.iter().flatten() {
                if !live.contains(&input.node) {
                    worklist.push(input.node);
                }
            }
            // a live read port keeps its memory
            if let NodeKind::ReadPort { memory, .. } = node.kind {
                if !live.contains(&memory) {
                    worklist.push(memory);
                }
            }
        }
        // writes into a live memory are observable through its reads
        let mut grew = false;
        for node in circuit.iter_nodes() {
            if let NodeKind::WritePort { memory } = node.kind {
                if live.contains(&memory) && !live.contains(&node.id) {
                    worklist.push(node.id);
                    grew = true;
                }
            }
        }
        if !grew {
            return live;
        }
    }
}
