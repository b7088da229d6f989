//! Reset and enable fold-in. A register enabled by constant-1 loses its
//! enable; a register whose reset value equals its quiescent (constant)
//! input loses its reset; a register enabled by constant-0 degenerates
//! to its reset value.

use crate::error::PassError;
use crate::ir::circuit::Circuit;
use crate::ir::node::{reg_in, NodeKind, OutputRef};
use crate::ir::subnet::Subnet;
use crate::logic::VBits;
use crate::passes::pass::Pass;
use crate::report::Reporter;

pub struct FoldResetEnable;

impl Pass for FoldResetEnable {
    fn name(&self) -> &'static str {
        "fold_reset_enable"
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
            if !matches!(node.kind, NodeKind::Register(_)) {
                continue;
            }

            if let Some(enable) = node.input(reg_in::ENABLE) {
                match constant_of(circuit, enable).and_then(|v| v.as_bool()) {
                    Some(true) => circuit.disconnect(id, reg_in::ENABLE),
                    Some(false) => {
                        // never updates: the register is its reset value
                        let label = circuit.node(id).label();
                        reporter.warning(
                            "fold_reset_enable",
                            format!("{label} has a constant-0 enable and never loads"),
                        );
                        let w = circuit.node(id).outputs[0].width();
                        let frozen = circuit
                            .node(id)
                            .input(reg_in::RESET_VALUE)
                            .and_then(|r| constant_of(circuit, r))
                            .unwrap_or_else(|| VBits::undef(w));
                        let node = circuit.node_mut(id);
                        node.kind = NodeKind::Constant(frozen);
                        node.inputs.clear();
                        node.clocks.clear();
                        continue;
                    }
                    None => {}
                }
            }

            let node = circuit.node(id);
            if let (Some(reset), Some(data)) =
                (node.input(reg_in::RESET_VALUE), node.input(reg_in::DATA))
            {
                let rv = constant_of(circuit, reset);
                let dv = constant_of(circuit, data);
                if let (Some(rv), Some(dv)) = (rv, dv) {
                    if rv == dv {
                        circuit.disconnect(id, reg_in::RESET_VALUE);
                    }
                }
            }
        }
        Ok(())
    }
}

fn constant_of(circuit: &Circuit, src: OutputRef) -> Option<VBits> {
    match &circuit.node(src.node).kind {
        NodeKind::Constant(v) => Some(v.clone()),
        _ => None,
    }
}
