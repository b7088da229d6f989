//! Constant propagation. Combinational nodes whose inputs are all
//! constants fold into constants; the algebraic identities over one
//! constant operand rewrite to the surviving operand or the absorbing
//! constant.

use crate::error::PassError;
use crate::ir::circuit::Circuit;
use crate::ir::node::{mux_in, BinaryOp, NodeId, NodeKind, OutputRef};
use crate::ir::subnet::Subnet;
use crate::logic::VBits;
use crate::passes::pass::Pass;
use crate::report::Reporter;
use crate::sim::eval::fold_constant;

pub struct PropagateConstants;

impl Pass for PropagateConstants {
    fn name(&self) -> &'static str {
        "propagate_constants"
    }

    fn run(
        &self,
        circuit: &mut Circuit,
        subnet: &Subnet,
        _reporter: &mut Reporter,
    ) -> Result<(), PassError> {
        let mut changed = true;
        while changed {
            changed = false;
            for id in circuit.node_ids() {
                if !subnet.contains(id) || !circuit.contains(id) {
                    continue;
                }
                if try_fold(circuit, id) || try_identity(circuit, id) {
                    changed = true;
                }
            }
        }
        Ok(())
    }
}

fn constant_input(circuit: &Circuit, src: OutputRef) -> Option<VBits> {
    match &circuit.node(src.node).kind {
        NodeKind::Constant(v) => Some(v.clone()),
        _ => None,
    }
}

/// Full fold: every input constant. The node is rewritten in place into
/// a constant, keeping its identity and name.
fn try_fold(circuit: &mut Circuit, id: NodeId) -> bool {
    let node = circuit.node(id);
    if matches!(node.kind, NodeKind::Constant(_)) || !node.kind.is_combinational() {
        return false;
    }
    if node.inputs.iter().any(|i| i.is_none()) && !matches!(node.kind, NodeKind::Concat) {
        return false;
    }
    let mut values = Vec::with_capacity(node.inputs.len());
    for input in node.inputs.iter().flatten() {
        match constant_input(circuit, *input) {
            Some(v) => values.push(v),
            None => return false,
        }
    }
    let Some(folded) = fold_constant(circuit, node, &values) else {
        return false;
    };
    let node = circuit.node_mut(id);
    node.kind = NodeKind::Constant(folded);
    node.inputs.clear();
    true
}

/// Replaces all consumers of `id`'s single output with `driver` and
/// removes the node.
fn replace_with(circuit: &mut Circuit, id: NodeId, driver: OutputRef) {
    let src = OutputRef::new(id, 0);
    for consumer in circuit.consumers_of(src) {
        circuit.node_mut(consumer.node).inputs[consumer.port] = Some(driver);
    }
    let name = circuit.node(id).meta.name.clone();
    if let Some(name) = name {
        let producer = circuit.node_mut(driver.node);
        if producer.meta.name.is_none() {
            producer.meta.name = Some(name);
        }
    }
    circuit.remove_node(id);
}

/// One-constant-operand identities: `x & 0`, `x | 1`, `x ^ 0`,
/// `mux(c, a, a)`, `mux(const, a, b)` and their mirrored forms.
fn try_identity(circuit: &mut Circuit, id: NodeId) -> bool {
    enum Rewrite {
        ToConstant(VBits),
        ToDriver(OutputRef),
    }
    let node = circuit.node(id);
    let rewrite = match &node.kind {
        NodeKind::Binary(op @ (BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)) => {
            let (Some(a), Some(b)) = (node.input(0), node.input(1)) else {
                return false;
            };
            let ca = constant_input(circuit, a);
            let cb = constant_input(circuit, b);
            let (constant, other) = match (&ca, &cb) {
                (Some(c), None) => (c, b),
                (None, Some(c)) => (c, a),
                _ => return false,
            };
            let w = constant.width();
            let all_zero = constant.as_u128() == Some(0);
            let all_ones = constant.is_fully_defined() && constant.value.iter().all(|v| *v);
            match (*op, all_zero, all_ones) {
                (BinaryOp::And, true, _) => Rewrite::ToConstant(VBits::zero(w)),
                (BinaryOp::And, _, true) => Rewrite::ToDriver(other),
                (BinaryOp::Or, _, true) => Rewrite::ToConstant(VBits::ones(w)),
                (BinaryOp::Or, true, _) => Rewrite::ToDriver(other),
                (BinaryOp::Xor, true, _) => Rewrite::ToDriver(other),
                _ => return false,
            }
        }
        NodeKind::Mux => {
            let (Some(sel), Some(f), Some(t)) = (
                node.input(mux_in::SEL),
                node.input(mux_in::WHEN_FALSE),
                node.input(mux_in::WHEN_TRUE),
            ) else {
                return false;
            };
            if f == t {
                Rewrite::ToDriver(f)
            } else if let Some(c) = constant_input(circuit, sel) {
                match c.as_bool() {
                    Some(true) => Rewrite::ToDriver(t),
                    Some(false) => Rewrite::ToDriver(f),
                    None => return false,
                }
            } else {
                return false;
            }
        }
        _ => return false,
    };
    match rewrite {
        Rewrite::ToConstant(v) => {
            let node = circuit.node_mut(id);
            node.kind = NodeKind::Constant(v);
            node.inputs.clear();
        }
        Rewrite::ToDriver(driver) => replace_with(circuit, id, driver),
    }
    true
}
