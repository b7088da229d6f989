//! Pure evaluation of combinational node variants over three-valued
//! inputs. The simulator's settle loop and the constant-propagation
//! pass both call into this single match.

use smallvec::SmallVec;

use crate::ir::circuit::Circuit;
use crate::ir::node::{mux_in, Node, NodeKind, OutputRef};
use crate::logic::{self, VBits};

/// Evaluates one combinational node. `read` supplies input values; an
/// unconnected input reads as undefined at the expected width.
///
/// Asynchronous memory read ports and pins are sources with external
/// state and are handled by the caller, never here.
pub fn eval_combinational(
    circuit: &Circuit,
    node: &Node,
    read: &mut dyn FnMut(OutputRef) -> VBits,
) -> SmallVec<[VBits; 2]> {
    let out_width = |port: usize| node.outputs[port].width();
    let input = |read: &mut dyn FnMut(OutputRef) -> VBits, idx: usize, fallback_width: usize| {
        match node.input(idx) {
            Some(src) => read(src),
            None => VBits::undef(fallback_width),
        }
    };
    match &node.kind {
        NodeKind::Constant(v) => [v.clone()].into_iter().collect(),
        NodeKind::Binary(op) => {
            let w = out_width(0);
            let a = input(read, 0, w);
            let b = input(read, 1, w);
            let signed = node.outputs[0].is_signed();
            [logic::binary(*op, &a, &b, signed)].into_iter().collect()
        }
        NodeKind::Unary(op) => {
            let w = out_width(0);
            let a = input(read, 0, w);
            [logic::unary(*op, &a)].into_iter().collect()
        }
        NodeKind::Compare(op) => {
            let (Some(sa), Some(sb)) = (node.input(0), node.input(1)) else {
                return [VBits::undef(1)].into_iter().collect();
            };
            let signed = circuit.output_kind(sa).is_signed();
            let a = read(sa);
            let b = read(sb);
            [logic::compare(*op, &a, &b, signed)].into_iter().collect()
        }
        NodeKind::Mux => {
            let w = out_width(0);
            let sel = input(read, mux_in::SEL, 1);
            let f = input(read, mux_in::WHEN_FALSE, w);
            let t = input(read, mux_in::WHEN_TRUE, w);
            [logic::mux(&sel, &f, &t)].into_iter().collect()
        }
        NodeKind::Shift { dir, fill } => {
            let w = out_width(0);
            let operand = input(read, 0, w);
            let amount = input(read, 1, 1);
            [logic::shift(&operand, &amount, *dir, *fill)]
                .into_iter()
                .collect()
        }
        NodeKind::Extend { mode, width } => {
            let a = match node.input(0) {
                Some(src) => read(src),
                None => VBits::undef(*width),
            };
            [logic::extend(&a, *mode, *width)].into_iter().collect()
        }
        NodeKind::Slice { offset, width } => {
            let a = match node.input(0) {
                Some(src) => read(src),
                None => return [VBits::undef(*width)].into_iter().collect(),
            };
            [a.slice(*offset, *width)].into_iter().collect()
        }
        NodeKind::Concat => {
            let parts: Vec<VBits> = node
                .inputs
                .iter()
                .map(|i| match i {
                    Some(src) => read(*src),
                    None => VBits::undef(0),
                })
                .collect();
            let refs: Vec<&VBits> = parts.iter().collect();
            [logic::concat_msb_first(&refs)].into_iter().collect()
        }
        NodeKind::SignalAlias => {
            let w = out_width(0);
            [input(read, 0, w)].into_iter().collect()
        }
        NodeKind::PinTristate => {
            let w = out_width(0);
            let value = input(read, 0, w);
            let oe = input(read, 1, 1);
            let out = match oe.as_bool() {
                Some(true) => value,
                _ => VBits::undef(w),
            };
            [out].into_iter().collect()
        }
        // observation-only variants produce nothing
        NodeKind::PinOutput | NodeKind::Tap | NodeKind::Assertion { .. } => SmallVec::new(),
        other => unreachable!("{} is not evaluated combinationally", other.type_name()),
    }
}

/// Constant-folds a node whose inputs are all known constants. Returns
/// `None` for variants that cannot fold.
pub fn fold_constant(circuit: &Circuit, node: &Node, values: &[VBits]) -> Option<VBits> {
    if node.outputs.len() != 1 {
        return None;
    }
    match node.kind {
        NodeKind::Binary(_)
        | NodeKind::Unary(_)
        | NodeKind::Compare(_)
        | NodeKind::Mux
        | NodeKind::Shift { .. }
        | NodeKind::Extend { .. }
        | NodeKind::Slice { .. }
        | NodeKind::Concat => {
            let mut cursor = 0;
            let mut read = |_src: OutputRef| {
                let v = values[cursor].clone();
                cursor += 1;
                v
            };
            let outs = eval_combinational(circuit, node, &mut read);
            outs.into_iter().next()
        }
        _ => None,
    }
}
