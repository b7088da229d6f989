//! `when`/`otherwise` conditional scopes. A scope pushes the conjunction
//! of all enclosing conditions; assignments made inside lower to muxes
//! against that conjunction.

use crate::front::context::with_ctx;
use crate::front::signal::{binary_expr, new_node, Bit, SignalValue};
use crate::ir::node::{BinaryOp, ConnectionKind, NodeKind, OutputRef, UnaryOp};

fn conjoin(parent: Option<OutputRef>, cond: OutputRef) -> OutputRef {
    match parent {
        None => cond,
        Some(p) => binary_expr(BinaryOp::And, p, cond, ConnectionKind::Bit),
    }
}

fn negate(cond: OutputRef) -> OutputRef {
    OutputRef::new(
        new_node(NodeKind::Unary(UnaryOp::Not), &[Some(cond)], &[ConnectionKind::Bit]),
        0,
    )
}

/// Opens a conditional scope for the body. Returns the arm handle whose
/// [`ElseArm::otherwise`] shares the same predicate, negated.
#[track_caller]
pub fn when(cond: Bit, body: impl FnOnce()) -> ElseArm {
    let cond = cond.read();
    let parent = with_ctx(|ctx| ctx.current_cond());
    let conj = conjoin(parent, cond);
    with_ctx(|ctx| ctx.push_cond(conj));
    body();
    with_ctx(|ctx| ctx.pop_cond());
    ElseArm { parent, cond }
}

#[must_use = "call .otherwise(..) or drop to end the conditional"]
pub struct ElseArm {
    parent: Option<OutputRef>,
    cond: OutputRef,
}

impl ElseArm {
    #[track_caller]
    pub fn otherwise(self, body: impl FnOnce()) {
        let negated = negate(self.cond);
        let conj = conjoin(self.parent, negated);
        with_ctx(|ctx| ctx.push_cond(conj));
        body();
        with_ctx(|ctx| ctx.pop_cond());
    }

    /// `else if` chaining.
    #[track_caller]
    pub fn elsewhen(self, cond: Bit, body: impl FnOnce()) -> ElseArm {
        let negated = negate(self.cond);
        let parent = Some(conjoin(self.parent, negated));
        let conj = conjoin(parent, cond.read());
        with_ctx(|ctx| ctx.push_cond(conj));
        body();
        with_ctx(|ctx| ctx.pop_cond());
        ElseArm {
            parent,
            cond: cond.read(),
        }
    }
}

/// The conjunction of the enclosing conditions as a signal, true when no
/// scope is open. Library code uses this for conditional side effects
/// such as memory write enables.
#[track_caller]
pub fn enclosing_condition() -> Bit {
    match with_ctx(|ctx| ctx.current_cond()) {
        Some(c) => Bit::from_expr(c),
        None => Bit::high(),
    }
}
