//! Value wrappers over IR output ports. Wrappers have value semantics
//! at the Rust level: every operator builds a node and returns a fresh
//! wrapper; `assign` re-drives the wrapped signal node, routing through
//! the active conditional scope.

use std::panic::Location;

use crate::error::DesignError;
use crate::front::context::with_ctx;
use crate::ir::node::{
    mux_in, BinaryOp, CompareOp, ConnectionKind, ExtendMode, NodeId, NodeKind, OutputRef, ShiftDir,
    ShiftFill,
};
use crate::logic::VBits;

/// Anything that reads as one output port.
pub trait Source {
    fn to_ref(&self) -> OutputRef;
}

impl Source for OutputRef {
    fn to_ref(&self) -> OutputRef {
        *self
    }
}

pub trait SignalValue: Copy + Source {
    fn node(&self) -> NodeId;
    fn kind(&self) -> ConnectionKind;
    /// Wraps an arbitrary expression port in this wrapper's type; the
    /// width is taken from the expression.
    fn from_expr(expr: OutputRef) -> Self;

    fn read(&self) -> OutputRef {
        OutputRef::new(self.node(), 0)
    }

    fn width(&self) -> usize {
        self.kind().width()
    }
}

#[track_caller]
pub(crate) fn new_node(
    kind: NodeKind,
    inputs: &[Option<OutputRef>],
    outputs: &[ConnectionKind],
) -> NodeId {
    let site = Location::caller();
    with_ctx(|ctx| {
        let group = ctx.current_group();
        let id = ctx
            .circuit
            .add_node(kind, inputs.len(), outputs.iter().copied(), group);
        ctx.circuit.node_mut(id).meta.site = Some(site);
        for (port, input) in inputs.iter().enumerate() {
            if let Some(src) = input {
                if let Err(e) = ctx.circuit.rebind(*src, id, port) {
                    panic!("{e}");
                }
            }
        }
        id
    })
}

/// Creates a signal node of the given kind, optionally driven.
#[track_caller]
pub(crate) fn wrap_signal(kind: ConnectionKind, driver: Option<OutputRef>) -> NodeId {
    new_node(NodeKind::SignalAlias, &[driver], &[kind])
}

#[track_caller]
fn site_string() -> String {
    let loc = Location::caller();
    format!("{}:{}", loc.file(), loc.line())
}

#[track_caller]
pub(crate) fn binary_expr(op: BinaryOp, a: OutputRef, b: OutputRef, out: ConnectionKind) -> OutputRef {
    let (wa, wb) = with_ctx(|ctx| {
        (
            ctx.circuit.output_kind(a).width(),
            ctx.circuit.output_kind(b).width(),
        )
    });
    if wa != wb {
        panic!(
            "{}",
            DesignError::WidthMismatch {
                lhs: wa,
                rhs: wb,
                site: site_string(),
            }
        );
    }
    OutputRef::new(new_node(NodeKind::Binary(op), &[Some(a), Some(b)], &[out]), 0)
}

#[track_caller]
pub(crate) fn compare_expr(op: CompareOp, a: OutputRef, b: OutputRef) -> OutputRef {
    let (wa, wb) = with_ctx(|ctx| {
        (
            ctx.circuit.output_kind(a).width(),
            ctx.circuit.output_kind(b).width(),
        )
    });
    if wa != wb {
        panic!(
            "{}",
            DesignError::WidthMismatch {
                lhs: wa,
                rhs: wb,
                site: site_string(),
            }
        );
    }
    OutputRef::new(
        new_node(
            NodeKind::Compare(op),
            &[Some(a), Some(b)],
            &[ConnectionKind::Bit],
        ),
        0,
    )
}

/// Conditional-scope-aware drive of a signal node. Outside any scope
/// this rebinds the driver; inside, it builds the mux against the
/// enclosing condition conjunction, preserving the previous binding on
/// the false path. An undriven signal closes the false path through its
/// own output; post-processing rejects the resulting loop.
#[track_caller]
pub(crate) fn drive_signal(target: NodeId, rhs: OutputRef) {
    let site = Location::caller();
    with_ctx(|ctx| {
        let cond = ctx.current_cond();
        let result = match cond {
            None => ctx.circuit.rebind(rhs, target, 0),
            Some(cond) => {
                let prev = ctx
                    .circuit
                    .node(target)
                    .input(0)
                    .unwrap_or(OutputRef::new(target, 0));
                let out = ctx.circuit.output_kind(OutputRef::new(target, 0));
                let group = ctx.current_group();
                let mux = ctx.circuit.add_node(NodeKind::Mux, 3, [out], group);
                ctx.circuit.node_mut(mux).meta.site = Some(site);
                ctx.circuit
                    .rebind(cond, mux, mux_in::SEL)
                    .and_then(|_| ctx.circuit.rebind(prev, mux, mux_in::WHEN_FALSE))
                    .and_then(|_| ctx.circuit.rebind(rhs, mux, mux_in::WHEN_TRUE))
                    .and_then(|_| ctx.circuit.rebind(OutputRef::new(mux, 0), target, 0))
            }
        };
        if let Err(e) = result {
            panic!("{e}");
        }
    })
}

macro_rules! wrapper {
    ($name:ident, $kind:expr) => {
        #[derive(Copy, Clone)]
        pub struct $name {
            node: NodeId,
        }

        impl Source for $name {
            fn to_ref(&self) -> OutputRef {
                self.read()
            }
        }

        impl SignalValue for $name {
            fn node(&self) -> NodeId {
                self.node
            }

            fn kind(&self) -> ConnectionKind {
                with_ctx(|ctx| ctx.circuit.output_kind(OutputRef::new(self.node, 0)))
            }

            #[track_caller]
            fn from_expr(expr: OutputRef) -> Self {
                let w = with_ctx(|ctx| ctx.circuit.output_kind(expr).width());
                let make: fn(usize) -> ConnectionKind = $kind;
                let node = wrap_signal(make(w), Some(expr));
                $name { node }
            }
        }

        impl $name {
            /// Assigns under the active conditional scope.
            #[track_caller]
            pub fn assign(&mut self, rhs: $name) {
                drive_signal(self.node, rhs.read());
            }

            pub fn width(&self) -> usize {
                SignalValue::kind(self).width()
            }

            pub fn set_name(self, name: impl Into<String>) -> Self {
                with_ctx(|ctx| ctx.circuit.node_mut(self.node).meta.name = Some(name.into()));
                self
            }

            #[track_caller]
            pub fn is_eq(&self, other: $name) -> Bit {
                Bit::from_expr(compare_expr(CompareOp::Eq, self.read(), other.read()))
            }

            #[track_caller]
            pub fn is_ne(&self, other: $name) -> Bit {
                Bit::from_expr(compare_expr(CompareOp::Ne, self.read(), other.read()))
            }
        }
    };
}

wrapper!(Bit, |_w| ConnectionKind::Bit);
wrapper!(UInt, ConnectionKind::UInt);
wrapper!(SInt, ConnectionKind::SInt);
wrapper!(BVec, ConnectionKind::BVec);

macro_rules! vector_wrapper_impl {
    ($name:ident, $make:expr) => {
        impl $name {
            /// Declares an undriven signal of the given width.
            #[track_caller]
            pub fn new(width: usize) -> Self {
                $name {
                    node: wrap_signal($make(width), None),
                }
            }

            #[track_caller]
            pub fn constant_bits(value: VBits) -> Self {
                let w = value.width();
                let c = new_node(NodeKind::Constant(value), &[], &[$make(w)]);
                Self::from_expr(OutputRef::new(c, 0))
            }

            #[track_caller]
            pub fn constant(value: u128, width: usize) -> Self {
                Self::constant_bits(VBits::from_u128(value, width))
            }

            /// Constant bit-slice `[offset +: width]`.
            #[track_caller]
            pub fn slice(&self, offset: usize, width: usize) -> Self {
                let ow = self.width();
                if offset + width > ow {
                    panic!(
                        "{}",
                        DesignError::SliceOutOfRange {
                            offset,
                            width,
                            operand_width: ow,
                            site: site_string(),
                        }
                    );
                }
                let n = new_node(
                    NodeKind::Slice { offset, width },
                    &[Some(self.read())],
                    &[$make(width)],
                );
                Self::from_expr(OutputRef::new(n, 0))
            }

            #[track_caller]
            pub fn bit(&self, index: usize) -> Bit {
                let ow = self.width();
                if index >= ow {
                    panic!(
                        "{}",
                        DesignError::SliceOutOfRange {
                            offset: index,
                            width: 1,
                            operand_width: ow,
                            site: site_string(),
                        }
                    );
                }
                let n = new_node(
                    NodeKind::Slice {
                        offset: index,
                        width: 1,
                    },
                    &[Some(self.read())],
                    &[ConnectionKind::Bit],
                );
                Bit::from_expr(OutputRef::new(n, 0))
            }

            /// Dynamic slice `[offset +: width]`; lowers to a right
            /// shift followed by a constant slice.
            #[track_caller]
            pub fn slice_dyn(&self, offset: UInt, width: usize) -> Self {
                let shifted = self.shift_expr(offset.read(), ShiftDir::Right, ShiftFill::Zero);
                Self::from_expr(shifted).slice(0, width)
            }

            #[track_caller]
            fn shift_expr(&self, amount: OutputRef, dir: ShiftDir, fill: ShiftFill) -> OutputRef {
                let n = new_node(
                    NodeKind::Shift { dir, fill },
                    &[Some(self.read()), Some(amount)],
                    &[$make(self.width())],
                );
                OutputRef::new(n, 0)
            }

            #[track_caller]
            fn shift_amount(&self, amount: usize) -> OutputRef {
                let bits = usize::BITS as usize - amount.leading_zeros() as usize;
                let c = new_node(
                    NodeKind::Constant(VBits::from_u128(amount as u128, bits.max(1))),
                    &[],
                    &[ConnectionKind::UInt(bits.max(1))],
                );
                OutputRef::new(c, 0)
            }

            /// Length-preserving left rotate.
            #[track_caller]
            pub fn rotl(&self, amount: usize) -> Self {
                let amt = self.shift_amount(amount);
                Self::from_expr(self.shift_expr(amt, ShiftDir::Left, ShiftFill::Rotate))
            }

            #[track_caller]
            pub fn rotr(&self, amount: usize) -> Self {
                let amt = self.shift_amount(amount);
                Self::from_expr(self.shift_expr(amt, ShiftDir::Right, ShiftFill::Rotate))
            }

            #[track_caller]
            pub fn rotl_dyn(&self, amount: UInt) -> Self {
                Self::from_expr(self.shift_expr(amount.read(), ShiftDir::Left, ShiftFill::Rotate))
            }

            #[track_caller]
            pub fn rotr_dyn(&self, amount: UInt) -> Self {
                Self::from_expr(self.shift_expr(amount.read(), ShiftDir::Right, ShiftFill::Rotate))
            }

            #[track_caller]
            pub fn shl_dyn(&self, amount: UInt) -> Self {
                Self::from_expr(self.shift_expr(amount.read(), ShiftDir::Left, ShiftFill::Zero))
            }

            #[track_caller]
            pub fn shr_dyn(&self, amount: UInt) -> Self {
                let fill = if $make(1).is_signed() {
                    ShiftFill::Arithmetic
                } else {
                    ShiftFill::Zero
                };
                Self::from_expr(self.shift_expr(amount.read(), ShiftDir::Right, fill))
            }

            #[track_caller]
            fn extend_to(&self, mode: ExtendMode, width: usize) -> Self {
                let ow = self.width();
                if width < ow {
                    panic!(
                        "{}",
                        DesignError::ExtensionNarrows {
                            old_width: ow,
                            new_width: width,
                            site: site_string(),
                        }
                    );
                }
                let n = new_node(
                    NodeKind::Extend { mode, width },
                    &[Some(self.read())],
                    &[$make(width)],
                );
                Self::from_expr(OutputRef::new(n, 0))
            }

            /// Widen with zero fill.
            #[track_caller]
            pub fn zext(&self, width: usize) -> Self {
                self.extend_to(ExtendMode::Zero, width)
            }

            /// Widen with sign fill.
            #[track_caller]
            pub fn sext(&self, width: usize) -> Self {
                self.extend_to(ExtendMode::Sign, width)
            }

            /// Widen with one fill.
            #[track_caller]
            pub fn oext(&self, width: usize) -> Self {
                self.extend_to(ExtendMode::One, width)
            }

            /// Widen according to the operand's signedness.
            #[track_caller]
            pub fn ext(&self, width: usize) -> Self {
                let mode = if $make(1).is_signed() {
                    ExtendMode::Sign
                } else {
                    ExtendMode::Zero
                };
                self.extend_to(mode, width)
            }
        }

        impl std::ops::Shl<usize> for $name {
            type Output = $name;
            #[track_caller]
            fn shl(self, amount: usize) -> $name {
                let amt = self.shift_amount(amount);
                Self::from_expr(self.shift_expr(amt, ShiftDir::Left, ShiftFill::Zero))
            }
        }

        impl std::ops::Shr<usize> for $name {
            type Output = $name;
            #[track_caller]
            fn shr(self, amount: usize) -> $name {
                let fill = if $make(1).is_signed() {
                    ShiftFill::Arithmetic
                } else {
                    ShiftFill::Zero
                };
                let amt = self.shift_amount(amount);
                Self::from_expr(self.shift_expr(amt, ShiftDir::Right, fill))
            }
        }
    };
}

vector_wrapper_impl!(UInt, ConnectionKind::UInt);
vector_wrapper_impl!(SInt, ConnectionKind::SInt);
vector_wrapper_impl!(BVec, ConnectionKind::BVec);

macro_rules! arith_ops {
    ($name:ident) => {
        impl std::ops::Add for $name {
            type Output = $name;
            #[track_caller]
            fn add(self, rhs: $name) -> $name {
                $name::from_expr(binary_expr(BinaryOp::Add, self.read(), rhs.read(), self.kind()))
            }
        }

        impl std::ops::Sub for $name {
            type Output = $name;
            #[track_caller]
            fn sub(self, rhs: $name) -> $name {
                $name::from_expr(binary_expr(BinaryOp::Sub, self.read(), rhs.read(), self.kind()))
            }
        }

        impl std::ops::Mul for $name {
            type Output = $name;
            #[track_caller]
            fn mul(self, rhs: $name) -> $name {
                $name::from_expr(binary_expr(BinaryOp::Mul, self.read(), rhs.read(), self.kind()))
            }
        }

        impl std::ops::Div for $name {
            type Output = $name;
            #[track_caller]
            fn div(self, rhs: $name) -> $name {
                $name::from_expr(binary_expr(BinaryOp::Div, self.read(), rhs.read(), self.kind()))
            }
        }

        impl std::ops::Rem for $name {
            type Output = $name;
            #[track_caller]
            fn rem(self, rhs: $name) -> $name {
                $name::from_expr(binary_expr(BinaryOp::Rem, self.read(), rhs.read(), self.kind()))
            }
        }

        impl std::ops::Add<u128> for $name {
            type Output = $name;
            #[track_caller]
            fn add(self, rhs: u128) -> $name {
                let c = $name::constant(rhs, self.width());
                self + c
            }
        }

        impl std::ops::Sub<u128> for $name {
            type Output = $name;
            #[track_caller]
            fn sub(self, rhs: u128) -> $name {
                let c = $name::constant(rhs, self.width());
                self - c
            }
        }

        impl std::ops::Mul<u128> for $name {
            type Output = $name;
            #[track_caller]
            fn mul(self, rhs: u128) -> $name {
                let c = $name::constant(rhs, self.width());
                self * c
            }
        }

        impl $name {
            #[track_caller]
            pub fn is_lt(&self, other: $name) -> Bit {
                Bit::from_expr(compare_expr(CompareOp::Lt, self.read(), other.read()))
            }

            #[track_caller]
            pub fn is_le(&self, other: $name) -> Bit {
                Bit::from_expr(compare_expr(CompareOp::Le, self.read(), other.read()))
            }

            #[track_caller]
            pub fn is_gt(&self, other: $name) -> Bit {
                Bit::from_expr(compare_expr(CompareOp::Gt, self.read(), other.read()))
            }

            #[track_caller]
            pub fn is_ge(&self, other: $name) -> Bit {
                Bit::from_expr(compare_expr(CompareOp::Ge, self.read(), other.read()))
            }

            #[track_caller]
            pub fn eq_const(&self, value: u128) -> Bit {
                self.is_eq($name::constant(value, self.width()))
            }
        }
    };
}

arith_ops!(UInt);
arith_ops!(SInt);

macro_rules! bitwise_ops {
    ($name:ident) => {
        impl std::ops::BitAnd for $name {
            type Output = $name;
            #[track_caller]
            fn bitand(self, rhs: $name) -> $name {
                $name::from_expr(binary_expr(BinaryOp::And, self.read(), rhs.read(), self.kind()))
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            #[track_caller]
            fn bitor(self, rhs: $name) -> $name {
                $name::from_expr(binary_expr(BinaryOp::Or, self.read(), rhs.read(), self.kind()))
            }
        }

        impl std::ops::BitXor for $name {
            type Output = $name;
            #[track_caller]
            fn bitxor(self, rhs: $name) -> $name {
                $name::from_expr(binary_expr(BinaryOp::Xor, self.read(), rhs.read(), self.kind()))
            }
        }

        impl std::ops::Not for $name {
            type Output = $name;
            #[track_caller]
            fn not(self) -> $name {
                let n = new_node(
                    NodeKind::Unary(crate::ir::node::UnaryOp::Not),
                    &[Some(self.read())],
                    &[self.kind()],
                );
                $name::from_expr(OutputRef::new(n, 0))
            }
        }
    };
}

bitwise_ops!(Bit);
bitwise_ops!(UInt);
bitwise_ops!(SInt);
bitwise_ops!(BVec);

impl std::ops::Neg for SInt {
    type Output = SInt;
    #[track_caller]
    fn neg(self) -> SInt {
        let n = new_node(
            NodeKind::Unary(crate::ir::node::UnaryOp::Neg),
            &[Some(self.read())],
            &[self.kind()],
        );
        SInt::from_expr(OutputRef::new(n, 0))
    }
}

impl Bit {
    /// Declares an undriven bit signal.
    #[track_caller]
    pub fn new() -> Bit {
        Bit {
            node: wrap_signal(ConnectionKind::Bit, None),
        }
    }

    #[track_caller]
    pub fn constant(value: bool) -> Bit {
        let c = new_node(
            NodeKind::Constant(VBits::from_bool(value)),
            &[],
            &[ConnectionKind::Bit],
        );
        Bit::from_expr(OutputRef::new(c, 0))
    }

    #[track_caller]
    pub fn high() -> Bit {
        Bit::constant(true)
    }

    #[track_caller]
    pub fn low() -> Bit {
        Bit::constant(false)
    }
}

impl Default for Bit {
    #[track_caller]
    fn default() -> Self {
        Bit::new()
    }
}

/// Two-way multiplexer over any wrapper type.
#[track_caller]
pub fn mux<T: SignalValue>(sel: Bit, when_false: T, when_true: T) -> T {
    let kind = when_false.kind();
    let n = new_node(
        NodeKind::Mux,
        &[Some(sel.read()), Some(when_false.read()), Some(when_true.read())],
        &[kind],
    );
    T::from_expr(OutputRef::new(n, 0))
}

/// Concatenation; the first argument occupies the most significant bits.
#[track_caller]
pub fn cat(parts: &[&dyn Source]) -> BVec {
    let refs: Vec<OutputRef> = parts.iter().map(|p| p.to_ref()).collect();
    let total: usize = with_ctx(|ctx| {
        refs.iter()
            .map(|r| ctx.circuit.output_kind(*r).width())
            .sum()
    });
    let inputs: Vec<Option<OutputRef>> = refs.into_iter().map(Some).collect();
    let n = new_node(NodeKind::Concat, &inputs, &[ConnectionKind::BVec(total)]);
    BVec::from_expr(OutputRef::new(n, 0))
}

/// Marks the wrapped node as a dead-code-elimination anchor.
pub fn keep<T: SignalValue>(sig: T) -> T {
    with_ctx(|ctx| ctx.circuit.node_mut(sig.node()).keep = true);
    sig
}

/// Simulation-only observation point; keeps its cone alive and is
/// sampled by waveform recorders.
#[track_caller]
pub fn tap<T: SignalValue>(sig: T, name: impl Into<String>) -> T {
    let n = new_node(NodeKind::Tap, &[Some(sig.read())], &[]);
    with_ctx(|ctx| ctx.circuit.node_mut(n).meta.name = Some(name.into()));
    sig
}

/// A free-running pseudo-random source in the current clock scope;
/// simulation-only, deterministic per seed.
#[track_caller]
pub fn prng(width: usize, seed: u64) -> BVec {
    let n = new_node(NodeKind::Prng { seed }, &[], &[ConnectionKind::BVec(width)]);
    with_ctx(|ctx| {
        let clk = match ctx.current_clock() {
            Ok(c) => c,
            Err(e) => panic!("{e}"),
        };
        ctx.circuit.node_mut(n).clocks.push(Some(clk));
    });
    BVec::from_expr(OutputRef::new(n, 0))
}

/// Installs a simulation check on the current clock: fires when the
/// condition is defined-and-false, or undefined, at an active edge.
#[track_caller]
pub fn sim_assert(cond: Bit, message: impl Into<String>) {
    let n = new_node(
        NodeKind::Assertion {
            message: message.into(),
        },
        &[Some(cond.read())],
        &[],
    );
    with_ctx(|ctx| {
        let clk = match ctx.current_clock() {
            Ok(c) => c,
            Err(e) => panic!("{e}"),
        };
        ctx.circuit.node_mut(n).clocks.push(Some(clk));
    });
}
