//! Register builders. Every register takes the innermost clock scope at
//! construction time.

use crate::front::context::with_ctx;
use crate::front::signal::{new_node, Bit, SignalValue};
use crate::ir::node::{NodeKind, OutputRef, RegSettings};
use crate::logic::VBits;

#[track_caller]
fn build_reg<T: SignalValue>(
    x: T,
    enable: Option<Bit>,
    reset: Option<VBits>,
    settings: RegSettings,
) -> T {
    let kind = x.kind();
    let reset_ref = reset.map(|v| {
        debug_assert_eq!(v.width(), kind.width());
        let c = new_node(NodeKind::Constant(v), &[], &[kind]);
        OutputRef::new(c, 0)
    });
    let n = new_node(
        NodeKind::Register(settings),
        &[Some(x.read()), enable.map(|e| e.read()), reset_ref],
        &[kind],
    );
    with_ctx(|ctx| {
        let clk = match ctx.current_clock() {
            Ok(c) => c,
            Err(e) => panic!("{e}"),
        };
        ctx.circuit.node_mut(n).clocks.push(Some(clk));
    });
    T::from_expr(OutputRef::new(n, 0))
}

/// One-cycle delay with undefined power-on contents.
#[track_caller]
pub fn reg<T: SignalValue>(x: T) -> T {
    build_reg(x, None, None, RegSettings::default())
}

/// One-cycle delay resetting to the given value.
#[track_caller]
pub fn reg_init<T: SignalValue>(x: T, reset: u128) -> T {
    let w = x.width();
    build_reg(x, None, Some(VBits::from_u128(reset, w)), RegSettings::default())
}

/// Enabled register; holds its value while `enable` is low.
#[track_caller]
pub fn reg_en<T: SignalValue>(x: T, enable: Bit) -> T {
    build_reg(x, Some(enable), None, RegSettings::default())
}

#[track_caller]
pub fn reg_en_init<T: SignalValue>(x: T, enable: Bit, reset: u128) -> T {
    let w = x.width();
    build_reg(
        x,
        Some(enable),
        Some(VBits::from_u128(reset, w)),
        RegSettings::default(),
    )
}

/// Fully configured register.
#[track_caller]
pub fn reg_full<T: SignalValue>(
    x: T,
    enable: Option<Bit>,
    reset: Option<VBits>,
    settings: RegSettings,
) -> T {
    build_reg(x, enable, reset, settings)
}

/// Latency hint: a register the balancing pass may move along
/// combinational paths to even out stage depths.
#[track_caller]
pub fn reg_hint<T: SignalValue>(x: T) -> T {
    build_reg(
        x,
        None,
        None,
        RegSettings {
            hint: true,
            ..Default::default()
        },
    )
}

/// Latency hint with a reset value; the value travels with the register
/// when the balancing pass moves it.
#[track_caller]
pub fn reg_hint_init<T: SignalValue>(x: T, reset: u128) -> T {
    let w = x.width();
    build_reg(
        x,
        None,
        Some(VBits::from_u128(reset, w)),
        RegSettings {
            hint: true,
            ..Default::default()
        },
    )
}

/// Explicit clock-domain-crossing glue: an n-stage synchronizer in the
/// current (destination) clock scope. The only legal way to move a
/// value between unrelated domains.
#[track_caller]
pub fn synchronize<T: SignalValue>(x: T, stages: usize) -> T {
    let kind = x.kind();
    let n = new_node(
        NodeKind::Synchronizer {
            stages: stages.max(1),
        },
        &[Some(x.read())],
        &[kind],
    );
    with_ctx(|ctx| {
        let clk = match ctx.current_clock() {
            Ok(c) => c,
            Err(e) => panic!("{e}"),
        };
        ctx.circuit.node_mut(n).clocks.push(Some(clk));
    });
    T::from_expr(OutputRef::new(n, 0))
}

/// Convenience for forward-retimable registers, matching the common
/// `allow_retiming_forward` construction.
#[track_caller]
pub fn reg_fwd<T: SignalValue>(x: T, reset: u128) -> T {
    let w = x.width();
    build_reg(
        x,
        None,
        Some(VBits::from_u128(reset, w)),
        RegSettings {
            allow_retiming_forward: true,
            ..Default::default()
        },
    )
}
