//! Register retiming: explicit forward/backward moves and the latency
//! hint balancing pass.
//!
//! Forward retiming finds the register anti-chain dominating a target
//! output (the frontier nearest the target, which is also the largest
//! such chain), absorbs it into the combinational cone and materialises
//! one register at the target. Registers with consumers outside the
//! cone survive for those consumers, which is the clone semantics: the
//! cone reads their input driver directly. The moved register lands
//! after the combinational logic, so a forward-retimed counter reads
//! `k` at cycle `k`.
//!
//! Hint balancing levels every path by the number of hint registers it
//! crosses, then re-inserts plain registers at level boundaries, placed
//! on the edge into the consumer. Mismatched reset values refuse the
//! rebalance with an advisory and degrade the hints to plain registers.

use fnv::{FnvHashMap, FnvHashSet};

use crate::error::PassError;
use crate::ir::circuit::Circuit;
use crate::ir::clock::ClockId;
use crate::ir::node::{
    reg_in, InputRef, NodeId, NodeKind, OutputRef, RegSettings,
};
use crate::ir::subnet::Subnet;
use crate::logic::VBits;
use crate::passes::pass::Pass;
use crate::report::Reporter;

#[derive(Copy, Clone, Debug)]
pub struct RetimeOptions {
    /// Only move registers that carry the matching allow flag.
    pub only_flagged: bool,
}

impl Default for RetimeOptions {
    fn default() -> Self {
        RetimeOptions { only_flagged: true }
    }
}

/// What the anti-chain agreed on.
struct ChainProfile {
    clock: ClockId,
    enable: Option<OutputRef>,
    reset: Option<VBits>,
}

fn constant_of(circuit: &Circuit, src: OutputRef) -> Option<VBits> {
    match &circuit.node(src.node).kind {
        NodeKind::Constant(v) => Some(v.clone()),
        _ => None,
    }
}

/// Validates that every register of the chain shares clock, enable and
/// reset, per the legality conditions of register motion.
fn profile_chain(
    circuit: &Circuit,
    chain: &[NodeId],
    flag: impl Fn(&RegSettings) -> bool,
    only_flagged: bool,
) -> Result<ChainProfile, PassError> {
    let refused = |reason: String| PassError::RetimingFailed { reason };
    if chain.is_empty() {
        return Err(refused("no registers found to move".into()));
    }
    let mut clock = None;
    let mut enable: Option<Option<OutputRef>> = None;
    let mut reset: Option<Option<VBits>> = None;
    for &id in chain {
        let node = circuit.node(id);
        let NodeKind::Register(settings) = node.kind else {
            return Err(refused(format!("{} is not a register", node.label())));
        };
        if only_flagged && !flag(&settings) {
            return Err(refused(format!(
                "{} is not marked for retiming",
                node.label()
            )));
        }
        let clk = node
            .clock(0)
            .ok_or_else(|| refused(format!("{} has no clock", node.label())))?;
        match clock {
            None => clock = Some(clk),
            Some(c) if circuit.clocks_equivalent(c, clk) => {}
            Some(_) => return Err(refused("clock domains differ across the chain".into())),
        }
        let en = node.input(reg_in::ENABLE);
        match &enable {
            None => enable = Some(en),
            Some(e) if *e == en => {}
            Some(_) => return Err(refused("enables differ across the chain".into())),
        }
        let rv = node
            .input(reg_in::RESET_VALUE)
            .and_then(|r| constant_of(circuit, r));
        match &reset {
            None => reset = Some(rv),
            Some(r) if *r == rv => {}
            Some(_) => return Err(refused("reset values differ across the chain".into())),
        }
    }
    Ok(ChainProfile {
        clock: clock.unwrap(),
        enable: enable.unwrap(),
        reset: reset.unwrap(),
    })
}

fn make_register(
    circuit: &mut Circuit,
    data: OutputRef,
    profile: &ChainProfile,
    group: crate::ir::group::GroupId,
) -> NodeId {
    let kind = circuit.output_kind(data);
    let reg = circuit.add_node(NodeKind::Register(RegSettings::default()), 3, [kind], group);
    circuit.node_mut(reg).clocks.push(Some(profile.clock));
    circuit
        .rebind(data, reg, reg_in::DATA)
        .expect("register data width matches its source");
    if let Some(en) = profile.enable {
        circuit
            .rebind(en, reg, reg_in::ENABLE)
            .expect("enable is a single bit");
    }
    if let Some(rv) = &profile.reset {
        let mut rv = rv.clone();
        let w = kind.width();
        if rv.width() < w {
            rv = crate::logic::extend(&rv, crate::ir::node::ExtendMode::Zero, w);
        } else if rv.width() > w {
            rv = rv.slice(0, w);
        }
        let c = circuit.add_node(NodeKind::Constant(rv), 0, [kind], group);
        circuit
            .rebind(OutputRef::new(c, 0), reg, reg_in::RESET_VALUE)
            .expect("reset constant width matches the register");
    }
    reg
}

/// Moves the dominating anti-chain of forward-retimable registers to
/// sit immediately before `target`. Fatal when the preconditions fail;
/// this is an explicit request, not a hint.
pub fn retime_forward_to_output(
    circuit: &mut Circuit,
    subnet: &Subnet,
    target: OutputRef,
    options: RetimeOptions,
) -> Result<(), PassError> {
    let refused = |reason: String| PassError::RetimingFailed { reason };
    if !circuit.node(target.node).kind.is_combinational() {
        return Err(refused(format!(
            "target {} is not combinational",
            circuit.node(target.node).label()
        )));
    }

    // walk the cone feeding the target; registers form the frontier
    let mut area: FnvHashSet<NodeId> = FnvHashSet::default();
    let mut chain: Vec<NodeId> = Vec::new();
    let mut queue = vec![target.node];
    while let Some(id) = queue.pop() {
        if !area.insert(id) {
            continue;
        }
        for input in circuit.node(id).inputs.clone().iter().flatten() {
            let driver = circuit.node(input.node);
            match &driver.kind {
                _ if area.contains(&input.node) => {}
                NodeKind::Register(_) => {
                    if !chain.contains(&input.node) {
                        chain.push(input.node);
                    }
                }
                NodeKind::Constant(_) => {}
                kind if kind.is_combinational() && subnet.contains(input.node) => {
                    queue.push(input.node);
                }
                _ => {
                    return Err(refused(format!(
                        "path to the target passes through unretimable {}",
                        driver.label()
                    )))
                }
            }
        }
    }

    let profile = profile_chain(circuit, &chain, |s| s.allow_retiming_forward, options.only_flagged)?;

    // cone consumers of each chain register read its input directly;
    // the register itself survives wherever it has other consumers
    for &reg in &chain {
        let Some(data) = circuit.node(reg).input(reg_in::DATA) else {
            return Err(refused(format!(
                "{} has no data driver",
                circuit.node(reg).label()
            )));
        };
        let out = OutputRef::new(reg, 0);
        for consumer in circuit.consumers_of(out) {
            if area.contains(&consumer.node) {
                circuit.node_mut(consumer.node).inputs[consumer.port] = Some(data);
            }
        }
        if circuit.consumers_of(out).is_empty() {
            circuit.remove_node(reg);
        }
    }

    // materialise the moved register at the target boundary
    let group = circuit.node(target.node).group;
    let moved = make_register(circuit, target, &profile, group);
    let out = OutputRef::new(moved, 0);
    for consumer in circuit.consumers_of(target) {
        if consumer.node != moved {
            circuit.node_mut(consumer.node).inputs[consumer.port] = Some(out);
        }
    }
    Ok(())
}

/// The mirror transformation: absorbs the anti-chain of backward
/// retimable registers dominated by `source` and materialises one
/// register immediately after it.
pub fn retime_backward_from_input(
    circuit: &mut Circuit,
    subnet: &Subnet,
    source: OutputRef,
    options: RetimeOptions,
) -> Result<(), PassError> {
    let refused = |reason: String| PassError::RetimingFailed { reason };

    // walk the cone the source feeds; terminating registers form the
    // frontier, anything else observable refuses the move
    let mut area: FnvHashSet<NodeId> = FnvHashSet::default();
    let mut chain: Vec<NodeId> = Vec::new();
    let mut queue: Vec<InputRef> = circuit.consumers_of(source);
    let mut source_consumers: Vec<InputRef> = queue.clone();
    while let Some(edge) = queue.pop() {
        let consumer = circuit.node(edge.node);
        match &consumer.kind {
            _ if area.contains(&edge.node) => {}
            NodeKind::Register(_) if edge.port == reg_in::DATA => {
                if !chain.contains(&edge.node) {
                    chain.push(edge.node);
                }
            }
            kind if kind.is_combinational() && subnet.contains(edge.node) => {
                area.insert(edge.node);
                for port in 0..consumer.outputs.len() {
                    let mut next = circuit.consumers_of(OutputRef::new(edge.node, port));
                    queue.append(&mut next);
                }
            }
            _ => {
                return Err(refused(format!(
                    "the source cone reaches unretimable {}",
                    consumer.label()
                )))
            }
        }
    }

    let profile = profile_chain(
        circuit,
        &chain,
        |s| s.allow_retiming_backward,
        options.only_flagged,
    )?;

    // drop the frontier registers out of the cone
    for &reg in &chain {
        circuit.bypass_output_to_input(reg, 0, reg_in::DATA);
        if circuit.consumers_of(OutputRef::new(reg, 0)).is_empty() {
            circuit.remove_node(reg);
        }
    }

    // the single moved register lands right after the source
    let group = circuit.node(source.node).group;
    let moved = make_register(circuit, source, &profile, group);
    let out = OutputRef::new(moved, 0);
    source_consumers.retain(|c| circuit.contains(c.node) && c.node != moved);
    for consumer in source_consumers {
        circuit.node_mut(consumer.node).inputs[consumer.port] = Some(out);
    }
    Ok(())
}

/// The pipeline pass over `reg_hint` registers.
pub struct RetimeHints;

impl Pass for RetimeHints {
    fn name(&self) -> &'static str {
        "retime_registers"
    }

    fn run(
        &self,
        circuit: &mut Circuit,
        subnet: &Subnet,
        reporter: &mut Reporter,
    ) -> Result<(), PassError> {
        let hints: Vec<NodeId> = circuit
            .iter_nodes()
            .filter(|n| {
                subnet.contains(n.id)
                    && matches!(n.kind, NodeKind::Register(s) if s.hint)
            })
            .map(|n| n.id)
            .collect();
        if hints.is_empty() {
            return Ok(());
        }

        let refuse = |circuit: &mut Circuit, reporter: &mut Reporter, reason: &str| {
            reporter.warning("retime_registers", format!("retiming refused: {reason}"));
            for &id in &hints {
                if let NodeKind::Register(settings) = &mut circuit.node_mut(id).kind {
                    settings.hint = false;
                }
            }
        };

        // the whole balance must agree on clock, enable and reset
        let profile = match profile_chain(circuit, &hints, |s| s.hint, true) {
            Ok(p) => p,
            Err(PassError::RetimingFailed { reason }) => {
                refuse(circuit, reporter, &reason);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if profile.enable.is_some() {
            refuse(circuit, reporter, "hint registers with enables are not balanced");
            return Ok(());
        }

        let Some(levels) = compute_levels(circuit) else {
            refuse(circuit, reporter, "hint register sits on a feedback path");
            return Ok(());
        };

        // record the hint depth of every edge before touching anything
        let hint_set: FnvHashSet<NodeId> = hints.iter().copied().collect();
        let mut edges: Vec<(InputRef, usize)> = Vec::new();
        for node in circuit.iter_nodes() {
            if hint_set.contains(&node.id) {
                continue;
            }
            for (port, input) in node.inputs.iter().enumerate() {
                let Some(input) = input else { continue };
                let c = levels.get(&input.node).copied().unwrap_or(0);
                edges.push((
                    InputRef {
                        node: node.id,
                        port,
                    },
                    c,
                ));
            }
        }

        // bypass the hints; anchors keep their register (clone, not move)
        for &id in &hints {
            let consumers = circuit.consumers_of(OutputRef::new(id, 0));
            let has_anchor = consumers
                .iter()
                .any(|c| circuit.node(c.node).kind.is_anchor());
            let Some(data) = circuit.node(id).input(reg_in::DATA) else {
                continue;
            };
            for c in &consumers {
                if !circuit.node(c.node).kind.is_anchor() {
                    circuit.node_mut(c.node).inputs[c.port] = Some(data);
                }
            }
            if has_anchor {
                if let NodeKind::Register(settings) = &mut circuit.node_mut(id).kind {
                    settings.hint = false;
                }
            } else {
                circuit.remove_node(id);
            }
        }

        // level targets: combinational joins equalise to their deepest
        // input, sinks restore their recorded depth
        let mut target_of: FnvHashMap<NodeId, usize> = FnvHashMap::default();
        for (edge, c) in &edges {
            if circuit.contains(edge.node) && circuit.node(edge.node).kind.is_combinational() {
                let t = target_of.entry(edge.node).or_insert(0);
                *t = (*t).max(*c);
            }
        }

        let mut inserted = 0usize;
        for (edge, c) in edges {
            if !circuit.contains(edge.node) {
                continue;
            }
            let Some(driver) = circuit.node(edge.node).input(edge.port) else {
                continue;
            };
            // the anchor path kept its original register
            if hint_set.contains(&driver.node) {
                continue;
            }
            let target = if circuit.node(edge.node).kind.is_combinational() {
                target_of.get(&edge.node).copied().unwrap_or(0)
            } else {
                c
            };
            let have = levels.get(&driver.node).copied().unwrap_or(0);
            let group = circuit.node(edge.node).group;
            let mut data = driver;
            for _ in have..target {
                let reg = make_register(circuit, data, &profile, group);
                data = OutputRef::new(reg, 0);
                inserted += 1;
            }
            if data != driver {
                circuit.node_mut(edge.node).inputs[edge.port] = Some(data);
            }
        }
        log::debug!(
            target: "sluice",
            "balanced {} hint registers into {} stage registers",
            hints.len(),
            inserted
        );
        Ok(())
    }
}

/// Hint-count levels: sources sit at 0, a hint register is one deeper
/// than its driver, combinational nodes take the maximum of their
/// inputs. `None` when the labelling does not stabilise, which means a
/// hint participates in a feedback loop.
fn compute_levels(circuit: &Circuit) -> Option<FnvHashMap<NodeId, usize>> {
    let mut levels: FnvHashMap<NodeId, usize> = FnvHashMap::default();
    let ids = circuit.node_ids();
    let bound = ids.len() + 2;
    for _ in 0..bound {
        let mut changed = false;
        for &id in &ids {
            let node = circuit.node(id);
            let new = match &node.kind {
                NodeKind::Register(s) if s.hint => {
                    node.input(reg_in::DATA)
                        .map(|d| levels.get(&d.node).copied().unwrap_or(0))
                        .unwrap_or(0)
                        + 1
                }
                kind if kind.is_combinational() => node
                    .inputs
                    .iter()
                    .flatten()
                    .map(|i| levels.get(&i.node).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0),
                _ => 0,
            };
            if levels.get(&id).copied().unwrap_or(0) != new {
                levels.insert(id, new);
                changed = true;
            }
        }
        if !changed {
            return Some(levels);
        }
    }
    None
}

/// The number of pipeline stages a sink sees: the hint depth of the
/// driver of the given port. Exposed for tests and reports.
pub fn stage_count(circuit: &Circuit, port: OutputRef) -> usize {
    let mut depth = 0;
    let mut cursor = Some(port);
    let mut guard = 0;
    while let Some(p) = cursor {
        guard += 1;
        if guard > circuit.node_count() + 2 {
            break;
        }
        let node = circuit.node(p.node);
        match &node.kind {
            NodeKind::Register(_) => {
                depth += 1;
                cursor = node.input(reg_in::DATA);
            }
            NodeKind::SignalAlias | NodeKind::Slice { .. } | NodeKind::Extend { .. } => {
                cursor = node.input(0);
            }
            _ => break,
        }
    }
    depth
}
