//! The evaluation plan: a flat two-plane state layout plus the orders
//! in which nodes evaluate. Built once per post-processed circuit.

use std::ops::Range;

use fnv::FnvHashMap;

use crate::error::SimError;
use crate::ir::circuit::Circuit;
use crate::ir::clock::ClockId;
use crate::ir::graph::CombGraph;
use crate::ir::node::{MemoryInit, NodeId, NodeKind, OutputRef};
use crate::ir::subnet::Subnet;
use crate::logic::VBits;
use crate::sim::memory::MemoryStorage;

pub struct EvalPlan {
    /// Bit range of every output port, indexed `[node][port]`.
    ranges: Vec<Vec<Range<usize>>>,
    pub total_bits: usize,
    /// Combinational nodes in dependency order.
    pub comb_order: Vec<NodeId>,
    /// Sequential nodes per clock, in creation order.
    pub seq_by_clock: FnvHashMap<ClockId, Vec<NodeId>>,
    pub assertions_by_clock: FnvHashMap<ClockId, Vec<NodeId>>,
    /// Clocks that actually drive something, in id order.
    pub used_clocks: Vec<ClockId>,
    /// Memory nodes with their effective initialisation policy.
    pub memories: Vec<(NodeId, usize, usize, MemoryInit)>,
}

impl EvalPlan {
    pub fn build(circuit: &Circuit) -> Result<EvalPlan, SimError> {
        let subnet = Subnet::all(circuit);
        let comb = CombGraph::build(circuit, &subnet);
        let comb_order = comb.topo_order(circuit).map_err(|e| SimError::PlanError {
            reason: e.to_string(),
        })?;

        let max_id = circuit
            .iter_nodes()
            .map(|n| n.id.0 + 1)
            .max()
            .unwrap_or(0);
        let mut ranges = vec![Vec::new(); max_id];
        let mut total_bits = 0;
        for node in circuit.iter_nodes() {
            let mut node_ranges = Vec::with_capacity(node.outputs.len());
            for out in &node.outputs {
                let w = out.width();
                node_ranges.push(total_bits..total_bits + w);
                total_bits += w;
            }
            ranges[node.id.0] = node_ranges;
        }

        let mut seq_by_clock: FnvHashMap<ClockId, Vec<NodeId>> = FnvHashMap::default();
        let mut assertions_by_clock: FnvHashMap<ClockId, Vec<NodeId>> = FnvHashMap::default();
        let mut memories = Vec::new();
        for node in circuit.iter_nodes() {
            match &node.kind {
                NodeKind::Memory {
                    word_width,
                    depth,
                    init,
                } => {
                    let init = effective_init(circuit, node.id, *init);
                    memories.push((node.id, *word_width, *depth, init));
                }
                NodeKind::Assertion { .. } => {
                    let clk = node.clock(0).ok_or_else(|| SimError::PlanError {
                        reason: format!("{} has no clock", node.label()),
                    })?;
                    assertions_by_clock.entry(clk).or_default().push(node.id);
                }
                kind if kind.is_sequential() => {
                    let clk = node.clock(0).ok_or_else(|| SimError::PlanError {
                        reason: format!("{} has no clock", node.label()),
                    })?;
                    seq_by_clock.entry(clk).or_default().push(node.id);
                }
                _ => {}
            }
        }

        let mut used_clocks: Vec<ClockId> = seq_by_clock
            .keys()
            .chain(assertions_by_clock.keys())
            .copied()
            .collect();
        used_clocks.sort();
        used_clocks.dedup();

        Ok(EvalPlan {
            ranges,
            total_bits,
            comb_order,
            seq_by_clock,
            assertions_by_clock,
            used_clocks,
            memories,
        })
    }

    pub fn range(&self, port: OutputRef) -> &Range<usize> {
        &self.ranges[port.node.0][port.port]
    }

    pub fn has_state(&self, node: NodeId) -> bool {
        self.ranges
            .get(node.0)
            .map(|r| !r.is_empty())
            .unwrap_or(false)
    }
}

/// A memory declared with undefined contents inherits the memory-reset
/// policy of the clock driving its write side.
fn effective_init(circuit: &Circuit, memory: NodeId, declared: MemoryInit) -> MemoryInit {
    use crate::ir::clock::MemoryResetPolicy;
    if declared != MemoryInit::Undefined {
        return declared;
    }
    for node in circuit.iter_nodes() {
        if let NodeKind::WritePort { memory: m } = node.kind {
            if m == memory {
                if let Some(clk) = node.clock(0) {
                    return match circuit.clock(clk).config.memory_reset {
                        MemoryResetPolicy::None => MemoryInit::Undefined,
                        MemoryResetPolicy::Zero => MemoryInit::Zero,
                        MemoryResetPolicy::Random => MemoryInit::Random { seed: 1 },
                    };
                }
            }
        }
    }
    declared
}

/// The flat simulation state: one `value` and one `defined` plane, plus
/// per-node auxiliary state for sequential variants.
pub struct SimState {
    pub value: Vec<bool>,
    pub defined: Vec<bool>,
    /// Captured next values awaiting `advance`.
    pub next: FnvHashMap<NodeId, VBits>,
    /// Synchronizer shift chains, oldest last.
    pub chains: FnvHashMap<NodeId, Vec<VBits>>,
    /// Latency-2 read-port middle stages.
    pub stage2: FnvHashMap<NodeId, VBits>,
    pub mems: FnvHashMap<NodeId, MemoryStorage>,
    pub prng: FnvHashMap<NodeId, u64>,
}

impl SimState {
    pub fn new(plan: &EvalPlan) -> SimState {
        let mut mems = FnvHashMap::default();
        for (id, word_width, depth, init) in &plan.memories {
            mems.insert(*id, MemoryStorage::new(*depth, *word_width, *init));
        }
        SimState {
            value: vec![false; plan.total_bits],
            defined: vec![false; plan.total_bits],
            next: FnvHashMap::default(),
            chains: FnvHashMap::default(),
            stage2: FnvHashMap::default(),
            mems,
            prng: FnvHashMap::default(),
        }
    }

    pub fn read(&self, plan: &EvalPlan, port: OutputRef) -> VBits {
        let range = plan.range(port).clone();
        VBits {
            value: self.value[range.clone()].to_vec(),
            defined: self.defined[range].to_vec(),
        }
    }

    pub fn write(&mut self, plan: &EvalPlan, port: OutputRef, bits: &VBits) {
        let range = plan.range(port).clone();
        debug_assert_eq!(range.len(), bits.width());
        self.value[range.clone()].copy_from_slice(&bits.value);
        self.defined[range].copy_from_slice(&bits.defined);
    }
}
