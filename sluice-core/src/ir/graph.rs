//! Traversal helpers over the combinational subgraph. Registers and
//! memory ports are barriers: edges are only drawn between nodes whose
//! variants are combinational.

use fnv::FnvHashMap;
use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::PassError;
use crate::ir::circuit::Circuit;
use crate::ir::node::NodeId;
use crate::ir::subnet::Subnet;

pub struct CombGraph {
    graph: DiGraph<NodeId, ()>,
    index: FnvHashMap<NodeId, NodeIndex>,
}

impl CombGraph {
    /// Builds the driver→consumer graph over combinational nodes of the
    /// subnet. Sequential nodes and pins contribute no edges.
    pub fn build(circuit: &Circuit, subnet: &Subnet) -> Self {
        let mut graph = DiGraph::new();
        let mut index = FnvHashMap::default();
        for node in circuit.iter_nodes() {
            if subnet.contains(node.id) && node.kind.is_combinational() {
                index.insert(node.id, graph.add_node(node.id));
            }
        }
        for node in circuit.iter_nodes() {
            let Some(&dst) = index.get(&node.id) else {
                continue;
            };
            for input in node.inputs.iter().flatten() {
                if let Some(&src) = index.get(&input.node) {
                    graph.add_edge(src, dst, ());
                }
            }
        }
        CombGraph { graph, index }
    }

    /// Topological order (drivers first). A combinational cycle is fatal
    /// and reported with a witness path through the cycle.
    pub fn topo_order(&self, circuit: &Circuit) -> Result<Vec<NodeId>, PassError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order.into_iter().map(|ix| self.graph[ix]).collect()),
            Err(_) => {
                let witness = self.cycle_witness(circuit);
                Err(PassError::CombinationalCycle { witness })
            }
        }
    }

    fn cycle_witness(&self, circuit: &Circuit) -> Vec<String> {
        for scc in kosaraju_scc(&self.graph) {
            if scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]) {
                let mut names: Vec<String> = scc
                    .iter()
                    .map(|ix| circuit.node(self.graph[*ix]).label())
                    .collect();
                // close the loop for readability
                if let Some(first) = names.first().cloned() {
                    names.push(first);
                }
                return names;
            }
        }
        vec!["<cycle not recovered>".into()]
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// True when `to` is reachable from `from` through combinational
    /// nodes only. Used by the stream deadlock check.
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let (Some(&a), Some(&b)) = (self.index.get(&from), self.index.get(&to)) else {
            return false;
        };
        petgraph::algo::has_path_connecting(&self.graph, a, b, None)
    }
}
