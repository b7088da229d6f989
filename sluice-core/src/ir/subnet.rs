use fnv::FnvHashSet;

use crate::ir::circuit::Circuit;
use crate::ir::node::NodeId;

/// An unowned set of nodes used to restrict a pass to part of the graph.
#[derive(Clone, Debug, Default)]
pub struct Subnet {
    nodes: FnvHashSet<NodeId>,
}

impl Subnet {
    pub fn all(circuit: &Circuit) -> Self {
        Subnet {
            nodes: circuit.iter_nodes().map(|n| n.id).collect(),
        }
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Subnet {
            nodes: nodes.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn insert(&mut self, id: NodeId) {
        self.nodes.insert(id);
    }

    pub fn remove(&mut self, id: NodeId) {
        self.nodes.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }
}
