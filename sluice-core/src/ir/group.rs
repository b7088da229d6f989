use std::collections::BTreeMap;

use crate::ir::node::NodeId;

#[derive(Copy, Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct GroupId(pub usize);

impl std::fmt::Debug for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

#[derive(Copy, Clone, Eq, Hash, PartialEq, Debug)]
pub enum GroupKind {
    /// A plain naming scope.
    Area,
    /// Exported as its own module/entity.
    Entity,
    /// A special-function unit; tooling may treat it atomically.
    Sfu,
}

/// One level of the hierarchical naming tree. Nodes point back at their
/// group; the group lists them in creation order.
#[derive(Clone, Debug)]
pub struct NodeGroup {
    pub id: GroupId,
    pub kind: GroupKind,
    pub name: String,
    pub parent: Option<GroupId>,
    pub children: Vec<GroupId>,
    pub nodes: Vec<NodeId>,
    /// Typed meta-information attached by library code.
    pub meta: BTreeMap<String, String>,
}

impl NodeGroup {
    pub fn new(id: GroupId, kind: GroupKind, name: impl Into<String>, parent: Option<GroupId>) -> Self {
        NodeGroup {
            id,
            kind,
            name: name.into(),
            parent,
            children: Vec::new(),
            nodes: Vec::new(),
            meta: BTreeMap::new(),
        }
    }
}
