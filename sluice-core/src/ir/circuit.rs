use std::collections::BTreeMap;

use internment::Intern;
use smallvec::SmallVec;

use crate::config::ConfigTree;
use crate::error::DesignError;
use crate::ir::clock::{ClockConfig, ClockDef, ClockId};
use crate::ir::group::{GroupId, GroupKind, NodeGroup};
use crate::ir::node::{ConnectionKind, InputRef, Node, NodeId, NodeKind, NodeMeta, OutputRef};

/// The top-level owner. All nodes, clocks and groups live in arenas
/// indexed by stable identities; nothing references across circuits.
pub struct Circuit {
    nodes: Vec<Option<Node>>,
    clocks: Vec<ClockDef>,
    groups: Vec<NodeGroup>,
    root: GroupId,
    config: ConfigTree,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    pub fn new() -> Self {
        let root = GroupId(0);
        Circuit {
            nodes: Vec::new(),
            clocks: Vec::new(),
            groups: vec![NodeGroup::new(root, GroupKind::Entity, "top", None)],
            root,
            config: ConfigTree::default(),
        }
    }

    pub fn root_group(&self) -> GroupId {
        self.root
    }

    pub fn config(&self) -> &ConfigTree {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigTree {
        &mut self.config
    }

    // -- nodes ---------------------------------------------------------

    pub fn add_node(
        &mut self,
        kind: NodeKind,
        inputs: usize,
        outputs: impl IntoIterator<Item = ConnectionKind>,
        group: GroupId,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let node = Node {
            id,
            kind,
            inputs: std::iter::repeat(None).take(inputs).collect(),
            outputs: outputs.into_iter().collect(),
            clocks: SmallVec::new(),
            group,
            meta: NodeMeta::default(),
            keep: false,
        };
        self.groups[group.0].nodes.push(id);
        self.nodes.push(Some(node));
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.0].as_ref().expect("node was removed")
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.0].as_mut().expect("node was removed")
    }

    pub fn try_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.try_node(id).is_some()
    }

    /// Removes a node from the arena and its group. References held by
    /// other nodes' inputs must have been rewired already.
    pub fn remove_node(&mut self, id: NodeId) {
        if let Some(node) = self.nodes[id.0].take() {
            let group = &mut self.groups[node.group.0];
            group.nodes.retain(|n| *n != id);
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// All live nodes in creation order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter_map(|n| n.as_ref())
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.iter_nodes().map(|n| n.id).collect()
    }

    /// Nodes of one group in creation order, optionally recursing into
    /// child groups (children after their parent's own nodes).
    pub fn iter_group(&self, group: GroupId, recursive: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_group(group, recursive, &mut out);
        out
    }

    fn collect_group(&self, group: GroupId, recursive: bool, out: &mut Vec<NodeId>) {
        let g = &self.groups[group.0];
        out.extend(g.nodes.iter().copied().filter(|id| self.contains(*id)));
        if recursive {
            for child in g.children.clone() {
                self.collect_group(child, true, out);
            }
        }
    }

    pub fn output_kind(&self, port: OutputRef) -> ConnectionKind {
        self.node(port.node).outputs[port.port]
    }

    // -- connectivity --------------------------------------------------

    /// Connects an output to an input. Fails if the destination is
    /// already bound; use [`Circuit::rebind`] to replace a binding.
    pub fn connect(&mut self, src: OutputRef, dst: NodeId, dst_port: usize) -> Result<(), DesignError> {
        let node = self.node(dst);
        if dst_port >= node.inputs.len() {
            return Err(DesignError::NoSuchInput {
                node: node.label(),
                port: dst_port,
            });
        }
        if node.inputs[dst_port].is_some() {
            return Err(DesignError::AlreadyConnected {
                node: node.label(),
                input: node.kind.input_name(dst_port).into(),
                site: node.meta.site_string(),
            });
        }
        self.rebind(src, dst, dst_port)
    }

    /// Connects an output to an input, atomically replacing any prior
    /// binding. Widths must agree.
    pub fn rebind(&mut self, src: OutputRef, dst: NodeId, dst_port: usize) -> Result<(), DesignError> {
        let src_node = self.node(src.node);
        if src.port >= src_node.outputs.len() {
            return Err(DesignError::NoSuchOutput {
                node: src_node.label(),
                port: src.port,
            });
        }
        let src_ty = src_node.outputs[src.port];
        let dst_node = self.node(dst);
        if matches!(dst_node.kind, NodeKind::PinInput) {
            return Err(DesignError::PinNotDrivable {
                pin: dst_node.label(),
            });
        }
        if dst_port >= dst_node.inputs.len() {
            return Err(DesignError::NoSuchInput {
                node: dst_node.label(),
                port: dst_port,
            });
        }
        if let Some(expected) = self.expected_input_kind(dst, dst_port) {
            if !expected.connectable(&src_ty) {
                let dst_node = self.node(dst);
                return Err(DesignError::TypeMismatch {
                    node: dst_node.label(),
                    input: dst_node.kind.input_name(dst_port).into(),
                    src_ty: src_ty.to_string(),
                    dst_ty: expected.to_string(),
                    site: dst_node.meta.site_string(),
                });
            }
        }
        self.node_mut(dst).inputs[dst_port] = Some(src);
        Ok(())
    }

    /// The connection type an input port requires, where one is implied
    /// by the variant. `None` means the port is width-polymorphic.
    fn expected_input_kind(&self, id: NodeId, port: usize) -> Option<ConnectionKind> {
        use crate::ir::node::{mux_in, read_port_in, reg_in, write_port_in};
        let node = self.node(id);
        match &node.kind {
            NodeKind::Binary(_) => node.outputs.first().copied(),
            NodeKind::Shift { .. } if port == 0 => node.outputs.first().copied(),
            NodeKind::Unary(_) | NodeKind::SignalAlias => node.outputs.first().copied(),
            NodeKind::Mux if port != mux_in::SEL => node.outputs.first().copied(),
            NodeKind::Mux => Some(ConnectionKind::Bit),
            NodeKind::Register(_) if port == reg_in::DATA || port == reg_in::RESET_VALUE => {
                node.outputs.first().copied()
            }
            NodeKind::Register(_) => Some(ConnectionKind::Bit),
            NodeKind::Synchronizer { .. } => node.outputs.first().copied(),
            NodeKind::ReadPort { .. } if port == read_port_in::ENABLE => Some(ConnectionKind::Bit),
            NodeKind::WritePort { memory } if port == write_port_in::DATA => {
                let m = self.node(*memory);
                match m.kind {
                    NodeKind::Memory { word_width, .. } => Some(ConnectionKind::BVec(word_width)),
                    _ => None,
                }
            }
            NodeKind::WritePort { .. } if port == write_port_in::ENABLE => Some(ConnectionKind::Bit),
            NodeKind::PinOutput | NodeKind::PinTristate | NodeKind::Tap => None,
            NodeKind::Assertion { .. } => Some(ConnectionKind::Bit),
            _ => None,
        }
    }

    /// Infallible: clears the binding of one input port.
    pub fn disconnect(&mut self, dst: NodeId, dst_port: usize) {
        if let Some(node) = self.nodes[dst.0].as_mut() {
            if dst_port < node.inputs.len() {
                node.inputs[dst_port] = None;
            }
        }
    }

    /// Every input port currently consuming `src`, in node-id order.
    pub fn consumers_of(&self, src: OutputRef) -> Vec<InputRef> {
        let mut out = Vec::new();
        for node in self.iter_nodes() {
            for (port, input) in node.inputs.iter().enumerate() {
                if *input == Some(src) {
                    out.push(InputRef {
                        node: node.id,
                        port,
                    });
                }
            }
        }
        out
    }

    /// Rewrites every consumer of `node`'s output `out_idx` to consume
    /// whatever drives input `in_idx` instead, leaving the node itself
    /// without consumers on that output. Name metadata survives on the
    /// producing port's node.
    pub fn bypass_output_to_input(&mut self, node: NodeId, out_idx: usize, in_idx: usize) {
        let Some(driver) = self.node(node).input(in_idx) else {
            return;
        };
        let src = OutputRef::new(node, out_idx);
        let consumers = self.consumers_of(src);
        for c in consumers {
            self.node_mut(c.node).inputs[c.port] = Some(driver);
        }
        // propagate a name onto the surviving producer if it has none
        let name = self.node(node).meta.name.clone();
        if let Some(name) = name {
            let producer = self.node_mut(driver.node);
            if producer.meta.name.is_none() {
                producer.meta.name = Some(name);
            }
        }
    }

    /// Structurally identical node with no incoming connections; used by
    /// retiming and hierarchical replication.
    pub fn clone_unconnected(&mut self, id: NodeId) -> NodeId {
        let src = self.node(id);
        let kind = src.kind.clone();
        let inputs = src.inputs.len();
        let outputs: Vec<ConnectionKind> = src.outputs.to_vec();
        let clocks = src.clocks.clone();
        let group = src.group;
        let meta = NodeMeta {
            name: None,
            comment: src.meta.comment.clone(),
            site: src.meta.site,
        };
        let new_id = self.add_node(kind, inputs, outputs, group);
        let node = self.node_mut(new_id);
        node.clocks = clocks;
        node.meta = meta;
        new_id
    }

    // -- clocks --------------------------------------------------------

    pub fn add_clock(&mut self, config: ClockConfig) -> ClockId {
        let id = ClockId(self.clocks.len());
        self.clocks.push(ClockDef {
            id,
            config,
            pin_source: id,
        });
        id
    }

    /// A logical derivative of `parent`: same domain, possibly different
    /// attributes (e.g. an enable-divided clock).
    pub fn derive_clock(&mut self, parent: ClockId, config: ClockConfig) -> ClockId {
        let pin_source = self.clocks[parent.0].pin_source;
        let id = ClockId(self.clocks.len());
        self.clocks.push(ClockDef {
            id,
            config,
            pin_source,
        });
        id
    }

    pub fn clock(&self, id: ClockId) -> &ClockDef {
        &self.clocks[id.0]
    }

    pub fn clock_mut(&mut self, id: ClockId) -> &mut ClockDef {
        &mut self.clocks[id.0]
    }

    pub fn iter_clocks(&self) -> impl Iterator<Item = &ClockDef> {
        self.clocks.iter()
    }

    /// Two clocks are equivalent when they share a pin source.
    pub fn clocks_equivalent(&self, a: ClockId, b: ClockId) -> bool {
        self.clocks[a.0].pin_source == self.clocks[b.0].pin_source
    }

    // -- groups --------------------------------------------------------

    pub fn add_group(&mut self, parent: GroupId, kind: GroupKind, name: impl Into<String>) -> GroupId {
        let id = GroupId(self.groups.len());
        self.groups.push(NodeGroup::new(id, kind, name, Some(parent)));
        self.groups[parent.0].children.push(id);
        id
    }

    pub fn group(&self, id: GroupId) -> &NodeGroup {
        &self.groups[id.0]
    }

    pub fn group_mut(&mut self, id: GroupId) -> &mut NodeGroup {
        &mut self.groups[id.0]
    }

    /// Root-to-group path of group names, used for hierarchical naming.
    pub fn group_path(&self, id: GroupId) -> Vec<String> {
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(g) = cursor {
            let group = &self.groups[g.0];
            path.push(group.name.clone());
            cursor = group.parent;
        }
        path.reverse();
        path
    }

    /// Moves a node into another group, preserving creation order within
    /// the destination.
    pub fn move_to_group(&mut self, node: NodeId, group: GroupId) {
        let old = self.node(node).group;
        if old == group {
            return;
        }
        self.groups[old.0].nodes.retain(|n| *n != node);
        self.groups[group.0].nodes.push(node);
        self.node_mut(node).group = group;
    }
}

/// Deterministic name resolution for exporters: the same circuit yields
/// the same name for the same node across calls.
pub struct Namespace {
    names: BTreeMap<NodeId, Intern<String>>,
}

impl Namespace {
    pub fn build(circuit: &Circuit) -> Self {
        let mut used: BTreeMap<String, usize> = BTreeMap::new();
        let mut names = BTreeMap::new();
        for node in circuit.iter_nodes() {
            let base = node
                .meta
                .name
                .clone()
                .unwrap_or_else(|| format!("{}_{}", node.kind.type_name(), node.id.0));
            let n = used.entry(base.clone()).or_insert(0);
            let resolved = if *n == 0 {
                base.clone()
            } else {
                format!("{base}_{n}")
            };
            *n += 1;
            names.insert(node.id, Intern::new(resolved));
        }
        Namespace { names }
    }

    pub fn name_of(&self, node: NodeId) -> Option<&str> {
        self.names.get(&node).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::node::BinaryOp;
    use crate::logic::VBits;

    fn constant(circuit: &mut Circuit, value: u128, width: usize) -> OutputRef {
        let group = circuit.root_group();
        let id = circuit.add_node(
            NodeKind::Constant(VBits::from_u128(value, width)),
            0,
            [ConnectionKind::UInt(width)],
            group,
        );
        OutputRef::new(id, 0)
    }

    #[test]
    fn connect_checks_widths() {
        let mut circuit = Circuit::new();
        let group = circuit.root_group();
        let a = constant(&mut circuit, 1, 8);
        let b = constant(&mut circuit, 2, 4);
        let add = circuit.add_node(
            NodeKind::Binary(BinaryOp::Add),
            2,
            [ConnectionKind::UInt(8)],
            group,
        );
        circuit.connect(a, add, 0).unwrap();
        let err = circuit.connect(b, add, 1);
        assert!(matches!(err, Err(crate::error::DesignError::TypeMismatch { .. })));
    }

    #[test]
    fn connect_refuses_bound_inputs_but_rebind_replaces() {
        let mut circuit = Circuit::new();
        let group = circuit.root_group();
        let a = constant(&mut circuit, 1, 8);
        let b = constant(&mut circuit, 2, 8);
        let alias = circuit.add_node(NodeKind::SignalAlias, 1, [ConnectionKind::UInt(8)], group);
        circuit.connect(a, alias, 0).unwrap();
        assert!(matches!(
            circuit.connect(b, alias, 0),
            Err(crate::error::DesignError::AlreadyConnected { .. })
        ));
        circuit.rebind(b, alias, 0).unwrap();
        assert_eq!(circuit.node(alias).input(0), Some(b));
        circuit.disconnect(alias, 0);
        assert_eq!(circuit.node(alias).input(0), None);
    }

    #[test]
    fn bypass_rewires_consumers_and_keeps_names() {
        let mut circuit = Circuit::new();
        let group = circuit.root_group();
        let src = constant(&mut circuit, 5, 8);
        let alias = circuit.add_node(NodeKind::SignalAlias, 1, [ConnectionKind::UInt(8)], group);
        circuit.node_mut(alias).meta.name = Some("tapped".into());
        circuit.connect(src, alias, 0).unwrap();
        let sink = circuit.add_node(NodeKind::PinOutput, 1, Vec::<ConnectionKind>::new(), group);
        circuit
            .connect(OutputRef::new(alias, 0), sink, 0)
            .unwrap();

        circuit.bypass_output_to_input(alias, 0, 0);
        assert_eq!(circuit.node(sink).input(0), Some(src));
        assert_eq!(circuit.node(src.node).meta.name.as_deref(), Some("tapped"));
    }

    #[test]
    fn clone_unconnected_copies_shape_only() {
        let mut circuit = Circuit::new();
        let group = circuit.root_group();
        let a = constant(&mut circuit, 1, 8);
        let add = circuit.add_node(
            NodeKind::Binary(BinaryOp::Add),
            2,
            [ConnectionKind::UInt(8)],
            group,
        );
        circuit.connect(a, add, 0).unwrap();
        let cloned = circuit.clone_unconnected(add);
        let clone = circuit.node(cloned);
        assert_eq!(clone.kind, circuit.node(add).kind);
        assert!(clone.inputs.iter().all(|i| i.is_none()));
    }

    #[test]
    fn group_iteration_follows_creation_order() {
        let mut circuit = Circuit::new();
        let root = circuit.root_group();
        let child = circuit.add_group(root, crate::ir::group::GroupKind::Area, "child");
        let a = constant(&mut circuit, 1, 4);
        let b = circuit.add_node(NodeKind::SignalAlias, 1, [ConnectionKind::UInt(4)], child);
        let c = constant(&mut circuit, 2, 4);
        assert_eq!(circuit.iter_group(root, false), vec![a.node, c.node]);
        assert_eq!(circuit.iter_group(root, true), vec![a.node, c.node, b]);
        assert_eq!(circuit.group_path(child), vec!["top", "child"]);
    }

    #[test]
    fn clock_equivalence_follows_pin_source() {
        use crate::ir::clock::ClockConfig;
        let mut circuit = Circuit::new();
        let base = circuit.add_clock(ClockConfig::new(100_000_000));
        let derived = circuit.derive_clock(base, ClockConfig::new(50_000_000));
        let other = circuit.add_clock(ClockConfig::new(100_000_000));
        assert!(circuit.clocks_equivalent(base, derived));
        assert!(!circuit.clocks_equivalent(base, other));
    }
}
