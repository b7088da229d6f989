//! Erases pure alias nodes. Names migrate to the surviving producer;
//! undriven aliases become undefined constants.

use crate::error::PassError;
use crate::ir::circuit::Circuit;
use crate::ir::node::{ConnectionKind, NodeKind, OutputRef};
use crate::ir::subnet::Subnet;
use crate::logic::VBits;
use crate::passes::pass::Pass;
use crate::report::Reporter;

pub struct StripSignalAliases;

impl Pass for StripSignalAliases {
    fn name(&self) -> &'static str {
        "strip_signal_aliases"
    }

    fn run(
        &self,
        circuit: &mut Circuit,
        subnet: &Subnet,
        _reporter: &mut Reporter,
    ) -> Result<(), PassError> {
        for id in circuit.node_ids() {
            if !subnet.contains(id) || !circuit.contains(id) {
                continue;
            }
            let node = circuit.node(id);
            if !matches!(node.kind, NodeKind::SignalAlias) {
                continue;
            }
            let keep = node.keep;
            match node.input(0) {
                Some(driver) => {
                    circuit.bypass_output_to_input(id, 0, 0);
                    if keep {
                        let driver = resolve(circuit, driver);
                        circuit.node_mut(driver.node).keep = true;
                    }
                    circuit.remove_node(id);
                }
                None => {
                    // reading a never-driven signal yields undefined bits
                    let width = node.outputs[0].width();
                    let group = node.group;
                    let name = node.meta.name.clone();
                    let c = circuit.add_node(
                        NodeKind::Constant(VBits::undef(width)),
                        0,
                        [ConnectionKind::BVec(width)],
                        group,
                    );
                    circuit.node_mut(c).meta.name = name;
                    let src = OutputRef::new(id, 0);
                    for consumer in circuit.consumers_of(src) {
                        circuit.node_mut(consumer.node).inputs[consumer.port] =
                            Some(OutputRef::new(c, 0));
                    }
                    circuit.remove_node(id);
                }
            }
        }
        Ok(())
    }
}

/// Follows alias chains to the real producer, for metadata migration.
fn resolve(circuit: &Circuit, mut port: OutputRef) -> OutputRef {
    loop {
        let node = circuit.node(port.node);
        match (&node.kind, node.input(0)) {
            (NodeKind::SignalAlias, Some(driver)) => port = driver,
            _ => return port,
        }
    }
}
