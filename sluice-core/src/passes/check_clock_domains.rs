//! Clock-domain verification. Every sequential node must be fed from
//! its own domain; the only legal crossing is an explicit synchronizer.
//! Also surfaces combinational cycles, which make domain propagation
//! (and everything downstream) meaningless.

use fnv::FnvHashMap;
use smallvec::SmallVec;

use crate::error::PassError;
use crate::ir::circuit::Circuit;
use crate::ir::clock::ClockId;
use crate::ir::graph::CombGraph;
use crate::ir::node::{reg_in, NodeId, NodeKind};
use crate::ir::subnet::Subnet;
use crate::passes::pass::Pass;
use crate::report::Reporter;

pub struct CheckClockDomains;

type DomainSet = SmallVec<[ClockId; 2]>;

impl Pass for CheckClockDomains {
    fn name(&self) -> &'static str {
        "check_clock_domains"
    }

    fn run(
        &self,
        circuit: &mut Circuit,
        subnet: &Subnet,
        _reporter: &mut Reporter,
    ) -> Result<(), PassError> {
        let comb = CombGraph::build(circuit, subnet);
        let order = comb.topo_order(circuit)?;

        let mut domains: FnvHashMap<NodeId, DomainSet> = FnvHashMap::default();

        // sequential outputs and synchronizers seed their own domain
        for node in circuit.iter_nodes() {
            let own = match &node.kind {
                NodeKind::Register(_)
                | NodeKind::Synchronizer { .. }
                | NodeKind::Prng { .. } => node.clock(0),
                NodeKind::ReadPort { sync: true, .. } => node.clock(0),
                _ => None,
            };
            if let Some(clk) = own {
                let pin = circuit.clock(clk).pin_source;
                domains.insert(node.id, DomainSet::from_slice(&[pin]));
            } else if node.kind.is_sequential() && !matches!(node.kind, NodeKind::WritePort { .. })
            {
                return Err(PassError::MissingClock {
                    node: node.label(),
                });
            }
        }

        // write ports must carry a clock even though they seed nothing:
        // the memory array itself is a sanctioned crossing point, like
        // a synchronizer, so write-side domains do not propagate into
        // read ports
        for node in circuit.iter_nodes() {
            if let NodeKind::WritePort { .. } = node.kind {
                if node.clock(0).is_none() {
                    return Err(PassError::MissingClock {
                        node: node.label(),
                    });
                }
            }
        }

        // propagate through the combinational order
        for id in &order {
            let node = circuit.node(*id);
            let mut set: DomainSet = domains.get(id).cloned().unwrap_or_default();
            for input in node.inputs.iter().flatten() {
                if let Some(src) = domains.get(&input.node) {
                    for d in src {
                        if !set.contains(d) {
                            set.push(*d);
                        }
                    }
                }
            }
            domains.insert(*id, set);
        }

        // every sequential consumer must stay inside its own domain
        for node in circuit.iter_nodes() {
            let own = match &node.kind {
                NodeKind::Register(_) | NodeKind::WritePort { .. } => node.clock(0),
                NodeKind::ReadPort { sync: true, .. } => node.clock(0),
                NodeKind::Assertion { .. } => node.clock(0),
                // the synchronizer is the sanctioned crossing
                NodeKind::Synchronizer { .. } => continue,
                _ => continue,
            };
            let Some(own) = own else {
                return Err(PassError::MissingClock {
                    node: node.label(),
                });
            };
            let own_pin = circuit.clock(own).pin_source;
            for (port, input) in node.inputs.iter().enumerate() {
                let Some(input) = input else { continue };
                // a register's reset value is applied at power-on, not
                // sampled across domains
                if matches!(node.kind, NodeKind::Register(_)) && port == reg_in::RESET_VALUE {
                    continue;
                }
                let Some(set) = domains.get(&input.node) else {
                    continue;
                };
                for d in set {
                    if *d != own_pin {
                        return Err(PassError::ClockDomainCrossing {
                            node: node.label(),
                            from: circuit.clock(*d).display_name(),
                            to: circuit.clock(own).display_name(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
