pub mod check_clock_domains;
pub mod eliminate_dead_code;
pub mod fold_reset_enable;
pub mod infer_memory_ports;
pub mod pass;
pub mod propagate_constants;
pub mod retiming;
pub mod strip_signal_aliases;
pub mod technology_mapping;

use crate::error::PassError;
use crate::ir::circuit::Circuit;
use crate::ir::subnet::Subnet;
use crate::report::Reporter;

pub use pass::Pass;
pub use retiming::{retime_backward_from_input, retime_forward_to_output, RetimeOptions};
pub use technology_mapping::TechMapper;

/// The ordered default pipeline. Individual passes can be switched off
/// through the circuit's config tree under `postprocess/<pass-name>`.
pub struct Postprocess {
    passes: Vec<Box<dyn Pass>>,
}

impl Default for Postprocess {
    fn default() -> Self {
        Postprocess {
            passes: vec![
                Box::new(strip_signal_aliases::StripSignalAliases),
                Box::new(propagate_constants::PropagateConstants),
                Box::new(eliminate_dead_code::EliminateDeadCode),
                Box::new(infer_memory_ports::InferMemoryPorts),
                Box::new(fold_reset_enable::FoldResetEnable),
                Box::new(retiming::RetimeHints),
                Box::new(check_clock_domains::CheckClockDomains),
                Box::new(technology_mapping::TechnologyMapping::none()),
            ],
        }
    }
}

impl Postprocess {
    /// The default pipeline with a vendor mapping hook installed.
    pub fn with_tech_mapper(mapper: Box<dyn TechMapper>) -> Self {
        let mut pipeline = Postprocess::default();
        pipeline.passes.pop();
        pipeline
            .passes
            .push(Box::new(technology_mapping::TechnologyMapping::new(mapper)));
        pipeline
    }

    pub fn push(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    pub fn run(&self, circuit: &mut Circuit, reporter: &mut Reporter) -> Result<(), PassError> {
        for pass in &self.passes {
            let path = format!("postprocess/{}", pass.name());
            if !circuit.config().query_bool(&path, "enabled", true) {
                log::debug!(target: "sluice", "skipping disabled pass {}", pass.name());
                continue;
            }
            let subnet = Subnet::all(circuit);
            log::debug!(
                target: "sluice",
                "running pass {} over {} nodes",
                pass.name(),
                subnet.len()
            );
            pass.run(circuit, &subnet, reporter)?;
        }
        Ok(())
    }
}

/// Runs the default pipeline with the default (log-backed) reporter.
pub fn postprocess(circuit: &mut Circuit) -> Result<(), PassError> {
    Postprocess::default().run(circuit, &mut Reporter::default())
}
