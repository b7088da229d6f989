//! The vendor mapping hook. The pipeline hands the post-processed
//! subnet to an external collaborator which may replace subtrees with
//! opaque external nodes; replacements must preserve arity and widths.

use crate::error::PassError;
use crate::ir::circuit::Circuit;
use crate::ir::subnet::Subnet;
use crate::passes::pass::Pass;
use crate::report::Reporter;

pub trait TechMapper {
    fn name(&self) -> &'static str;

    fn map(
        &self,
        circuit: &mut Circuit,
        subnet: &Subnet,
        reporter: &mut Reporter,
    ) -> Result<(), PassError>;
}

pub struct TechnologyMapping {
    mapper: Option<Box<dyn TechMapper>>,
}

impl TechnologyMapping {
    pub fn none() -> Self {
        TechnologyMapping { mapper: None }
    }

    pub fn new(mapper: Box<dyn TechMapper>) -> Self {
        TechnologyMapping {
            mapper: Some(mapper),
        }
    }
}

impl Pass for TechnologyMapping {
    fn name(&self) -> &'static str {
        "technology_mapping"
    }

    fn run(
        &self,
        circuit: &mut Circuit,
        subnet: &Subnet,
        reporter: &mut Reporter,
    ) -> Result<(), PassError> {
        let Some(mapper) = &self.mapper else {
            return Ok(());
        };
        log::debug!(target: "sluice", "technology mapping via {}", mapper.name());
        mapper.map(circuit, subnet, reporter).map_err(|e| match e {
            PassError::TechMappingFailed { .. } => e,
            other => PassError::TechMappingFailed {
                reason: other.to_string(),
            },
        })
    }
}
