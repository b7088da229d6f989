use crate::error::PassError;
use crate::ir::circuit::Circuit;
use crate::ir::subnet::Subnet;
use crate::report::Reporter;

/// One graph rewrite. A pass succeeds silently, logs an advisory
/// through the reporter, or fails the pipeline.
pub trait Pass {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        circuit: &mut Circuit,
        subnet: &Subnet,
        reporter: &mut Reporter,
    ) -> Result<(), PassError>;
}
