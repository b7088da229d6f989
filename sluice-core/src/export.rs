//! The consumption interface for textual RTL back-ends. Back-ends are
//! external collaborators: they rely on stable node iteration order,
//! deterministic name resolution, and the parameter maps of external
//! nodes, and never mutate the circuit.

use crate::ir::circuit::{Circuit, Namespace};

pub trait RtlBackend {
    fn name(&self) -> &'static str;

    /// Emits the whole post-processed circuit as RTL source.
    fn emit(&mut self, circuit: &Circuit, namespace: &Namespace) -> anyhow::Result<String>;
}

/// Builds the deterministic namespace a back-end resolves names with.
/// The same circuit yields the same names across calls.
pub fn export_namespace(circuit: &Circuit) -> Namespace {
    Namespace::build(circuit)
}
