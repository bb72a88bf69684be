//! Merging/fusion pass and backend-parameterised kernel emitter
//! (`spec.md` §4 "Code generation pipeline").
//!
//! `nirg-ir` describes a model; `nirg-backend` describes a target;
//! this crate is the middle layer that turns the two into emitted
//! source text: structural merging (`merge`), value-level fusion
//! (`fuse`), and the kernel emitter itself (`kernel`), which drives
//! `nirg-transpile` over every code fragment it touches.

pub mod error;
pub mod fuse;
pub mod kernel;
pub mod merge;

pub use error::{CodegenError, Result};
pub use fuse::{fuse_postsynaptic_models, fuse_pre_output_models, fuse_wu_post_models, fuse_wu_pre_models, FusedConsumerGroup};
pub use kernel::{emit_init_kernel, emit_neuron_update_kernel, emit_presynaptic_update_kernel};
pub use kernel::init::InitOutput;
pub use kernel::neuron::NeuronUpdateOutput;
pub use kernel::synapse::PresynapticUpdateOutput;
pub use merge::{is_heterogeneous, merge_by_digest, MergedField, MergedGroup};

use nirg_backend::Backend;
use nirg_ir::Model;

/// Every kernel's emitted source for one model, generated against one
/// backend (`spec.md` §4 pipeline output, consumed by `nirg-runtime`'s
/// compile step).
pub struct GeneratedSource {
    pub neuron_update: NeuronUpdateOutput,
    pub presynaptic_update: PresynapticUpdateOutput,
    pub init: InitOutput,
}

/// Run the full generation pipeline for `model` against `backend`,
/// collecting every kernel pass's diagnostics before failing so a single
/// run surfaces every fragment error at once rather than one at a time.
pub fn generate(model: &Model, backend: &dyn Backend) -> Result<GeneratedSource> {
    let mut diagnostics = Vec::new();

    let neuron_update = match emit_neuron_update_kernel(model, backend) {
        Ok(out) => Some(out),
        Err(CodegenError::Diagnostics(mut d)) => {
            diagnostics.append(&mut d);
            None
        }
        Err(other) => return Err(other),
    };
    let presynaptic_update = match emit_presynaptic_update_kernel(model, backend) {
        Ok(out) => Some(out),
        Err(CodegenError::Diagnostics(mut d)) => {
            diagnostics.append(&mut d);
            None
        }
        Err(other) => return Err(other),
    };
    let init = match emit_init_kernel(model, backend) {
        Ok(out) => Some(out),
        Err(CodegenError::Diagnostics(mut d)) => {
            diagnostics.append(&mut d);
            None
        }
        Err(other) => return Err(other),
    };

    if !diagnostics.is_empty() {
        return Err(CodegenError::Diagnostics(diagnostics));
    }

    Ok(GeneratedSource {
        neuron_update: neuron_update.expect("no diagnostics implies every pass succeeded"),
        presynaptic_update: presynaptic_update.expect("no diagnostics implies every pass succeeded"),
        init: init.expect("no diagnostics implies every pass succeeded"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nirg_backend::host::HostBackend;
    use nirg_ir::{models, NeuronGroup};
    use std::collections::BTreeMap;

    #[test]
    fn generate_produces_every_kernel_pass_for_a_minimal_model() {
        let mut model = Model::new("net");
        let values: BTreeMap<String, f64> =
            [("a", 0.02), ("b", 0.2), ("c", -65.0), ("d", 8.0)].into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        model.add_neuron_population(NeuronGroup::new("N", 10, models::izhikevich(), values).unwrap()).unwrap();
        model.finalise().unwrap();

        let backend = HostBackend::default();
        let generated = generate(&model, &backend).unwrap();
        assert!(!generated.neuron_update.source.is_empty());
    }
}
