//! Presynaptic-update kernel emission (`spec.md` §4.6 presynaptic
//! propagation).
//!
//! Each synapse group picks its own span (`spec.md` §3 `SpanType`) and,
//! independently, an accumulation strategy chosen here from the group's
//! connectivity and the target backend's shared-memory characteristics:
//! a per-thread register for DENSE/BITMASK connectivity, else shared
//! memory if it fits the backend's block size and shared atomics aren't
//! reported slow, else global atomics. Dendritic-delay writes always use
//! an atomic regardless of that choice, since several source neurons can
//! land on the same delayed slot in the same step.

use nirg_backend::contract::{Axis, AtomicOp, MemorySpace};
use nirg_backend::Backend;
use nirg_ir::hash::wu_hash_digest;
use nirg_ir::{ConnectivityKind, Model, SpanType, SynapseGroupId};
use nirg_transpile::{Binding, Environment, ErrorHandler, LocalVarCache};

use crate::error::{CodegenError, Result};
use crate::merge::merge_by_digest;

use super::EmitContext;

pub struct PresynapticUpdateOutput {
    pub source: String,
}

pub fn emit_presynaptic_update_kernel(model: &Model, backend: &dyn Backend) -> Result<PresynapticUpdateOutput> {
    let ectx = EmitContext::new(model);
    let merged = merge_by_digest(model.synapse_groups(), wu_hash_digest);
    let mut errors = ErrorHandler::new();

    let mut blocks = Vec::with_capacity(merged.len());
    for group in &merged {
        let archetype_id = SynapseGroupId::from_index(group.archetype());
        let archetype = model.synapse_group(archetype_id);
        blocks.push(emit_group(group.index, archetype, &ectx, backend, &mut errors));
    }

    if errors.has_errors() {
        return Err(CodegenError::Diagnostics(errors.diagnostics().to_vec()));
    }
    Ok(PresynapticUpdateOutput { source: blocks.join("\n\n") })
}

fn accumulation_strategy(archetype: &nirg_ir::SynapseGroup, backend: &dyn Backend) -> Accumulation {
    match archetype.matrix_type.connectivity {
        ConnectivityKind::Dense | ConnectivityKind::Bitmask => Accumulation::Register,
        _ => {
            let fits_block = backend.preferences().block_size.presyn_update >= 32;
            if fits_block && !backend.are_shared_mem_atomics_slow() {
                Accumulation::SharedAtomic
            } else {
                Accumulation::GlobalAtomic
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Accumulation {
    Register,
    SharedAtomic,
    GlobalAtomic,
}

fn emit_group(
    index: usize,
    archetype: &nirg_ir::SynapseGroup,
    ectx: &EmitContext,
    backend: &dyn Backend,
    errors: &mut ErrorHandler,
) -> String {
    let accumulation = accumulation_strategy(archetype, backend);
    let dendritic = archetype.requires_dendritic_delay();

    let mut env = Environment::new();
    let mut cache = LocalVarCache::new();
    env.bind("t", Binding::alias(ectx.type_context.time_type(), "t"));

    for var in &archetype.weight_update_model.vars {
        cache.register(
            var.name.clone(),
            format!("l{}", var.name),
            format!("group->{}[g][synIdx]", var.name),
            format!("group->{}[g][synIdx]", var.name),
            ectx.type_context.scalar_type(),
        );
    }

    let add_to_post = match accumulation {
        Accumulation::Register => "(linSyn += (x))".to_string(),
        Accumulation::SharedAtomic => format!("{}(&shLinSyn[ipost], (x))", backend.atomic(nirg_ir::NumericType::F32, AtomicOp::Add, MemorySpace::Shared)),
        Accumulation::GlobalAtomic => format!("{}(&group->inSyn[g][ipost], (x))", backend.atomic(nirg_ir::NumericType::F32, AtomicOp::Add, MemorySpace::Global)),
    };
    let add_to_post_delay = if dendritic {
        format!(
            "{}(&group->denDelay[g][((*group->denDelayPtr[g] + (delaySteps)) % group->maxDendriticDelayTimesteps) * numPost + ipost], (x))",
            backend.atomic(nirg_ir::NumericType::F32, AtomicOp::Add, MemorySpace::Global)
        )
    } else {
        add_to_post.replace("(x)", "(x, delaySteps)")
    };

    let mut lines = Vec::new();
    lines.push(format!(
        "void updatePresynapticGroup{index}(MergedPresynapticUpdateGroup{index} *group) {{ // span: {:?}, accumulation: {:?}",
        archetype.span_type, accumulation
    ));
    match archetype.span_type {
        SpanType::Presynaptic => {
            lines.push(format!("    const unsigned int pre = {};", backend.thread_id(Axis::X)));
            lines.push("    for (unsigned int row = 0; row < group->rowLength[pre]; row++) {".to_string());
            lines.push("        const unsigned int ipost = group->ind[pre][row];".to_string());
            lines.push("        const unsigned int synIdx = pre * group->rowStride + row;".to_string());
        }
        SpanType::Postsynaptic => {
            lines.push(format!("    const unsigned int ipost = {};", backend.thread_id(Axis::X)));
            lines.push("    for (unsigned int pre = 0; pre < group->numSrcNeurons; pre++) {".to_string());
            lines.push("        const unsigned int synIdx = pre * group->rowStride + ipost;".to_string());
        }
    }
    lines.push(format!("        #define addToPost(x) {add_to_post}"));
    lines.push(format!("        #define addToPostDelay(x, delaySteps) {add_to_post_delay}"));

    let text = ectx.emit(&archetype.weight_update_model.sim_code, &format!("synapse group '{}' sim code", archetype.name), &mut env, &mut cache, 8, errors);
    if !text.is_empty() {
        lines.push(text);
    }
    lines.push("        #undef addToPost".to_string());
    lines.push("        #undef addToPostDelay".to_string());
    lines.push("    }".to_string());
    lines.push("}".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use nirg_backend::host::HostBackend;
    use nirg_ir::{models, ArrayLocation, ConnectivityInit, MatrixType, NeuronGroup, VarInit};
    use std::collections::BTreeMap;

    fn lif_values() -> BTreeMap<String, f64> {
        [("C", 1.0), ("TauM", 20.0), ("Vrest", -70.0), ("Vreset", -70.0), ("Vthresh", -50.0), ("Ioffset", 0.0), ("TRefrac", 2.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn dense_connectivity_accumulates_via_register() {
        let mut model = Model::new("net");
        let a = model.add_neuron_population(NeuronGroup::new("A", 10, models::lif(), lif_values()).unwrap()).unwrap();
        let b = model.add_neuron_population(NeuronGroup::new("B", 10, models::lif(), lif_values()).unwrap()).unwrap();
        let mut weight_var_init = BTreeMap::new();
        weight_var_init.insert("g".to_string(), VarInit::Constant(1.0));
        model
            .add_synapse_population(nirg_ir::SynapseGroup {
                name: "S".to_string(),
                src: a,
                target: b,
                matrix_type: MatrixType::dense_individual(),
                connectivity: ConnectivityInit::Dense,
                axonal_delay_steps: 0,
                back_prop_delay_steps: 0,
                max_dendritic_delay_timesteps: 1,
                weight_update_model: models::static_pulse(),
                weight_update_param_values: BTreeMap::new(),
                weight_update_derived_param_values: BTreeMap::new(),
                weight_var_init,
                pre_var_init: BTreeMap::new(),
                post_var_init: BTreeMap::new(),
                postsynaptic_model: models::delta_curr(),
                postsynaptic_param_values: BTreeMap::new(),
                postsynaptic_derived_param_values: BTreeMap::new(),
                postsynaptic_var_init: BTreeMap::new(),
                kernel_size: None,
                span_type: SpanType::Postsynaptic,
                threads_per_spike: 1,
                narrow_sparse_ind: false,
                pre_target_var: "Isyn".to_string(),
                post_target_var: "Isyn".to_string(),
                sparse_connectivity_location: ArrayLocation::default(),
            })
            .unwrap();
        model.finalise().unwrap();

        let backend = HostBackend::default();
        let out = emit_presynaptic_update_kernel(&model, &backend).unwrap();
        assert!(out.source.contains("linSyn += (x)"));
    }
}
