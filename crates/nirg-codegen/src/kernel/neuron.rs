//! Neuron-update kernel emission (`spec.md` §4.6, 8-step body order).
//!
//! One textual kernel body is emitted per merged neuron group, looping
//! over the group's members (`g`) and, within each member, over its
//! neurons (`id`). Per-member heterogeneous parameters resolve through
//! [`crate::merge::MergedField`] at `g`; everything else is a plain
//! per-neuron array indexed at `id` (or at a delay-slot offset of it).

use nirg_backend::Backend;
use nirg_ir::hash::neuron_group_hash_digest;
use nirg_ir::{Model, NeuronGroupId};
use nirg_transpile::{Binding, Environment, ErrorHandler, LocalVarCache, ResolvedType};

use crate::error::{CodegenError, Result};
use crate::fuse::{fuse_postsynaptic_models, fuse_pre_output_models};
use crate::merge::{field_values, merge_by_digest, MergedGroup};

use super::EmitContext;

/// Emitted neuron-update kernel text plus the merged groups it was built
/// from, so callers (including tests) can inspect per-parameter
/// homogeneity without re-running the merge pass.
pub struct NeuronUpdateOutput {
    pub source: String,
    pub merged_groups: Vec<MergedGroup>,
}

pub fn emit_neuron_update_kernel(model: &Model, backend: &dyn Backend) -> Result<NeuronUpdateOutput> {
    let ectx = EmitContext::new(model);
    let mut merged = merge_by_digest(model.neuron_groups(), neuron_group_hash_digest);
    let ps_fused = fuse_postsynaptic_models(model);
    let pre_fused = fuse_pre_output_models(model);
    let mut errors = ErrorHandler::new();

    let mut blocks = Vec::with_capacity(merged.len());
    for group in &mut merged {
        blocks.push(emit_group(model, &ectx, group, &ps_fused, &pre_fused, backend, &mut errors));
    }

    if errors.has_errors() {
        return Err(CodegenError::Diagnostics(errors.diagnostics().to_vec()));
    }
    Ok(NeuronUpdateOutput { source: blocks.join("\n\n"), merged_groups: merged })
}

#[allow(clippy::too_many_arguments)]
fn emit_group(
    model: &Model,
    ectx: &EmitContext,
    group: &mut MergedGroup,
    ps_fused: &[crate::fuse::FusedConsumerGroup],
    pre_fused: &[crate::fuse::FusedConsumerGroup],
    backend: &dyn Backend,
    errors: &mut ErrorHandler,
) -> String {
    let archetype_id = NeuronGroupId::from_index(group.archetype());
    let archetype = model.neuron_group(archetype_id);

    let mut env = Environment::new();
    let mut cache = LocalVarCache::new();
    let suffix = ectx.literal_suffix();

    env.bind("t", Binding::alias(ectx.type_context.time_type(), "t"));
    env.bind("DT", Binding::alias(ectx.type_context.scalar_type(), format!("{}{suffix}", model.config.dt)));
    env.bind("batch", Binding::alias(ResolvedType::Scalar(nirg_ir::NumericType::U32), "batch"));

    // Neuron-model parameters: one `MergedField` per declared parameter,
    // bound in the environment as either a baked-in literal or an
    // indexed read through `group->{param}Neuron{idx}[g]`.
    for param in &archetype.model.params {
        bind_field(group, &mut env, model.neuron_groups(), param, "Neuron", suffix, |g| g.param_values[param]);
    }
    for (name, _) in &archetype.model.derived_params {
        bind_field(group, &mut env, model.neuron_groups(), name, "Neuron", suffix, |g| g.derived_param_values[name]);
    }

    let delayed = archetype.num_delay_slots > 1;
    for var in &archetype.model.vars {
        let (read, write) = var_backing(&var.name, delayed, archetype.num_delay_slots);
        cache.register(var.name.clone(), format!("l{}", var.name), read, write, ectx.type_context.scalar_type());
    }

    let mut lines = Vec::new();
    lines.push(format!("void updateNeuronsGroup{}(MergedNeuronUpdateGroup{} *group, unsigned int batch) {{", group.index, group.index));
    lines.push("    for (unsigned int g = 0; g < group->numGroups; g++) {".to_string());
    lines.push("        const unsigned int numNeurons = group->numNeurons[g];".to_string());
    lines.push("        for (unsigned int id = 0; id < numNeurons; id++) {".to_string());

    // Step 2: fused postsynaptic apply-input/decay. Every consumer in a
    // fused bucket shares the archetype's backing array: only the
    // archetype's name appears in the emitted accessor, consumers just
    // read/write through it. A target population can have more than one
    // incoming fused bucket (several unfused or differently-fused PS
    // models), so every bucket targeting this population is emitted.
    for fused in ps_fused {
        let archetype_sg = model.synapse_group(fused.archetype);
        if archetype_sg.target != archetype_id {
            continue;
        }
        lines.push(format!("            // postsynaptic input, fused archetype: {}", archetype_sg.name));
        lines.push(format!("            scalar linSyn_{0} = group->inSyn_{0}[g][id];", archetype_sg.name));

        env.push_scope();
        env.bind("Isyn", Binding::writable_alias(ectx.type_context.scalar_type(), "Isyn"));
        env.bind("inSyn", Binding::writable_alias(ectx.type_context.scalar_type(), format!("linSyn_{}", archetype_sg.name)));
        for param in &archetype_sg.postsynaptic_model.params {
            let value = archetype_sg.postsynaptic_param_values[param];
            env.bind(param.clone(), Binding::alias(ectx.type_context.scalar_type(), format!("{value}{suffix}")));
        }
        for (name, _) in &archetype_sg.postsynaptic_model.derived_params {
            let value = archetype_sg.postsynaptic_derived_param_values[name];
            env.bind(name.clone(), Binding::alias(ectx.type_context.scalar_type(), format!("{value}{suffix}")));
        }
        let const_vars = archetype_sg.postsynaptic_const_var_values();
        for var in &archetype_sg.postsynaptic_model.vars {
            if let Some(value) = const_vars.get(&var.name) {
                env.bind(var.name.clone(), Binding::writable_alias(ectx.type_context.scalar_type(), format!("{value}{suffix}")));
            }
        }

        let apply_text = ectx.emit(
            &archetype_sg.postsynaptic_model.apply_input_code,
            &format!("synapse group '{}' postsynaptic apply-input code", archetype_sg.name),
            &mut env,
            &mut cache,
            12,
            errors,
        );
        if !apply_text.is_empty() {
            lines.push(apply_text);
        }
        let decay_text = ectx.emit(
            &archetype_sg.postsynaptic_model.decay_code,
            &format!("synapse group '{}' postsynaptic decay code", archetype_sg.name),
            &mut env,
            &mut cache,
            12,
            errors,
        );
        if !decay_text.is_empty() {
            lines.push(decay_text);
        }
        env.pop_scope();

        lines.push(format!("            group->inSyn_{0}[g][id] = linSyn_{0};", archetype_sg.name));
        if fused.is_fused() {
            let consumer_names: Vec<&str> = fused.consumers.iter().map(|&id| model.synapse_group(id).name.as_str()).collect();
            lines.push(format!("            // fused consumers sharing this array: {}", consumer_names.join(", ")));
        }
    }

    // Step 3: fused pre-output accumulation (this population as source).
    for fused in pre_fused {
        for member in fused.members() {
            let sg = model.synapse_group(member);
            if sg.src != archetype_id || sg.pre_target_var == "Isyn" {
                continue;
            }
            lines.push(format!("            group->{0}[g][id] += group->revInSyn_{1}[g][id];", sg.pre_target_var, sg.name));
        }
    }

    // Step 4: current-source injection.
    for source in model.current_sources() {
        if source.target != archetype_id {
            continue;
        }
        lines.push(format!("            #define injectCurrent(x) ({} += (x))", source.target_var));
        let text = ectx.emit(&source.model.injection_code, &format!("current source '{}'", source.name), &mut env, &mut cache, 12, errors);
        if !text.is_empty() {
            lines.push(text);
        }
        lines.push("            #undef injectCurrent".to_string());
    }

    // Step 5: `Isyn` read-only alias over the accumulated total.
    env.bind("Isyn", Binding::alias(ectx.type_context.scalar_type(), "Isyn"));

    // Step 6: user sim code.
    let sim_text = ectx.emit(&archetype.model.sim_code, &format!("neuron group '{}' sim code", archetype.name), &mut env, &mut cache, 12, errors);
    if !sim_text.is_empty() {
        lines.push(sim_text);
    }

    // Step 7: outgoing WUM pre-dynamics / incoming WUM post-dynamics.
    for sg in model.synapse_groups() {
        if sg.src == archetype_id {
            if let Some(code) = &sg.weight_update_model.pre_dynamics_code {
                let text = ectx.emit(code, &format!("synapse group '{}' pre dynamics", sg.name), &mut env, &mut cache, 12, errors);
                if !text.is_empty() {
                    lines.push(text);
                }
            }
        }
        if sg.target == archetype_id {
            if let Some(code) = &sg.weight_update_model.post_dynamics_code {
                let text = ectx.emit(code, &format!("synapse group '{}' post dynamics", sg.name), &mut env, &mut cache, 12, errors);
                if !text.is_empty() {
                    lines.push(text);
                }
            }
        }
    }

    // Step 8: threshold condition, reset, refractory handling and
    // delay-slot copy-forward.
    if let Some(threshold) = &archetype.model.threshold_condition_code {
        let cond = ectx.emit(threshold, &format!("neuron group '{}' threshold", archetype.name), &mut env, &mut cache, 0, errors);
        lines.push(format!("            const bool spike = ({cond});"));
        lines.push("            if (spike) {".to_string());
        lines.push("                group->spkCount[g]++;".to_string());
        lines.push("                group->spk[g][group->spkCount[g] - 1] = id;".to_string());
        if let Some(reset) = &archetype.model.reset_code {
            let reset_text = ectx.emit(reset, &format!("neuron group '{}' reset", archetype.name), &mut env, &mut cache, 16, errors);
            if !reset_text.is_empty() {
                lines.push(reset_text);
            }
        }
        lines.push("            }".to_string());
    }
    if delayed {
        lines.push("            // delay-slot copy-forward handled by the write-slot backing expansion above".to_string());
    }

    lines.push("        }".to_string());
    lines.push("    }".to_string());
    lines.push("}".to_string());
    lines.join("\n")
}

/// Register and bind one `{param}{kind}{mergedGroupIndex}` field
/// (`spec.md` §8 scenario 2's exact expected field name), computing its
/// per-member values via `accessor` over `items` (the caller's full
/// group slice, indexed by `group`'s member indices).
fn bind_field<T>(
    group: &mut MergedGroup,
    env: &mut Environment,
    items: &[T],
    name: &str,
    kind: &str,
    literal_suffix: &str,
    accessor: impl Fn(&T) -> f64,
) {
    let values = field_values(group, items, accessor);
    let field_name = format!("{name}{kind}{}", group.index);
    group.add_field(field_name.clone(), values);
    let expansion = group.field(&field_name).unwrap().expansion("g", literal_suffix);
    env.bind(name.to_string(), Binding::alias(ResolvedType::Scalar(nirg_ir::NumericType::F32), expansion));
}

/// The read/write backing-array expansions for a state variable. A
/// delayed population writes this step's computed value into the
/// current write slot (`spkQuePtr`) while reading the value it wrote
/// last step, at `(spkQuePtr + numSlots - 1) % numSlots` (`spec.md`
/// §4.1's `(queuePtr + numSlots − delaySteps) mod numSlots` read-index
/// formula with `delaySteps = 1`, the one-step buffering a neuron's own
/// state needs against itself). A non-delayed population reads and
/// writes the same plain slot.
fn var_backing(name: &str, delayed: bool, num_delay_slots: u32) -> (String, String) {
    if delayed {
        let write = format!("group->{name}[g][(*group->spkQuePtr[g]) * numNeurons + id]");
        let read = format!(
            "group->{name}[g][(((*group->spkQuePtr[g]) + {num_delay_slots} - 1) % {num_delay_slots}) * numNeurons + id]"
        );
        (read, write)
    } else {
        (format!("group->{name}[g][id]"), format!("group->{name}[g][id]"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nirg_backend::host::HostBackend;
    use nirg_ir::{models, ModelConfig, NeuronGroup};
    use std::collections::BTreeMap;

    fn izh_values(a: f64) -> BTreeMap<String, f64> {
        [("a", a), ("b", 0.2), ("c", -65.0), ("d", 8.0)].into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn identical_populations_merge_with_every_param_homogeneous() {
        let mut model = Model::new("net");
        model.add_neuron_population(NeuronGroup::new("A", 100, models::izhikevich(), izh_values(0.02)).unwrap()).unwrap();
        model.add_neuron_population(NeuronGroup::new("B", 100, models::izhikevich(), izh_values(0.02)).unwrap()).unwrap();
        model.finalise().unwrap();

        let backend = HostBackend::default();
        let out = emit_neuron_update_kernel(&model, &backend).unwrap();
        assert_eq!(out.merged_groups.len(), 1);
        let group = &out.merged_groups[0];
        for param in ["a", "b", "c", "d"] {
            assert!(!group.is_param_heterogeneous(&format!("{param}Neuron0")));
        }
        assert!(!out.source.contains("group->aNeuron0"));
    }

    #[test]
    fn differing_param_produces_a_heterogeneous_indexed_field() {
        let mut model = Model::new("net");
        model.add_neuron_population(NeuronGroup::new("A", 100, models::izhikevich(), izh_values(0.02)).unwrap()).unwrap();
        model.add_neuron_population(NeuronGroup::new("B", 100, models::izhikevich(), izh_values(0.1)).unwrap()).unwrap();
        model.finalise().unwrap();

        let backend = HostBackend::default();
        let out = emit_neuron_update_kernel(&model, &backend).unwrap();
        assert_eq!(out.merged_groups.len(), 1);
        let group = &out.merged_groups[0];
        assert!(group.is_param_heterogeneous("aNeuron0"));
        assert!(!group.is_param_heterogeneous("bNeuron0"));
        assert!(out.source.contains("group->aNeuron0[g]"));
    }

    #[test]
    fn config_precision_f64_emits_no_literal_suffix() {
        let mut model = Model::new("net");
        model.config = ModelConfig { precision: nirg_ir::NumericType::F64, ..ModelConfig::default() };
        model.add_neuron_population(NeuronGroup::new("A", 10, models::izhikevich(), izh_values(0.02)).unwrap()).unwrap();
        model.finalise().unwrap();

        let backend = HostBackend::default();
        let out = emit_neuron_update_kernel(&model, &backend).unwrap();
        assert!(!out.source.contains("0.02f"));
    }
}
