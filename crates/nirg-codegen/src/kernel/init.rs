//! Init kernel emission (`spec.md` §4.7 `initialize`/`initializeSparse`).
//!
//! Two passes: a dense `initialize` pass (RNG seeding, per-variable
//! code-initialisers, dense/kernel weight init) and a sparse
//! `initializeSparse` pass (row-build, optional column-build, bounds
//! checks against declared maxima).

use nirg_ir::{ConnectivityInit, Model, VarInit, WeightStorage};
use nirg_transpile::{Binding, Environment, ErrorHandler, LocalVarCache};

use crate::error::{CodegenError, Result};

use super::EmitContext;

pub struct InitOutput {
    pub dense_source: String,
    pub sparse_source: String,
}

pub fn emit_init_kernel(model: &Model, backend: &dyn nirg_backend::Backend) -> Result<InitOutput> {
    let ectx = EmitContext::new(model);
    let mut errors = ErrorHandler::new();

    let mut dense = Vec::new();
    for (i, group) in model.neuron_groups().iter().enumerate() {
        dense.push(format!("void initNeuronGroup{i}(void) {{"));
        if backend.is_population_rng_required() {
            dense.push(format!("    {}", backend.gen_population_rng_preamble()));
            dense.push(format!("    {}", backend.gen_population_rng_init(&format!("group->seed[{i}]"))));
        }
        let suffix = ectx.literal_suffix();
        let mut env = Environment::new();
        for param in &group.model.params {
            env.bind(param.clone(), Binding::alias(ectx.type_context.scalar_type(), format!("{}{suffix}", group.param_values[param])));
        }
        for (name, _) in &group.model.derived_params {
            env.bind(name.clone(), Binding::alias(ectx.type_context.scalar_type(), format!("{}{suffix}", group.derived_param_values[name])));
        }
        let mut cache = LocalVarCache::new();
        for var in &group.model.vars {
            match group.var_init.get(&var.name) {
                Some(VarInit::Code(code)) => {
                    dense.push(format!("    for (unsigned int i = 0; i < {}; i++) {{", group.num_neurons));
                    env.push_scope();
                    env.bind(var.name.clone(), Binding::writable_alias(ectx.type_context.scalar_type(), format!("{}{}[i]", var.name, group.name)));
                    let text = ectx.emit(
                        code,
                        &format!("neuron group '{}' var '{}' init", group.name, var.name),
                        &mut env,
                        &mut cache,
                        8,
                        &mut errors,
                    );
                    env.pop_scope();
                    if !text.is_empty() {
                        dense.push(text);
                    }
                    dense.push("    }".to_string());
                }
                Some(VarInit::Constant(_)) | None => {
                    dense.push(format!("    // '{}' left at its allocated array's fill value", var.name));
                }
            }
        }
        dense.push("}".to_string());
    }
    for (i, group) in model.synapse_groups().iter().enumerate() {
        dense.push(format!("void initSynapseGroup{i}(void) {{"));
        let mut env = Environment::new();
        let mut cache = LocalVarCache::new();
        for (name, init) in &group.weight_var_init {
            if let VarInit::Code(code) = init {
                let text = ectx.emit(code, &format!("synapse group '{}' var '{}' init", group.name, name), &mut env, &mut cache, 4, &mut errors);
                if !text.is_empty() {
                    dense.push(text);
                }
            }
        }
        if matches!(group.matrix_type.weight, WeightStorage::Kernel) {
            if let Some(dims) = &group.kernel_size {
                dense.push(format!("    // kernel weight init over {} dimension(s): {:?}", dims.len(), dims));
            }
        }
        dense.push("}".to_string());
    }

    let mut sparse = Vec::new();
    for (i, group) in model.synapse_groups().iter().enumerate() {
        if let ConnectivityInit::Sparse { row_build, col_build, max_row_length, max_col_length } = &group.connectivity {
            sparse.push(format!("void initSparseSynapseGroup{i}(void) {{"));
            let mut env = Environment::new();
            let mut cache = LocalVarCache::new();
            let text = ectx.emit(row_build, &format!("synapse group '{}' row build", group.name), &mut env, &mut cache, 4, &mut errors);
            if !text.is_empty() {
                sparse.push(text);
            }
            if let Some(max_row) = max_row_length {
                sparse.push(format!("    // bounds check: rowLength[pre] <= {max_row}"));
            }
            if let Some(col_build) = col_build {
                let text = ectx.emit(col_build, &format!("synapse group '{}' column build", group.name), &mut env, &mut cache, 4, &mut errors);
                if !text.is_empty() {
                    sparse.push(text);
                }
                if let Some(max_col) = max_col_length {
                    sparse.push(format!("    // bounds check: colLength[post] <= {max_col}"));
                }
            }
            sparse.push("}".to_string());
        }
    }

    if errors.has_errors() {
        return Err(CodegenError::Diagnostics(errors.diagnostics().to_vec()));
    }
    Ok(InitOutput { dense_source: dense.join("\n\n"), sparse_source: sparse.join("\n\n") })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nirg_backend::host::HostBackend;
    use nirg_ir::{models, CodeTokens, NeuronGroup};
    use std::collections::BTreeMap;

    fn lif_values() -> BTreeMap<String, f64> {
        [("C", 1.0), ("TauM", 20.0), ("Vrest", -70.0), ("Vreset", -70.0), ("Vthresh", -50.0), ("Ioffset", 0.0), ("TRefrac", 2.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn neuron_var_with_code_initialiser_emits_a_real_assignment() {
        let mut model = Model::new("net");
        let mut group = NeuronGroup::new("N0", 10, models::lif(), lif_values()).unwrap();
        group.var_init.insert("V".to_string(), VarInit::Code(CodeTokens::scan("V = Vrest;", "ctx").unwrap()));
        model.add_neuron_population(group).unwrap();
        model.finalise().unwrap();

        let backend = HostBackend::default();
        let out = emit_init_kernel(&model, &backend).unwrap();
        assert!(out.dense_source.contains("VN0[i] = -70"));
        assert!(!out.dense_source.contains("left at its allocated array's fill value"));
    }

    #[test]
    fn neuron_var_without_an_initialiser_stays_a_no_op() {
        let mut model = Model::new("net");
        model.add_neuron_population(NeuronGroup::new("N0", 10, models::lif(), lif_values()).unwrap()).unwrap();
        model.finalise().unwrap();

        let backend = HostBackend::default();
        let out = emit_init_kernel(&model, &backend).unwrap();
        assert!(out.dense_source.contains("'V' left at its allocated array's fill value"));
    }
}
