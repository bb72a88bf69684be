//! Built-in neuron/weight-update/postsynaptic models, grounded in GeNN's
//! own standard model library (LIF, Izhikevich, StaticPulse, STDP,
//! DeltaCurr, ExpCurr).

use std::collections::BTreeMap;

use crate::codetokens::CodeTokens;
use crate::neuron::{DerivedParamFn, NeuronModel};
use crate::synapse::{PostsynapticModel, WeightUpdateModel};
use crate::types::VarSpec;

fn code(source: &str) -> CodeTokens {
    CodeTokens::scan(source, "built-in model").expect("built-in model source is valid")
}

/// Leaky integrate-and-fire neuron with an absolute refractory period.
pub fn lif() -> NeuronModel {
    NeuronModel {
        name: "LIF".to_string(),
        params: vec![
            "C".to_string(),
            "TauM".to_string(),
            "Vrest".to_string(),
            "Vreset".to_string(),
            "Vthresh".to_string(),
            "Ioffset".to_string(),
            "TRefrac".to_string(),
        ],
        derived_params: vec![
            ("ExpTC".to_string(), (|params: &BTreeMap<String, f64>, dt: f64| (-dt / params["TauM"]).exp()) as DerivedParamFn),
            ("Rmembrane".to_string(), (|params: &BTreeMap<String, f64>, _dt: f64| params["TauM"] / params["C"]) as DerivedParamFn),
        ],
        vars: vec![VarSpec::scalar("V"), VarSpec::scalar("RefracTime")],
        additional_input_vars: vec![],
        sim_code: code(
            "if (RefracTime <= 0.0) {\n\
             \tscalar alpha = ((Isyn + Ioffset) * Rmembrane) + Vrest;\n\
             \tV = alpha - (ExpTC * (alpha - V));\n\
             } else {\n\
             \tRefracTime -= DT;\n\
             }",
        ),
        threshold_condition_code: Some(code("RefracTime <= 0.0 && V >= Vthresh")),
        reset_code: Some(code("V = Vreset;\nRefracTime = TRefrac;")),
        support_code: None,
        extra_global_params: vec![],
        auto_refractory_required: true,
    }
}

/// Izhikevich's two-variable spiking neuron model.
pub fn izhikevich() -> NeuronModel {
    NeuronModel {
        name: "Izhikevich".to_string(),
        params: vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()],
        derived_params: vec![],
        vars: vec![VarSpec::scalar("V"), VarSpec::scalar("U")],
        additional_input_vars: vec![],
        sim_code: code(
            "if (V >= 30.0) {\n\
             \tV = c;\n\
             \tU += d;\n\
             }\n\
             V += 0.5 * (0.04 * V * V + 5.0 * V + 140.0 - U + Isyn) * DT;\n\
             V += 0.5 * (0.04 * V * V + 5.0 * V + 140.0 - U + Isyn) * DT;\n\
             U += a * (b * V - U) * DT;",
        ),
        threshold_condition_code: Some(code("V >= 29.99")),
        reset_code: None,
        support_code: None,
        extra_global_params: vec![],
        auto_refractory_required: false,
    }
}

/// Plain static-weight synapse: every presynaptic spike adds the fixed
/// weight `g` to the target's `inSyn`.
pub fn static_pulse() -> WeightUpdateModel {
    WeightUpdateModel {
        name: "StaticPulse".to_string(),
        params: vec![],
        derived_params: vec![],
        vars: vec![VarSpec::scalar("g")],
        pre_vars: vec![],
        post_vars: vec![],
        sim_code: code("addToPost(g);"),
        event_code: None,
        event_threshold_code: None,
        pre_dynamics_code: None,
        post_dynamics_code: None,
        post_learn_code: None,
        synapse_dynamics_code: None,
        extra_global_params: vec![],
    }
}

/// Pair-based spike-timing-dependent plasticity with exponential traces.
pub fn stdp() -> WeightUpdateModel {
    WeightUpdateModel {
        name: "STDP".to_string(),
        params: vec![
            "tauPlus".to_string(),
            "tauMinus".to_string(),
            "Aplus".to_string(),
            "Aminus".to_string(),
            "Wmin".to_string(),
            "Wmax".to_string(),
        ],
        derived_params: vec![],
        vars: vec![VarSpec::scalar("g")],
        pre_vars: vec![VarSpec::scalar("preTrace")],
        post_vars: vec![VarSpec::scalar("postTrace")],
        sim_code: code(
            "addToPost(g);\n\
             preTrace += 1.0;\n\
             scalar newWeight = g - (Aminus * postTrace);\n\
             g = fmin(Wmax, fmax(Wmin, newWeight));",
        ),
        event_code: None,
        event_threshold_code: None,
        pre_dynamics_code: Some(code("preTrace -= (preTrace / tauPlus) * DT;")),
        post_dynamics_code: Some(code("postTrace -= (postTrace / tauMinus) * DT;")),
        post_learn_code: Some(code(
            "postTrace += 1.0;\n\
             scalar newWeight = g + (Aplus * preTrace);\n\
             g = fmin(Wmax, fmax(Wmin, newWeight));",
        )),
        synapse_dynamics_code: None,
        extra_global_params: vec![],
    }
}

/// Instantaneous (Dirac-delta) postsynaptic current: a spike's weight is
/// applied and gone within the same timestep.
pub fn delta_curr() -> PostsynapticModel {
    PostsynapticModel {
        name: "DeltaCurr".to_string(),
        params: vec![],
        derived_params: vec![],
        vars: vec![],
        apply_input_code: code("Isyn += inSyn; inSyn = 0.0;"),
        decay_code: code(""),
        extra_global_params: vec![],
    }
}

/// Single-exponential postsynaptic current with time constant `tau`.
pub fn exp_curr() -> PostsynapticModel {
    PostsynapticModel {
        name: "ExpCurr".to_string(),
        params: vec!["tau".to_string()],
        derived_params: vec![(
            "expDecay".to_string(),
            (|params: &BTreeMap<String, f64>, dt: f64| (-dt / params["tau"]).exp()) as DerivedParamFn,
        )],
        vars: vec![],
        apply_input_code: code("Isyn += inSyn;"),
        decay_code: code("inSyn *= expDecay;"),
        extra_global_params: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lif_declares_refractory_parameter() {
        assert!(lif().has_param("TRefrac"));
    }

    #[test]
    fn stdp_references_both_traces() {
        let model = stdp();
        assert!(model.sim_code.references("preTrace"));
        assert!(model.post_learn_code.as_ref().unwrap().references("postTrace"));
    }

    #[test]
    fn delta_curr_has_no_state() {
        assert!(delta_curr().vars.is_empty());
    }
}
