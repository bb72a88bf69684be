//! Structural digests (`spec.md` §4.2).
//!
//! Every digest is 160 bits, built by feeding a fixed set of fields into a
//! [`DigestBuilder`] in a stable order. These are not cryptographic
//! digests — there is no adversary — only a deterministic, collision-rare
//! way to partition groups by "would emit the same code".
//!
//! Three families exist:
//! - plain (`*_hash_digest`): structural equality for fusion/merging,
//!   independent of parameter *values*.
//! - init (`*_init_hash_digest`): structural equality for the init pass.
//! - fuse (`*_fuse_hash_digest`): stricter equality that additionally
//!   folds in the concrete values of constant initialisers and of any
//!   parameter referenced by identifier in the relevant code — this is
//!   what lets two groups share one backing array.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::Hasher;

use crate::neuron::NeuronGroup;
use crate::synapse::SynapseGroup;
use crate::types::ArrayLocation;

/// A 160-bit structural digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashDigest(pub [u8; 20]);

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Incremental builder for a [`HashDigest`]: five independently-seeded
/// 64-bit hashers, each contributing 4 bytes of the final digest.
pub struct DigestBuilder {
    hashers: [DefaultHasher; 5],
}

impl DigestBuilder {
    /// A fresh builder with distinct per-lane seeds.
    pub fn new() -> Self {
        let mut hashers: [DefaultHasher; 5] = Default::default();
        for (i, hasher) in hashers.iter_mut().enumerate() {
            hasher.write_u64(0x9e37_79b9_7f4a_7c15u64.wrapping_mul(i as u64 + 1));
        }
        Self { hashers }
    }

    /// Feed raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        for hasher in &mut self.hashers {
            hasher.write(bytes);
        }
        self
    }

    /// Feed a string (including its length, so `"ab" "c"` != `"a" "bc"`).
    pub fn write_str(&mut self, s: &str) -> &mut Self {
        self.write_u64(s.len() as u64);
        self.write_bytes(s.as_bytes())
    }

    /// Feed a `u64`.
    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        for hasher in &mut self.hashers {
            hasher.write_u64(v);
        }
        self
    }

    /// Feed a `u32`.
    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.write_u64(v as u64)
    }

    /// Feed a `u8`.
    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.write_u64(v as u64)
    }

    /// Feed a `bool`.
    pub fn write_bool(&mut self, v: bool) -> &mut Self {
        self.write_u8(v as u8)
    }

    /// Feed an `f64` by its bit pattern (exact, no float comparison).
    pub fn write_f64(&mut self, v: f64) -> &mut Self {
        self.write_u64(v.to_bits())
    }

    /// Finish, consuming the builder.
    pub fn finish(self) -> HashDigest {
        let mut out = [0u8; 20];
        for (i, hasher) in self.hashers.into_iter().enumerate() {
            let bytes = hasher.finish().to_le_bytes();
            out[i * 4..i * 4 + 4].copy_from_slice(&bytes[0..4]);
        }
        HashDigest(out)
    }
}

impl Default for DigestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural digest for neuron-update emission: model identity, param
/// and variable shape, code text, and the delay-slot count (since
/// `numDelaySlots > 1` changes the emitted indexing shape).
///
/// Used for `getHashDigest`-equivalent fusion decisions among neuron
/// groups.
pub fn neuron_group_hash_digest(group: &NeuronGroup) -> HashDigest {
    let mut b = DigestBuilder::new();
    b.write_str("neuron").write_str(&group.model.name);
    for name in &group.model.params {
        b.write_str(name);
    }
    for (name, _) in &group.model.derived_params {
        b.write_str(name);
    }
    for var in &group.model.vars {
        b.write_str(&var.name).write_u8(var.access as u8);
    }
    b.write_bytes(group.model.sim_code.source.as_bytes());
    if let Some(threshold) = &group.model.threshold_condition_code {
        b.write_bytes(threshold.source.as_bytes());
    }
    if let Some(reset) = &group.model.reset_code {
        b.write_bytes(reset.source.as_bytes());
    }
    b.write_bool(group.model.auto_refractory_required);
    b.write_u32(group.num_delay_slots);
    b.finish()
}

/// Structural digest for a synapse group's weight-update sim/event code
/// ("WU" emission pass).
pub fn wu_hash_digest(group: &SynapseGroup) -> HashDigest {
    let wum = &group.weight_update_model;
    let mut b = DigestBuilder::new();
    b.write_str("wu").write_str(&wum.name);
    b.write_bytes(wum.sim_code.source.as_bytes());
    if let Some(event) = &wum.event_code {
        b.write_bytes(event.source.as_bytes());
    }
    if let Some(threshold) = &wum.event_threshold_code {
        b.write_bytes(threshold.source.as_bytes());
    }
    b.write_u8(group.matrix_type.bits());
    b.write_u32(group.axonal_delay_steps);
    b.finish()
}

/// Structural digest for a synapse group's presynaptic ("WUPre")
/// dynamics code.
pub fn wu_pre_hash_digest(group: &SynapseGroup) -> HashDigest {
    let mut b = DigestBuilder::new();
    b.write_str("wu_pre");
    if let Some(code) = &group.weight_update_model.pre_dynamics_code {
        b.write_bytes(code.source.as_bytes());
    }
    b.write_u32(group.axonal_delay_steps);
    b.finish()
}

/// Structural digest for a synapse group's postsynaptic ("WUPost")
/// dynamics code.
pub fn wu_post_hash_digest(group: &SynapseGroup) -> HashDigest {
    let mut b = DigestBuilder::new();
    b.write_str("wu_post");
    if let Some(code) = &group.weight_update_model.post_dynamics_code {
        b.write_bytes(code.source.as_bytes());
    }
    b.write_u32(group.back_prop_delay_steps);
    b.finish()
}

/// Structural digest for a synapse group's postsynaptic model ("PS")
/// apply-input/decay code.
pub fn ps_hash_digest(group: &SynapseGroup) -> HashDigest {
    let psm = &group.postsynaptic_model;
    let mut b = DigestBuilder::new();
    b.write_str("ps").write_str(&psm.name);
    b.write_bytes(psm.apply_input_code.source.as_bytes());
    b.write_bytes(psm.decay_code.source.as_bytes());
    b.write_str(&group.post_target_var);
    b.finish()
}

/// Structural digest for a synapse group's pre-output (fused
/// accumulation into `outPre`) emission.
pub fn pre_output_hash_digest(group: &SynapseGroup) -> HashDigest {
    let mut b = DigestBuilder::new();
    b.write_str("pre_output").write_str(&group.pre_target_var);
    b.write_u8(group.matrix_type.bits());
    b.finish()
}

/// Structural digest for the dendritic-delay update emission.
pub fn dendritic_delay_update_hash_digest(group: &SynapseGroup) -> HashDigest {
    let mut b = DigestBuilder::new();
    b.write_str("den_delay_update").write_u32(group.max_dendritic_delay_timesteps);
    b.finish()
}

/// Structural digest for the weight-update model's init code.
pub fn wu_init_hash_digest(group: &SynapseGroup) -> HashDigest {
    let mut b = DigestBuilder::new();
    b.write_str("wu_init");
    for var in &group.weight_update_model.vars {
        b.write_str(&var.name).write_u8(var.access as u8);
    }
    b.finish()
}

/// Structural digest for the weight-update model's presynaptic-variable
/// init code.
pub fn wu_pre_init_hash_digest(group: &SynapseGroup) -> HashDigest {
    let mut b = DigestBuilder::new();
    b.write_str("wu_pre_init");
    for var in &group.weight_update_model.pre_vars {
        b.write_str(&var.name).write_u8(var.access as u8);
    }
    b.finish()
}

/// Structural digest for the weight-update model's postsynaptic-variable
/// init code.
pub fn wu_post_init_hash_digest(group: &SynapseGroup) -> HashDigest {
    let mut b = DigestBuilder::new();
    b.write_str("wu_post_init");
    for var in &group.weight_update_model.post_vars {
        b.write_str(&var.name).write_u8(var.access as u8);
    }
    b.finish()
}

/// Structural digest for the postsynaptic model's variable init code.
pub fn ps_init_hash_digest(group: &SynapseGroup) -> HashDigest {
    let mut b = DigestBuilder::new();
    b.write_str("ps_init");
    for var in &group.postsynaptic_model.vars {
        b.write_str(&var.name).write_u8(var.access as u8);
    }
    b.finish()
}

fn referenced_identifiers(code: &crate::codetokens::CodeTokens) -> std::collections::BTreeSet<String> {
    code.tokens
        .iter()
        .filter_map(|t| match &t.kind {
            nirg_transpile::TokenKind::Ident(name) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

fn fold_params_referenced_in(
    b: &mut DigestBuilder,
    codes: &[&crate::codetokens::CodeTokens],
    params: &std::collections::BTreeMap<String, f64>,
) {
    let mut referenced = std::collections::BTreeSet::new();
    for code in codes {
        referenced.extend(referenced_identifiers(code));
    }
    for (name, value) in params {
        if referenced.contains(name) {
            b.write_str(name).write_f64(*value);
        }
    }
}

/// Fuse-level digest for a postsynaptic model: structural digest plus the
/// concrete values of constant var initialisers and any parameter
/// referenced in decay/apply-input code (`spec.md` §4.2, §4.3
/// `canPSBeFused`).
pub fn ps_fuse_hash_digest(group: &SynapseGroup) -> HashDigest {
    let mut b = DigestBuilder::new();
    let base = ps_hash_digest(group);
    b.write_bytes(&base.0);
    fold_params_referenced_in(
        &mut b,
        &[&group.postsynaptic_model.apply_input_code, &group.postsynaptic_model.decay_code],
        &group.postsynaptic_param_values,
    );
    let const_values = group.postsynaptic_const_var_values();
    for var in &group.postsynaptic_model.vars {
        if let Some(value) = const_values.get(&var.name) {
            b.write_str(&var.name).write_f64(*value);
        }
    }
    b.finish()
}

/// Fuse-level digest for weight-update presynaptic dynamics.
pub fn wu_pre_fuse_hash_digest(group: &SynapseGroup) -> HashDigest {
    let mut b = DigestBuilder::new();
    let base = wu_pre_hash_digest(group);
    b.write_bytes(&base.0);
    if let Some(code) = &group.weight_update_model.pre_dynamics_code {
        fold_params_referenced_in(&mut b, &[code], &group.weight_update_param_values);
    }
    for var in &group.weight_update_model.pre_vars {
        if let Some(init) = group.pre_var_init.get(&var.name) {
            if let Some(value) = init.constant_value() {
                b.write_str(&var.name).write_f64(value);
            }
        }
    }
    b.finish()
}

/// Fuse-level digest for weight-update postsynaptic dynamics.
pub fn wu_post_fuse_hash_digest(group: &SynapseGroup) -> HashDigest {
    let mut b = DigestBuilder::new();
    let base = wu_post_hash_digest(group);
    b.write_bytes(&base.0);
    if let Some(code) = &group.weight_update_model.post_dynamics_code {
        fold_params_referenced_in(&mut b, &[code], &group.weight_update_param_values);
    }
    for var in &group.weight_update_model.post_vars {
        if let Some(init) = group.post_var_init.get(&var.name) {
            if let Some(value) = init.constant_value() {
                b.write_str(&var.name).write_f64(value);
            }
        }
    }
    b.finish()
}

/// Digest over a group's memory-placement choices (`spec.md` §4.2
/// `getVarLocationHashDigest`): two groups with the same code shape but
/// different variable locations must not be merged into the same merged
/// group, since field accessors differ by location.
pub fn var_location_hash_digest(locations: &std::collections::BTreeMap<String, ArrayLocation>) -> HashDigest {
    let mut b = DigestBuilder::new();
    for (name, location) in locations {
        b.write_str(name).write_u8(*location as u8);
    }
    b.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_for_equal_input() {
        let mut a = DigestBuilder::new();
        a.write_str("x").write_u32(3);
        let mut b = DigestBuilder::new();
        b.write_str("x").write_u32(3);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn digest_differs_for_different_input() {
        let mut a = DigestBuilder::new();
        a.write_str("x").write_u32(3);
        let mut b = DigestBuilder::new();
        b.write_str("x").write_u32(4);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn display_is_lowercase_hex_of_correct_length() {
        let digest = DigestBuilder::new().finish();
        assert_eq!(digest.to_string().len(), 40);
        assert!(digest.to_string().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
