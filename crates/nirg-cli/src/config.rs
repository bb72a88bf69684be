//! On-disk model configuration (`spec.md` §6 "Configuration options"),
//! loaded from TOML the way the teacher's own CLI loads its workspace
//! configuration with `serde` + `toml`.

use std::path::Path;

use nirg_ir::NumericType;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Built-in neuron model selection (`spec.md` §3 supplement: LIF,
/// Izhikevich).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeuronKind {
    Lif,
    Izhikevich,
}

/// Built-in weight-update model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlasticityKind {
    Static,
    Stdp,
}

/// Storage precision, mirroring `spec.md` §6 `precision`/`timePrecision`
/// (`long double` is not offered; the reference host backend has no use
/// for it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Float,
    Double,
}

impl From<Precision> for NumericType {
    fn from(p: Precision) -> Self {
        match p {
            Precision::Float => NumericType::F32,
            Precision::Double => NumericType::F64,
        }
    }
}

/// Full model-level configuration a `nirgen.toml` file describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettingsFile {
    pub name: String,
    pub precision: Precision,
    pub dt: f64,
    pub batch_size: u32,
    pub seed: u64,
    pub fuse_postsynaptic_models: bool,
    pub fuse_pre_post_weight_update_models: bool,
    pub neuron: NeuronKind,
    pub plasticity: PlasticityKind,
    pub pre_neurons: u32,
    pub post_neurons: u32,
    pub initial_weight: f64,
    pub axonal_delay_steps: u32,
    pub narrow_sparse_ind: bool,
}

impl Default for ModelSettingsFile {
    fn default() -> Self {
        Self {
            name: "net".to_string(),
            precision: Precision::Float,
            dt: 1.0,
            batch_size: 1,
            seed: 0,
            fuse_postsynaptic_models: true,
            fuse_pre_post_weight_update_models: true,
            neuron: NeuronKind::Lif,
            plasticity: PlasticityKind::Static,
            pre_neurons: 100,
            post_neurons: 100,
            initial_weight: 1.0,
            axonal_delay_steps: 0,
            narrow_sparse_ind: false,
        }
    }
}

/// Resolved settings consumed by [`crate::demo::build`]: the same data
/// as [`ModelSettingsFile`] with `precision` already mapped to
/// `nirg_ir::NumericType`.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub name: String,
    pub precision: NumericType,
    pub dt: f64,
    pub batch_size: u32,
    pub seed: u64,
    pub fuse_postsynaptic_models: bool,
    pub fuse_pre_post_weight_update_models: bool,
    pub neuron: NeuronKind,
    pub plasticity: PlasticityKind,
    pub pre_neurons: u32,
    pub post_neurons: u32,
    pub initial_weight: f64,
    pub axonal_delay_steps: u32,
    pub narrow_sparse_ind: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        ModelSettingsFile::default().into()
    }
}

impl From<ModelSettingsFile> for ModelSettings {
    fn from(f: ModelSettingsFile) -> Self {
        Self {
            name: f.name,
            precision: f.precision.into(),
            dt: f.dt,
            batch_size: f.batch_size,
            seed: f.seed,
            fuse_postsynaptic_models: f.fuse_postsynaptic_models,
            fuse_pre_post_weight_update_models: f.fuse_pre_post_weight_update_models,
            neuron: f.neuron,
            plasticity: f.plasticity,
            pre_neurons: f.pre_neurons,
            post_neurons: f.post_neurons,
            initial_weight: f.initial_weight,
            axonal_delay_steps: f.axonal_delay_steps,
            narrow_sparse_ind: f.narrow_sparse_ind,
        }
    }
}

impl ModelSettings {
    /// Load from a TOML file, falling back to defaults for any field the
    /// file omits.
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let file: ModelSettingsFile = toml::from_str(&text)?;
        Ok(file.into())
    }

    /// Write the default configuration to `path` (`nirgen init`).
    pub fn write_default(path: &Path) -> CliResult<()> {
        let file = ModelSettingsFile::default();
        let text = toml::to_string_pretty(&file).map_err(|e| CliError::config(format!("failed to serialise default config: {e}")))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_file_round_trips_through_toml() {
        let file = ModelSettingsFile::default();
        let text = toml::to_string_pretty(&file).unwrap();
        let parsed: ModelSettingsFile = toml::from_str(&text).unwrap();
        assert_eq!(parsed.name, file.name);
        assert_eq!(parsed.pre_neurons, file.pre_neurons);
    }

    #[test]
    fn partial_toml_fills_remaining_fields_from_defaults() {
        let parsed: ModelSettingsFile = toml::from_str("pre_neurons = 5\n").unwrap();
        assert_eq!(parsed.pre_neurons, 5);
        assert_eq!(parsed.post_neurons, ModelSettingsFile::default().post_neurons);
    }
}
