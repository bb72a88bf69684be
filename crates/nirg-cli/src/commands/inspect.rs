//! `nirgen inspect`: build the model described by a config file, run
//! [`nirg_ir::Model::finalise`], and print its summary (`nirg_ir::Model::
//! to_summary`) plus the merged-group counts each kernel pass would
//! produce against the host reference backend.

use std::path::PathBuf;

use clap::Args;

use crate::config::ModelSettings;
use crate::demo;
use crate::error::CliResult;

#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Path to a `nirgen.toml` configuration file.
    pub config: PathBuf,
}

impl InspectCommand {
    pub fn execute(self) -> CliResult<()> {
        let settings = ModelSettings::load(&self.config)?;
        let mut model = demo::build(&settings)?;
        model.finalise()?;

        println!("{}", model.to_summary());

        let backend = nirg_backend::host::HostBackend::default();
        let generated = nirg_codegen::generate(&model, &backend)?;
        println!(
            "merged neuron-update groups: {}",
            generated.neuron_update.merged_groups.len()
        );
        Ok(())
    }
}
