//! `nirgen generate`: run the full pipeline (build → finalise →
//! fuse/merge → kernel emission, `spec.md` §2 "Data flow") against the
//! host reference backend and write each kernel pass's source text to
//! `--out`.

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::config::ModelSettings;
use crate::demo;
use crate::error::CliResult;

#[derive(Args, Debug)]
pub struct GenerateCommand {
    /// Path to a `nirgen.toml` configuration file.
    pub config: PathBuf,

    /// Directory to write the generated kernel source files into.
    #[arg(short, long, default_value = "generated")]
    pub out: PathBuf,
}

impl GenerateCommand {
    pub fn execute(self) -> CliResult<()> {
        let settings = ModelSettings::load(&self.config)?;
        let mut model = demo::build(&settings)?;
        model.finalise()?;

        let backend = nirg_backend::host::HostBackend::default();
        let generated = nirg_codegen::generate(&model, &backend)?;

        std::fs::create_dir_all(&self.out)?;
        let neuron_path = self.out.join("neuron_update.c");
        let presyn_path = self.out.join("presynaptic_update.c");
        let init_path = self.out.join("init.c");
        let init_sparse_path = self.out.join("init_sparse.c");
        std::fs::write(&neuron_path, &generated.neuron_update.source)?;
        std::fs::write(&presyn_path, &generated.presynaptic_update.source)?;
        std::fs::write(&init_path, &generated.init.dense_source)?;
        std::fs::write(&init_sparse_path, &generated.init.sparse_source)?;

        info!("wrote {}", neuron_path.display());
        info!("wrote {}", presyn_path.display());
        info!("wrote {}", init_path.display());
        info!("wrote {}", init_sparse_path.display());
        Ok(())
    }
}
