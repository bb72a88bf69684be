//! `nirgen init`: scaffold a new model project directory with a default
//! `nirgen.toml` (`spec.md` §6 configuration options).

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::config::ModelSettings;
use crate::error::CliResult;

#[derive(Args, Debug)]
pub struct InitCommand {
    /// Directory to scaffold; created if it doesn't exist.
    pub dir: PathBuf,
}

impl InitCommand {
    pub fn execute(self) -> CliResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let config_path = self.dir.join("nirgen.toml");
        ModelSettings::write_default(&config_path)?;
        info!("wrote default configuration to {}", config_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_loadable_config_file() {
        let dir = tempfile::tempdir().unwrap();
        InitCommand { dir: dir.path().to_path_buf() }.execute().unwrap();
        let loaded = ModelSettings::load(&dir.path().join("nirgen.toml")).unwrap();
        assert_eq!(loaded.pre_neurons, ModelSettings::default().pre_neurons);
    }
}
