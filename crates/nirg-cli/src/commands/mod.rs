//! CLI command implementations.

use clap::{Parser, Subcommand};

use crate::error::CliResult;

pub mod generate;
pub mod init;
pub mod inspect;

/// A thin driver over the nirg-* code-generation and runtime crates.
#[derive(Parser, Debug)]
#[command(
    name = "nirgen",
    version,
    about = "Code generator for spiking neural network models",
    long_about = "nirgen builds a model description, fuses/merges its neuron and synapse \
                  populations, and emits the C kernel sources a backend would compile and \
                  load at simulation time."
)]
pub struct NirgenCli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scaffold a new model project with a default `nirgen.toml`.
    #[command(alias = "new")]
    Init(init::InitCommand),

    /// Build and finalise the model described by a config file, printing a summary.
    Inspect(inspect::InspectCommand),

    /// Run the full pipeline and write generated kernel sources to disk.
    #[command(alias = "gen")]
    Generate(generate::GenerateCommand),
}

impl NirgenCli {
    /// Execute the selected subcommand.
    pub fn execute(self) -> CliResult<()> {
        match self.command {
            Commands::Init(cmd) => cmd.execute(),
            Commands::Inspect(cmd) => cmd.execute(),
            Commands::Generate(cmd) => cmd.execute(),
        }
    }
}
