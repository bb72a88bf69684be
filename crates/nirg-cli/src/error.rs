//! CLI error taxonomy: every nirg-* crate error folds in verbatim
//! (`spec.md` §7 "Error handling design"); `anyhow` only collapses
//! heterogeneous errors at the process boundary in `main`.

use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("model error: {0}")]
    Ir(#[from] nirg_ir::IrError),

    #[error("code generation error: {0}")]
    Codegen(#[from] nirg_codegen::CodegenError),

    #[error("runtime error: {0}")]
    Runtime(#[from] nirg_runtime::RuntimeError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
}

impl CliError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArgs(msg.into())
    }
}
