//! Ambient CLI glue over the nirg-* code-generation and runtime crates:
//! configuration loading, the built-in demo model, and the `init`/
//! `inspect`/`generate` subcommands. The model-description surface a
//! real user would script against is out of scope here; this crate
//! only drives the built-in model library directly so the rest of the
//! pipeline has something concrete to exercise end to end.

pub mod commands;
pub mod config;
pub mod demo;
pub mod error;

pub use commands::NirgenCli;
