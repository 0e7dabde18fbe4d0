//! CLI layer for kvwarm.
//!
//! Provides the command-line interface using clap, with commands for
//! scaffolding config, inspecting what would be loaded, warming the cache,
//! and managing session history.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
