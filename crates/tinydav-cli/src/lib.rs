//! Command-line front end for tinydav.
//!
//! This crate provides the `tinydav` binary: argument parsing, one
//! function per subcommand and plain-text or JSON rendering.

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::Cli;
pub use error::{CliError, CliResult};
