//! CLI module for perturbar
//!
//! Command handlers and console output helpers.

mod commands;
mod logging;

pub use commands::{run_attack, run_command};
pub use logging::{log, LogLevel};

// Re-export Cli from config for convenience
pub use crate::config::Cli;
