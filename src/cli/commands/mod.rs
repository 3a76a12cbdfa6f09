//! CLI command implementations

mod attack;

#[cfg(test)]
mod tests;

pub use attack::run_attack;

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{apply_overrides, load_config, validate_config, AttackConfig, Cli};
use crate::trace::TRACER;

/// Execute an attack run based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    let level = LogLevel::from_flags(cli.quiet, cli.verbose);

    let mut config = match &cli.config {
        Some(path) => {
            log(level, LogLevel::Verbose, &format!("Config: {}", path.display()));
            load_config(path).map_err(|e| e.to_string())?
        }
        None => AttackConfig::default(),
    };
    apply_overrides(&mut config, &cli);

    let settings = validate_config(&config).map_err(|e| e.to_string())?;

    if level == LogLevel::Verbose {
        TRACER.clear();
        TRACER.enable();
    }
    let outcome = run_attack(&settings, level);
    if level == LogLevel::Verbose {
        TRACER.disable();
        println!("{}", TRACER.report());
    }
    let report = outcome.map_err(|e| e.to_string())?;

    if let Some(path) = &settings.report {
        report.write(path).map_err(|e| e.to_string())?;
        log(level, LogLevel::Verbose, &format!("Report written to {}", path.display()));
    }
    Ok(())
}
