//! Perturbar CLI
//!
//! # Usage
//!
//! ```bash
//! # Untargeted attack on the panda image
//! perturbar -i panda -e 0.1 -v v2-1.0
//!
//! # Targeted attack, printing the parameter count
//! perturbar -i labrador -e 0.05 -tl 1 -p
//!
//! # Check whether the example fools ResNet50
//! perturbar -e 0.1 -v v2-0.5 -tv resnet50 --report run.json
//! ```

use perturbar::cli::run_command;
use perturbar::config::parse_args;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = match parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
