//! Tests for command dispatch error paths
//!
//! Successful runs need checkpoints on disk and live in `tests/attack_cli.rs`.

use super::run_command;
use crate::config::parse_args;
use std::io::Write;

fn run(args: &[&str]) -> Result<(), String> {
    let mut argv = vec!["perturbar"];
    argv.extend_from_slice(args);
    run_command(parse_args(argv).expect("arguments parse"))
}

#[test]
fn test_invalid_epsilon_message() {
    assert_eq!(run(&["-q", "-e", "1.5"]), Err("Epsilon must be between 0 and 1.".to_string()));
}

#[test]
fn test_invalid_model_message() {
    assert_eq!(
        run(&["-q", "-v", "resnet50"]),
        Err("Invalid model version. Choose 'v2-0.5', 'v2-1.0'.".to_string())
    );
}

#[test]
fn test_invalid_transfer_model_message() {
    assert_eq!(
        run(&["-q", "-tv", "inception"]),
        Err("Invalid model version. Choose 'v2-0.5', 'v2-1.0' or 'resnet50'.".to_string())
    );
}

#[test]
fn test_invalid_target_label_message() {
    assert_eq!(
        run(&["-q", "-tl", "1000"]),
        Err("Target label must be between 0 and 999.".to_string())
    );
}

#[test]
fn test_missing_config_file() {
    let err = run(&["-q", "--config", "/nonexistent/attack.yaml"]).unwrap_err();
    assert!(err.starts_with("Config error: Failed to read config file"));
}

#[test]
fn test_cli_overrides_invalid_config_value() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(b"epsilon: 3.0\n").expect("write yaml");
    let path = file.path().to_str().expect("utf-8 path").to_string();

    // The file value alone is rejected
    assert_eq!(
        run(&["-q", "--config", &path]),
        Err("Epsilon must be between 0 and 1.".to_string())
    );

    // A valid flag wins; the run then fails on the missing checkpoint instead
    let dir = tempfile::tempdir().expect("tempdir");
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "epsilon: 3.0\npaths:\n  models_dir: {}", dir.path().display()).expect("write yaml");
    let path = file.path().to_str().expect("utf-8 path").to_string();
    let err = run(&["-q", "--config", &path, "-e", "0.1"]).unwrap_err();
    assert!(err.starts_with("Weight error: Failed to read"), "{err}");
}
