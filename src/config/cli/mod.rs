//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! perturbar --image panda --epsilon 0.1 -v v2-1.0
//! perturbar -i labrador -e 0.05 -v v2-0.5 -tv resnet50
//! perturbar -e 0.1 -tl 1 -p
//! perturbar --config attack.yaml --report run.json
//! ```

mod core;

pub use core::{apply_overrides, normalize_args, parse_args, Cli};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::AttackConfig;
    use std::path::PathBuf;

    #[test]
    fn test_parse_defaults() {
        let cli = parse_args(["perturbar"]).unwrap();
        assert_eq!(cli.image, None);
        assert_eq!(cli.epsilon, None);
        assert!(!cli.print_params);
        assert!(!cli.verbose);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_parse_short_flags() {
        let cli = parse_args(["perturbar", "-i", "labrador", "-e", "0.1", "-v", "v2-0.5", "-p"])
            .unwrap();
        assert_eq!(cli.image.as_deref(), Some("labrador"));
        assert_eq!(cli.epsilon, Some(0.1));
        assert_eq!(cli.model_version.as_deref(), Some("v2-0.5"));
        assert!(cli.print_params);
    }

    #[test]
    fn test_parse_two_letter_shorts() {
        let cli = parse_args(["perturbar", "-tv", "resnet50", "-tl", "208"]).unwrap();
        assert_eq!(cli.transfer_model_version.as_deref(), Some("resnet50"));
        assert_eq!(cli.target_label, Some(208));
    }

    #[test]
    fn test_parse_two_letter_shorts_with_equals() {
        let cli = parse_args(["perturbar", "-tv=v2-0.5", "-tl=3"]).unwrap();
        assert_eq!(cli.transfer_model_version.as_deref(), Some("v2-0.5"));
        assert_eq!(cli.target_label, Some(3));
    }

    #[test]
    fn test_parse_two_letter_shorts_attached() {
        let cli = parse_args(["perturbar", "-tvresnet50", "-tl5", "-e0.0025"]).unwrap();
        assert_eq!(cli.transfer_model_version.as_deref(), Some("resnet50"));
        assert_eq!(cli.target_label, Some(5));
        assert_eq!(cli.epsilon, Some(0.0025));
    }

    #[test]
    fn test_typed_epsilon_names_output_file() {
        let cli = parse_args(["perturbar", "-e", "0.0025"]).unwrap();
        let mut config = AttackConfig::default();
        apply_overrides(&mut config, &cli);
        let settings = crate::config::validate_config(&config).unwrap();
        assert_eq!(
            settings.output_path(),
            PathBuf::from("images/adversarial_image_panda_v2-1.0_0.003.jpg")
        );
    }

    #[test]
    fn test_parse_underscore_and_kebab_longs() {
        let cli = parse_args([
            "perturbar",
            "--model_version",
            "v2-1.0",
            "--transfer-model-version",
            "v2-0.5",
            "--target_label",
            "7",
            "--print-params",
        ])
        .unwrap();
        assert_eq!(cli.model_version.as_deref(), Some("v2-1.0"));
        assert_eq!(cli.transfer_model_version.as_deref(), Some("v2-0.5"));
        assert_eq!(cli.target_label, Some(7));
        assert!(cli.print_params);
    }

    #[test]
    fn test_negative_values_reach_validation() {
        let cli = parse_args(["perturbar", "-e", "-0.5", "-tl", "-3"]).unwrap();
        assert_eq!(cli.epsilon, Some(-0.5));
        assert_eq!(cli.target_label, Some(-3));
    }

    #[test]
    fn test_verbose_has_no_short_flag() {
        // -v selects the model version
        let cli = parse_args(["perturbar", "-v", "v2-0.5", "--verbose", "-q"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.quiet);
    }

    #[test]
    fn test_non_numeric_epsilon_rejected() {
        assert!(parse_args(["perturbar", "--epsilon", "lots"]).is_err());
    }

    #[test]
    fn test_normalize_stops_at_double_dash() {
        let args = normalize_args(["perturbar", "-tv", "x", "--", "-tl"]);
        assert_eq!(args, vec!["perturbar", "--transfer_model_version", "x", "--", "-tl"]);
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = AttackConfig { image: "labrador".to_string(), epsilon: 0.2, ..Default::default() };
        let cli = parse_args([
            "perturbar",
            "-e",
            "0.05",
            "-tv",
            "resnet50",
            "--report",
            "run.json",
        ])
        .unwrap();
        apply_overrides(&mut config, &cli);

        assert_eq!(config.image, "labrador");
        assert_eq!(config.epsilon, 0.05);
        assert_eq!(config.model_version, "v2-1.0");
        assert_eq!(config.transfer_model_version.as_deref(), Some("resnet50"));
        assert_eq!(config.report, Some(PathBuf::from("run.json")));
    }

    #[test]
    fn test_print_params_flag_does_not_clear_config() {
        let mut config = AttackConfig { print_params: true, ..Default::default() };
        apply_overrides(&mut config, &parse_args(["perturbar"]).unwrap());
        assert!(config.print_params);
    }
}
