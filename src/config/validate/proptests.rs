//! Property-based tests for configuration validation

use super::error::ValidationError;
use super::validator::validate_config;
use crate::config::schema::AttackConfig;
use proptest::prelude::*;

fn arb_source_model() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["v2-0.5".to_string(), "v2-1.0".to_string()])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_in_range_config_passes(
        epsilon in 0.0f64..=1.0,
        model_version in arb_source_model(),
        target_label in proptest::option::of(0i64..1000),
    ) {
        let config = AttackConfig { epsilon, model_version, target_label, ..Default::default() };
        let settings = validate_config(&config).expect("in-range config validates");
        prop_assert_eq!(settings.epsilon, epsilon);
        prop_assert_eq!(settings.target_label.map(|l| l as i64), target_label);
    }

    #[test]
    fn prop_epsilon_above_one_rejected(epsilon in 1.0001f64..1e6) {
        let config = AttackConfig { epsilon, ..Default::default() };
        prop_assert_eq!(validate_config(&config), Err(ValidationError::InvalidEpsilon(epsilon)));
    }

    #[test]
    fn prop_negative_epsilon_rejected(epsilon in -1e6f64..-1e-6) {
        let config = AttackConfig { epsilon, ..Default::default() };
        prop_assert_eq!(validate_config(&config), Err(ValidationError::InvalidEpsilon(epsilon)));
    }

    #[test]
    fn prop_out_of_range_target_rejected(
        label in prop_oneof![i64::MIN..0, 1000i64..i64::MAX],
    ) {
        let config = AttackConfig { target_label: Some(label), ..Default::default() };
        prop_assert_eq!(validate_config(&config), Err(ValidationError::InvalidTargetLabel(label)));
    }

    #[test]
    fn prop_output_name_embeds_three_decimals(epsilon in 0.0f64..=1.0) {
        let settings = validate_config(&AttackConfig { epsilon, ..Default::default() })
            .expect("valid");
        let expected = format!("adversarial_image_panda_v2-1.0_{epsilon:.3}.jpg");
        let output = settings.output_path();
        prop_assert_eq!(output.file_name().and_then(|n| n.to_str()), Some(expected.as_str()));
    }
}
