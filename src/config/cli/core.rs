//! Core CLI types - Cli, argument normalization and config overrides

use crate::config::schema::AttackConfig;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Perturbar: FGSM adversarial examples for ImageNet classifiers
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "perturbar")]
#[command(author = "PAIML")]
#[command(version)]
#[command(
    about = "Generate FGSM adversarial examples against MobileNetV2 and test whether they transfer"
)]
pub struct Cli {
    /// Image to attack, 'panda' or 'labrador' [default: panda]
    #[arg(short, long)]
    pub image: Option<String>,

    /// Perturbation size between 0 and 1, such as 0.01, 0.05, 0.10 [default: 0.0]
    #[arg(short, long, allow_negative_numbers = true)]
    pub epsilon: Option<f64>,

    /// Model to attack, v2-0.5 or v2-1.0 [default: v2-1.0]
    #[arg(short = 'v', long = "model_version", visible_alias = "model-version")]
    pub model_version: Option<String>,

    /// Model to fool with the saved adversarial example (v2-0.5, v2-1.0 or
    /// resnet50); must differ from the attacked model. Short form: -tv
    #[arg(long = "transfer_model_version", visible_alias = "transfer-model-version")]
    pub transfer_model_version: Option<String>,

    /// Class index in [0, 999] to compute the loss against. Short form: -tl
    #[arg(long = "target_label", visible_alias = "target-label", allow_negative_numbers = true)]
    pub target_label: Option<i64>,

    /// Print the number of parameters in the model
    #[arg(short = 'p', long = "print_params", visible_alias = "print-params")]
    pub print_params: bool,

    /// YAML config file; command-line flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write a JSON report of the run to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Enable verbose output and stage timing
    #[arg(long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Two-letter short flags clap cannot express, mapped to their long forms
const MULTI_CHAR_SHORTS: [(&str, &str); 2] =
    [("-tv", "--transfer_model_version"), ("-tl", "--target_label")];

/// Rewrite `-tv`/`-tl` to their long forms, including the `-tv=x` and
/// attached `-tvx` spellings; stops at `--`
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut passthrough = false;
    args.into_iter()
        .map(Into::into)
        .map(|arg: OsString| {
            if passthrough {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                passthrough = true;
                return arg;
            }
            for (short, long) in MULTI_CHAR_SHORTS {
                match text.strip_prefix(short) {
                    Some("") => return OsString::from(long),
                    Some(rest) => {
                        let value = rest.strip_prefix('=').unwrap_or(rest);
                        return OsString::from(format!("{long}={value}"));
                    }
                    None => {}
                }
            }
            arg
        })
        .collect()
}

/// Parse command-line arguments
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(normalize_args(args))
}

/// Apply command-line overrides to an AttackConfig
pub fn apply_overrides(config: &mut AttackConfig, cli: &Cli) {
    if let Some(image) = &cli.image {
        config.image = image.clone();
    }
    if let Some(epsilon) = cli.epsilon {
        config.epsilon = epsilon;
    }
    if let Some(model_version) = &cli.model_version {
        config.model_version = model_version.clone();
    }
    if let Some(transfer) = &cli.transfer_model_version {
        config.transfer_model_version = Some(transfer.clone());
    }
    if let Some(target) = cli.target_label {
        config.target_label = Some(target);
    }
    if cli.print_params {
        config.print_params = true;
    }
    if let Some(report) = &cli.report {
        config.report = Some(report.clone());
    }
}
