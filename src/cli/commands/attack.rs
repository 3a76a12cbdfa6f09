//! Attack command implementation

use crate::attack::{
    classify, create_adversarial_pattern, evaluate_transfer, is_fooled, linf_distance, one_hot,
    AttackReport, FgsmAttack, TransferResult,
};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::AttackSettings;
use crate::imaging::{load_input, save_jpeg, to_rgb8};
use crate::labels::{ImagenetLabels, Prediction, NUM_CLASSES};
use crate::nn::load_classifier;
use crate::Result;

fn confidence_line(prediction: &Prediction) -> String {
    format!("{} : {:.2}% Confidence", prediction.label, prediction.percent())
}

/// Generate, save and optionally transfer one adversarial example
pub fn run_attack(settings: &AttackSettings, level: LogLevel) -> Result<AttackReport> {
    if let Some(target) = settings.target_label {
        log(level, LogLevel::Normal, &format!("Target label is set to: {target}"));
    }

    if !settings.labels_path.exists() {
        log(
            level,
            LogLevel::Verbose,
            &format!(
                "Class index {} not found, using placeholder labels",
                settings.labels_path.display()
            ),
        );
    }
    let labels = ImagenetLabels::load_or_fallback(&settings.labels_path)?;

    log(
        level,
        LogLevel::Verbose,
        &format!("Loading {} from {}", settings.model, settings.models_dir.display()),
    );
    let model = load_classifier(settings.model, &settings.models_dir)?;

    if settings.print_params {
        log(level, LogLevel::Normal, &format!("Model version: {}", settings.model));
        log(level, LogLevel::Normal, &format!("Model params: {}", model.num_params()));
    }

    let image_path = settings.image_path();
    log(level, LogLevel::Verbose, &format!("Image: {}", image_path.display()));
    let image = load_input(&image_path, model.input_size(), model.preprocess_mode())?;

    let original = classify(model.as_ref(), &image, &labels)?;
    log(level, LogLevel::Normal, &format!("Original image {}", confidence_line(&original)));

    let label_index = settings.label_index();
    let pattern = create_adversarial_pattern(model.as_ref(), &image, &one_hot(label_index, NUM_CLASSES));
    let attack = FgsmAttack::new(settings.epsilon as f32);
    let adversarial_image = attack.perturb(&image, &pattern);

    let adversarial = classify(model.as_ref(), &adversarial_image, &labels)?;
    log(
        level,
        LogLevel::Normal,
        &format!(
            "Adversarial example with epsilon = {:.3}, {}: {:.2}% Confidence",
            settings.epsilon,
            adversarial.label,
            adversarial.percent()
        ),
    );

    let output_path = settings.output_path();
    save_jpeg(&output_path, &to_rgb8(&adversarial_image))?;
    log(
        level,
        LogLevel::Verbose,
        &format!("Saved adversarial example to {}", output_path.display()),
    );

    let transfer = match settings.transfer_model {
        Some(kind) => {
            log(level, LogLevel::Verbose, &format!("Transfer model: {kind}"));
            let transfer_model = load_classifier(kind, &settings.models_dir)?;
            let prediction = evaluate_transfer(transfer_model.as_ref(), &output_path, &labels)?;
            log(level, LogLevel::Normal, &confidence_line(&prediction));
            Some(TransferResult {
                model: kind,
                fooled: is_fooled(&prediction, label_index, settings.is_targeted()),
                prediction,
            })
        }
        None => None,
    };

    Ok(AttackReport {
        image: settings.image.name.clone(),
        model: settings.model,
        model_params: model.num_params(),
        epsilon: settings.epsilon,
        label_index,
        targeted: settings.is_targeted(),
        fooled: is_fooled(&adversarial, label_index, settings.is_targeted()),
        original,
        adversarial,
        linf_perturbation: linf_distance(&image, &adversarial_image),
        output_path,
        transfer,
    })
}
