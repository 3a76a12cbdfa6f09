//! # Perturbar
//!
//! FGSM adversarial examples against pretrained ImageNet classifiers.
//!
//! The crate rebuilds Keras MobileNetV2 and ResNet50 from SafeTensors
//! checkpoints on top of a small tape-based autograd engine, takes the
//! gradient of the classification loss with respect to the input pixels,
//! and perturbs the image along its sign. The perturbed image can then be
//! scored by a second model to see whether the attack transfers.
//!
//! ## Modules
//!
//! - [`autograd`]: tensors, tape backward and the image ops
//! - [`nn`]: weight loading, MobileNetV2, ResNet50
//! - [`imaging`]: decode, resize, preprocess, encode
//! - [`labels`]: ImageNet class index and top-k decoding
//! - [`attack`]: FGSM pattern, perturbation, transfer evaluation, report
//! - [`config`]: CLI flags, YAML config, validation
//! - [`cli`]: command handlers and console output

pub mod attack;
pub mod autograd;
pub mod cli;
pub mod config;
pub mod error;
pub mod imaging;
pub mod labels;
pub mod nn;
pub mod trace;

pub use error::{Error, Result};
