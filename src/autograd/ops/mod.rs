//! Autograd operations with backward passes
//!
//! This module provides differentiable operations for automatic differentiation.

mod activations;
mod basic;
mod conv;
mod loss;
mod matmul;
mod pool;

// Re-export all public operations
pub use activations::{relu, relu6, softmax};
pub use basic::{add, mul, scale, sum};
pub use conv::{conv2d, Conv2dGeometry, Padding};
pub use loss::{categorical_cross_entropy, PROB_EPSILON};
pub use matmul::matmul;
pub use pool::{global_avg_pool, max_pool2d, pad2d};
