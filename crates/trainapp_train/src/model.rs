//! Model trait for training.
//!
//! Defines the forward contract that models must satisfy to work with the
//! learner, the trainer and the export helpers.

use std::fmt;

use burn::prelude::*;

/// A model mapping a batch of feature rows to a batch of outputs.
///
/// Classification models return logits of shape `(batch, n_classes)`;
/// regression models return predictions of shape `(batch, n_targets)`.
///
/// `#[derive(Module)]` provides the `Display` impl the learner logs.
pub trait AppModel<B: Backend>: Module<B> + fmt::Display {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape (batch, features)
    fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2>;
}
