//! Loss functions.

use std::fmt;
use std::str::FromStr;

use burn::nn::loss::{CrossEntropyLossConfig, MseLoss, Reduction};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::TrainError;

/// The loss a learner optimizes.
///
/// Targets are always 2-D: a single column of class indices for
/// [`LossFunction::CrossEntropy`], one column per output otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFunction {
    /// Cross-entropy over logits with class-index targets.
    #[default]
    CrossEntropy,
    /// Mean squared error.
    Mse,
    /// Mean absolute error.
    L1,
}

impl LossFunction {
    /// Short name used in logs and serialized state.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CrossEntropy => "cross_entropy",
            Self::Mse => "mse",
            Self::L1 => "l1",
        }
    }

    /// Whether the loss expects class-index targets.
    #[must_use]
    pub fn is_classification(&self) -> bool {
        matches!(self, Self::CrossEntropy)
    }

    /// Compute the mean loss of `outputs` against `targets`.
    pub fn forward<B: Backend>(&self, outputs: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
        match self {
            Self::CrossEntropy => {
                let [batch_size, _] = targets.dims();
                let targets: Tensor<B, 1, Int> = targets.reshape([batch_size]).int();
                let loss = CrossEntropyLossConfig::new().init(&outputs.device());
                loss.forward(outputs, targets)
            }
            Self::Mse => MseLoss::new().forward(outputs, targets, Reduction::Mean),
            Self::L1 => (outputs - targets).abs().mean(),
        }
    }
}

impl fmt::Display for LossFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LossFunction {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cross_entropy" => Ok(Self::CrossEntropy),
            "mse" => Ok(Self::Mse),
            "l1" => Ok(Self::L1),
            other => Err(TrainError::InvalidConfig(format!("unknown loss '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar().elem::<f32>()
    }

    #[test]
    fn test_cross_entropy_prefers_correct_class() {
        let device = Default::default();
        let targets = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0], &device).reshape([2, 1]);
        let good = Tensor::<TestBackend, 1>::from_floats([5.0, -5.0, -5.0, 5.0], &device).reshape([2, 2]);
        let bad = Tensor::<TestBackend, 1>::from_floats([-5.0, 5.0, 5.0, -5.0], &device).reshape([2, 2]);

        let good_loss = scalar(LossFunction::CrossEntropy.forward(good, targets.clone()));
        let bad_loss = scalar(LossFunction::CrossEntropy.forward(bad, targets));
        assert!(good_loss < 0.01);
        assert!(bad_loss > good_loss);
    }

    #[test]
    fn test_regression_losses() {
        let device = Default::default();
        let preds = Tensor::<TestBackend, 1>::from_floats([1.0, 3.0], &device).reshape([2, 1]);
        let targets = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0], &device).reshape([2, 1]);

        let mse = scalar(LossFunction::Mse.forward(preds.clone(), targets.clone()));
        let l1 = scalar(LossFunction::L1.forward(preds, targets));
        assert!((mse - 2.5).abs() < 1e-6);
        assert!((l1 - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_loss_names_round_trip() {
        for loss in [LossFunction::CrossEntropy, LossFunction::Mse, LossFunction::L1] {
            assert_eq!(loss.name().parse::<LossFunction>().unwrap(), loss);
        }
        assert!("hinge".parse::<LossFunction>().is_err());
        assert_eq!(LossFunction::default(), LossFunction::CrossEntropy);
    }
}
