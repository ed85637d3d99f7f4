//! Validation metrics.

use burn::prelude::*;
use trainapp_core::Goal;

/// Trait for validation metrics.
pub trait Metric<B: Backend>: Send + Sync {
    /// Compute the metric from model outputs and targets for one batch.
    fn compute(&self, preds: &Tensor<B, 2>, targets: &Tensor<B, 2>) -> f32;

    /// Get the metric name.
    fn name(&self) -> &str;

    /// Whether higher is better.
    fn higher_is_better(&self) -> bool {
        true
    }
}

/// Direction of improvement of `monitor`.
///
/// A metric named `monitor` decides through [`Metric::higher_is_better`];
/// any other name falls back to [`Goal::for_monitor`].
pub fn monitor_goal<B: Backend>(monitor: &str, metrics: &[Box<dyn Metric<B>>]) -> Goal {
    match metrics.iter().find(|m| m.name() == monitor) {
        Some(metric) if metric.higher_is_better() => Goal::Maximize,
        Some(_) => Goal::Minimize,
        None => Goal::for_monitor(monitor),
    }
}

/// Classification accuracy metric.
///
/// Targets are either a single column of class indices or one-hot rows.
#[derive(Debug, Clone, Default)]
pub struct Accuracy;

impl<B: Backend> Metric<B> for Accuracy {
    fn compute(&self, preds: &Tensor<B, 2>, targets: &Tensor<B, 2>) -> f32 {
        let pred_classes = preds.clone().argmax(1);
        let target_classes = if targets.dims()[1] > 1 {
            targets.clone().argmax(1)
        } else {
            targets.clone().int()
        };

        let correct = pred_classes.equal(target_classes);
        let correct_sum: f32 = correct.int().sum().into_scalar().elem();
        let total = preds.dims()[0] as f32;

        correct_sum / total
    }

    fn name(&self) -> &str {
        "accuracy"
    }
}

/// Mean Squared Error metric.
#[derive(Debug, Clone, Default)]
pub struct MSE;

impl<B: Backend> Metric<B> for MSE {
    fn compute(&self, preds: &Tensor<B, 2>, targets: &Tensor<B, 2>) -> f32 {
        let diff = preds.clone() - targets.clone();
        let squared = diff.clone() * diff;
        squared.mean().into_scalar().elem()
    }

    fn name(&self) -> &str {
        "mse"
    }

    fn higher_is_better(&self) -> bool {
        false
    }
}

/// Mean Absolute Error metric.
#[derive(Debug, Clone, Default)]
pub struct MAE;

impl<B: Backend> Metric<B> for MAE {
    fn compute(&self, preds: &Tensor<B, 2>, targets: &Tensor<B, 2>) -> f32 {
        let diff = preds.clone() - targets.clone();
        diff.abs().mean().into_scalar().elem()
    }

    fn name(&self) -> &str {
        "mae"
    }

    fn higher_is_better(&self) -> bool {
        false
    }
}
