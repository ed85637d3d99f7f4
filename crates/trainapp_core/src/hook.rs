//! Hook identities and training goals.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The overridable hooks of an application.
///
/// Each hook owns a list of parameter descriptors; the command-line layer
/// asks every hook a command calls for its descriptors and turns them into
/// flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    /// Builds the training and validation dataloaders.
    Data,
    /// Builds the model.
    Model,
    /// Chooses the loss function.
    LossFunction,
    /// Chooses validation metrics.
    Metrics,
    /// Framework-owned fitting options (epochs, learning rate, ...).
    Fit,
    /// Builds the dataset to predict on.
    InferenceData,
    /// Consumes predictions.
    OutputResults,
}

impl Hook {
    /// Every hook, in declaration order.
    pub const ALL: [Hook; 7] = [
        Hook::Data,
        Hook::Model,
        Hook::LossFunction,
        Hook::Metrics,
        Hook::Fit,
        Hook::InferenceData,
        Hook::OutputResults,
    ];

    /// snake_case hook name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Model => "model",
            Self::LossFunction => "loss_function",
            Self::Metrics => "metrics",
            Self::Fit => "fit",
            Self::InferenceData => "inference_data",
            Self::OutputResults => "output_results",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction in which a monitored value improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    /// Lower is better.
    Minimize,
    /// Higher is better.
    Maximize,
}

impl Goal {
    /// Goal implied by a monitored value's name: losses are minimized,
    /// everything else is maximized.
    #[must_use]
    pub fn for_monitor(monitor: &str) -> Self {
        if monitor.to_ascii_lowercase().contains("loss") {
            Self::Minimize
        } else {
            Self::Maximize
        }
    }

    /// Whether `candidate` beats `best` by more than `min_delta`.
    #[must_use]
    pub fn is_improvement(&self, candidate: f32, best: f32, min_delta: f32) -> bool {
        match self {
            Self::Minimize => candidate < best - min_delta,
            Self::Maximize => candidate > best + min_delta,
        }
    }

    /// The worst possible value, used to seed best-value tracking.
    #[must_use]
    pub fn worst(&self) -> f32 {
        match self {
            Self::Minimize => f32::INFINITY,
            Self::Maximize => f32::NEG_INFINITY,
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minimize => f.write_str("minimize"),
            Self::Maximize => f.write_str("maximize"),
        }
    }
}
