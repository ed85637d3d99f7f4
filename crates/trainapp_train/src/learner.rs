//! Learner for managing training.

use std::collections::BTreeMap;
use std::sync::Arc;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::losses::LossFunction;
use crate::metrics::Metric;
use crate::model::AppModel;
use crate::training::{evaluate, Trainer, TrainerConfig, ValidationResult};
use trainapp_core::{Goal, HookArgs, Seed};
use trainapp_data::DataLoaders;

/// Configuration for the Learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// Loss to optimize.
    pub loss: LossFunction,
    /// Monitored value (a metric name, `valid_loss` or `train_loss`).
    pub monitor: Option<String>,
    /// Direction of improvement; derived from the monitored metric or the
    /// monitor name when unset.
    pub goal: Option<Goal>,
    /// Minimum change of the monitored value that counts as improvement.
    pub min_delta: f32,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            loss: LossFunction::CrossEntropy,
            monitor: None,
            goal: None,
            min_delta: 0.0,
        }
    }
}

impl LearnerConfig {
    /// Set the loss.
    #[must_use]
    pub fn with_loss(mut self, loss: LossFunction) -> Self {
        self.loss = loss;
        self
    }

    /// Set the monitored value and its goal.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Option<String>, goal: Option<Goal>) -> Self {
        self.monitor = monitor;
        self.goal = goal;
        self
    }

    /// Set the minimum improvement.
    #[must_use]
    pub fn with_min_delta(mut self, min_delta: f32) -> Self {
        self.min_delta = min_delta;
        self
    }
}

/// Settings of a single `fit` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// Number of epochs.
    pub epochs: usize,
    /// Peak learning rate.
    pub lr: f64,
    /// Weight decay.
    pub weight_decay: f32,
    /// Early stopping patience (0 = disabled).
    pub patience: usize,
    /// Seed for the backend's parameter initialization.
    pub seed: Seed,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            lr: 1e-3,
            weight_decay: 0.01,
            patience: 0,
            seed: Seed::default(),
        }
    }
}

impl FitConfig {
    /// Read the fit settings from hook arguments, keeping defaults for
    /// anything absent.
    pub fn from_args(args: &HookArgs) -> Result<Self> {
        let default = Self::default();
        Ok(Self {
            epochs: args.get_opt::<usize>("epochs")?.unwrap_or(default.epochs),
            lr: args.get_opt::<f64>("lr")?.unwrap_or(default.lr),
            weight_decay: args
                .get_opt::<f32>("weight_decay")?
                .unwrap_or(default.weight_decay),
            patience: args.get_opt::<usize>("patience")?.unwrap_or(default.patience),
            seed: args
                .get_opt::<u64>("seed")?
                .map(Seed::new)
                .unwrap_or(default.seed),
        })
    }
}

/// Training state for checkpointing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    /// Epochs completed.
    pub epoch: usize,
    /// Optimizer steps taken.
    pub step: usize,
    /// Zero-based epoch of the best monitored value.
    pub best_epoch: Option<usize>,
    /// Best monitored value.
    pub best_value: Option<f32>,
    /// Training history.
    pub history: TrainingHistory,
}

/// Training history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Training losses per epoch.
    pub train_losses: Vec<f32>,
    /// Validation losses per epoch.
    pub valid_losses: Vec<f32>,
    /// Metrics per epoch.
    pub metrics: Vec<BTreeMap<String, f32>>,
    /// Learning rates per epoch (last step of the epoch).
    pub lrs: Vec<f64>,
}

/// Model outputs for a set of rows, held on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    outputs: Array2<f32>,
}

impl Predictions {
    /// Wrap raw outputs of shape `(rows, outputs)`.
    #[must_use]
    pub fn new(outputs: Array2<f32>) -> Self {
        Self { outputs }
    }

    /// Number of predicted rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.nrows()
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.nrows() == 0
    }

    /// Number of outputs per row.
    #[must_use]
    pub fn n_outputs(&self) -> usize {
        self.outputs.ncols()
    }

    /// Raw outputs.
    #[must_use]
    pub fn outputs(&self) -> &Array2<f32> {
        &self.outputs
    }

    /// Outputs of one row.
    #[must_use]
    pub fn row(&self, index: usize) -> ArrayView1<'_, f32> {
        self.outputs.index_axis(Axis(0), index)
    }

    /// Index of the largest output of every row (the predicted class).
    #[must_use]
    pub fn decoded(&self) -> Vec<usize> {
        self.outputs
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                    .0
            })
            .collect()
    }
}

/// Learner manages model training.
///
/// # Example
///
/// ```rust,ignore
/// let mut learner = Learner::new(model, dls, LearnerConfig::default(), &device)
///     .with_metrics(vec![Box::new(Accuracy)]);
/// learner.fit(&FitConfig::default())?;
/// let result = learner.validate()?;
/// ```
pub struct Learner<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    model: M,
    dls: DataLoaders,
    config: LearnerConfig,
    state: TrainingState,
    metrics: Arc<Vec<Box<dyn Metric<B::InnerBackend>>>>,
    device: B::Device,
}

impl<B, M> Learner<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    /// Create a new Learner.
    pub fn new(model: M, dls: DataLoaders, config: LearnerConfig, device: &B::Device) -> Self {
        Self {
            model,
            dls,
            config,
            state: TrainingState::default(),
            metrics: Arc::new(Vec::new()),
            device: device.clone(),
        }
    }

    /// Replace the metrics evaluated on the validation set.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Vec<Box<dyn Metric<B::InnerBackend>>>) -> Self {
        self.metrics = Arc::new(metrics);
        self
    }

    /// Get the model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Take the model out of the learner.
    pub fn into_model(self) -> M {
        self.model
    }

    /// Get the dataloaders.
    pub fn dls(&self) -> &DataLoaders {
        &self.dls
    }

    /// Get the configuration.
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// Get the training state.
    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    /// Get the training history.
    pub fn history(&self) -> &TrainingHistory {
        &self.state.history
    }

    /// Get the device.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Names of the configured metrics.
    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.name().to_string()).collect()
    }
}

impl<B, M> Learner<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + AppModel<B> + 'static,
    M::InnerModule: AppModel<B::InnerBackend>,
{
    /// Fit the model with a one-cycle learning rate policy on burn's
    /// learner.
    ///
    /// The learner keeps the returned model (the best one when a monitor is
    /// configured) and the resulting training state.
    pub fn fit(&mut self, fit: &FitConfig) -> Result<&TrainingState> {
        let trainer = Trainer::<B>::new(TrainerConfig::new(&self.config, fit), self.device.clone());
        let output = trainer.fit(self.model.clone(), &self.dls, Arc::clone(&self.metrics))?;

        self.model = output.model;
        self.state = output.state;
        Ok(&self.state)
    }

    /// Evaluate the current model on the validation loader.
    pub fn validate(&self) -> Result<ValidationResult> {
        evaluate(
            &self.model.valid(),
            self.dls.valid(),
            self.config.loss,
            self.metrics.as_slice(),
            &self.device,
        )
    }
}

/// Builds learners from a model and dataloaders.
///
/// Returned by an application's `build_learner_func` so the train and
/// validate commands share one construction path.
pub struct LearnerFactory<B: AutodiffBackend> {
    config: LearnerConfig,
    metrics: Vec<Box<dyn Metric<B::InnerBackend>>>,
    device: B::Device,
}

impl<B: AutodiffBackend> LearnerFactory<B> {
    /// Create a factory.
    pub fn new(config: LearnerConfig, device: &B::Device) -> Self {
        Self {
            config,
            metrics: Vec::new(),
            device: device.clone(),
        }
    }

    /// Metrics handed to every learner built.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Vec<Box<dyn Metric<B::InnerBackend>>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The learner configuration.
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// Build a learner for `model` and `dls`.
    pub fn build<M: AutodiffModule<B>>(self, model: M, dls: DataLoaders) -> Learner<B, M> {
        Learner::new(model, dls, self.config, &self.device).with_metrics(self.metrics)
    }
}
