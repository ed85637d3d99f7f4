//! Training on the burn-train learner.
//!
//! [`Trainer::fit`] hands the epoch loop to burn's `Learner`; the evaluation
//! and prediction passes behind the validate and predict commands run
//! directly over trainapp dataloaders.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use burn::data::dataloader::{DataLoader as BurnDataLoader, DataLoaderBuilder};
use burn::data::dataset::InMemDataset;
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::AdamConfig;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::AutodiffBackend;
use burn::train::metric::LossMetric;
use burn::train::LearnerBuilder;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TrainError};
use crate::export::load_model;
use crate::learner::{FitConfig, LearnerConfig, Predictions, TrainingState};
use crate::losses::LossFunction;
use crate::metrics::{monitor_goal, Metric};
use crate::model::AppModel;
use crate::renderer::TracingRenderer;
use crate::scheduler::OneCycleLR;
use crate::step::{TabularBatch, TabularBatcher, TabularItem, TrainingModel};
use crate::strategy::{BestEpochCheckpointing, EpochRecorder, PatienceStopping};
use trainapp_core::Goal;
use trainapp_data::{DataLoader, DataLoaders, TabularDataset};

/// Names under which the losses can be monitored.
const LOSS_MONITORS: [&str; 3] = ["loss", "valid_loss", "train_loss"];

/// Training output with history and final model.
#[derive(Debug)]
pub struct TrainingOutput<M> {
    /// Best model when a monitor is set, otherwise the last one.
    pub model: M,
    /// Final training state.
    pub state: TrainingState,
    /// Total training time in seconds.
    pub training_time_secs: f64,
}

/// Loss and metric values from one pass over a dataloader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Mean loss over all samples.
    pub loss: f32,
    /// Mean metric values over all samples, by metric name.
    pub metrics: BTreeMap<String, f32>,
    /// Number of samples evaluated.
    pub n_samples: usize,
}

impl ValidationResult {
    /// Look up a value by name; `loss` and `valid_loss` return the loss.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f32> {
        match name {
            "loss" | "valid_loss" => Some(self.loss),
            other => self.metrics.get(other).copied(),
        }
    }
}

/// Configuration for the trainer.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Number of epochs.
    pub n_epochs: usize,
    /// Peak learning rate of the one-cycle schedule.
    pub lr: f64,
    /// Weight decay.
    pub weight_decay: f32,
    /// Early stopping patience (0 = disabled).
    pub patience: usize,
    /// Minimum change of the monitored value that counts as improvement.
    pub min_delta: f32,
    /// Loss to optimize.
    pub loss: LossFunction,
    /// Monitored value for best-model tracking and early stopping.
    pub monitor: Option<String>,
    /// Direction of improvement of the monitored value.
    pub goal: Option<Goal>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self::new(&LearnerConfig::default(), &FitConfig::default())
    }
}

impl TrainerConfig {
    /// Combine learner and fit settings.
    #[must_use]
    pub fn new(learner: &LearnerConfig, fit: &FitConfig) -> Self {
        Self {
            n_epochs: fit.epochs,
            lr: fit.lr,
            weight_decay: fit.weight_decay,
            patience: fit.patience,
            min_delta: learner.min_delta,
            loss: learner.loss,
            monitor: learner.monitor.clone(),
            goal: learner.goal,
        }
    }

    /// The goal of the monitored value, if any.
    ///
    /// An explicit goal wins; otherwise the metric of that name decides,
    /// then the name itself.
    #[must_use]
    pub fn effective_goal<B: Backend>(&self, metrics: &[Box<dyn Metric<B>>]) -> Option<Goal> {
        self.monitor
            .as_deref()
            .map(|m| self.goal.unwrap_or_else(|| monitor_goal(m, metrics)))
    }
}

/// Trainer running burn's learner on an autodiff backend.
pub struct Trainer<B: AutodiffBackend> {
    config: TrainerConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a new trainer.
    pub fn new(config: TrainerConfig, device: B::Device) -> Self {
        Self { config, device }
    }

    /// The trainer configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train `model` on `dls`, evaluating `metrics` after every epoch.
    ///
    /// With a monitor, the best epoch is checkpointed and its weights are
    /// returned, and early stopping applies; without one the final model is
    /// returned.
    pub fn fit<M>(
        &self,
        model: M,
        dls: &DataLoaders,
        metrics: Arc<Vec<Box<dyn Metric<B::InnerBackend>>>>,
    ) -> Result<TrainingOutput<M>>
    where
        M: AutodiffModule<B> + AppModel<B> + 'static,
        M::InnerModule: AppModel<B::InnerBackend>,
    {
        self.check(metrics.as_slice())?;
        let start_time = Instant::now();

        let goal = self.config.effective_goal(metrics.as_slice());
        if goal.is_none() && self.config.patience > 0 {
            warn!("patience is set but no monitor is declared; early stopping is disabled");
        }

        let train_loader = burn_loader::<B>(dls.train(), &self.device)?;
        let valid_loader = burn_loader::<B::InnerBackend>(dls.valid(), &self.device)?;
        let steps_per_epoch = dls.train().len().div_ceil(dls.train().batch_size());
        let schedule = OneCycleLR::simple(self.config.lr, self.config.n_epochs * steps_per_epoch);

        let monitor = self.config.monitor.clone().zip(goal);
        let recorder = EpochRecorder::new(monitor, self.config.min_delta, schedule.clone()).shared();

        let artifacts = tempfile::tempdir()?;
        let artifact_dir = artifacts.path().to_str().ok_or_else(|| {
            TrainError::CheckpointError(format!(
                "artifact directory {} is not valid UTF-8",
                artifacts.path().display()
            ))
        })?;

        let optimizer =
            AdamConfig::new().with_weight_decay(Some(WeightDecayConfig::new(self.config.weight_decay)));
        let training_model =
            TrainingModel::new(model, self.config.loss, Arc::clone(&recorder), Arc::clone(&metrics));

        let mut builder = LearnerBuilder::new(artifact_dir)
            .metric_train_numeric(LossMetric::new())
            .metric_valid_numeric(LossMetric::new())
            .devices(vec![self.device.clone()])
            .num_epochs(self.config.n_epochs)
            .with_application_logger(None)
            .renderer(TracingRenderer)
            .early_stopping(PatienceStopping::new(Arc::clone(&recorder), self.config.patience));
        if goal.is_some() {
            builder = builder
                .with_file_checkpointer(NamedMpkFileRecorder::<FullPrecisionSettings>::new())
                .with_checkpointing_strategy(BestEpochCheckpointing::new(Arc::clone(&recorder)));
        }

        info!(
            epochs = self.config.n_epochs,
            steps_per_epoch,
            lr = self.config.lr,
            loss = %self.config.loss,
            "starting training"
        );

        let learner = builder.build(training_model, optimizer.init(), schedule);
        let trained = learner.fit(train_loader, valid_loader).into_model();

        let state = recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
            .clone();

        let model = match (goal, state.best_epoch) {
            (Some(_), Some(best_epoch)) => {
                let path = checkpoint_path(artifacts.path(), best_epoch + 1);
                load_model::<B, M>(trained, path, &self.device)?
            }
            _ => trained,
        };

        let training_time_secs = start_time.elapsed().as_secs_f64();
        info!(
            seconds = training_time_secs,
            epochs = state.epoch,
            best_epoch = state.best_epoch.map(|e| e + 1),
            best_value = state.best_value,
            "training complete"
        );

        Ok(TrainingOutput {
            model,
            state,
            training_time_secs,
        })
    }

    fn check(&self, metrics: &[Box<dyn Metric<B::InnerBackend>>]) -> Result<()> {
        if !(self.config.lr.is_finite() && self.config.lr > 0.0) {
            return Err(TrainError::InvalidLearningRate(format!(
                "learning rate must be positive, got {}",
                self.config.lr
            )));
        }
        if self.config.n_epochs == 0 {
            return Err(TrainError::InvalidConfig(
                "number of epochs must be at least 1".to_string(),
            ));
        }
        if let Some(name) = self.config.monitor.as_deref() {
            let known = LOSS_MONITORS.contains(&name) || metrics.iter().any(|m| m.name() == name);
            if !known {
                return Err(TrainError::UnknownMonitor(name.to_string()));
            }
        }
        Ok(())
    }
}

/// The learner's checkpoint of `epoch` (one-based) under `artifact_dir`.
fn checkpoint_path(artifact_dir: &Path, epoch: usize) -> PathBuf {
    artifact_dir.join("checkpoint").join(format!("model-{epoch}"))
}

/// Feed the rows of `loader` to burn's dataloader, keeping its batch size
/// and shuffling.
fn burn_loader<B: Backend>(
    loader: &DataLoader,
    device: &B::Device,
) -> Result<Arc<dyn BurnDataLoader<TabularBatch<B>>>> {
    let items = TabularItem::from_dataset(loader.dataset())?;
    let mut builder =
        DataLoaderBuilder::new(TabularBatcher::<B>::new(device.clone())).batch_size(loader.batch_size());
    if let Some(seed) = loader.shuffle_seed() {
        builder = builder.shuffle(seed);
    }
    Ok(builder.build(InMemDataset::new(items)))
}

/// Evaluate `model` on every batch of `loader`.
///
/// Loss and metrics are averaged over samples, so a short final batch
/// carries its true weight.
pub fn evaluate<B, M>(
    model: &M,
    loader: &DataLoader,
    loss_fn: LossFunction,
    metrics: &[Box<dyn Metric<B>>],
    device: &B::Device,
) -> Result<ValidationResult>
where
    B: Backend,
    M: AppModel<B>,
{
    let mut total_loss = 0.0f32;
    let mut totals: BTreeMap<String, f32> = BTreeMap::new();
    let mut n_samples = 0usize;

    for batch_result in loader.iter::<B>(device) {
        let batch = batch_result?;
        let batch_size = batch.batch_size();

        let y = batch
            .y
            .ok_or_else(|| TrainError::MissingTargets("validation batch has no targets".to_string()))?;

        let outputs = model.forward(batch.x);
        let loss = loss_fn.forward(outputs.clone(), y.clone());
        total_loss += loss.into_scalar().elem::<f32>() * batch_size as f32;

        for metric in metrics {
            let value = metric.compute(&outputs, &y);
            *totals.entry(metric.name().to_string()).or_insert(0.0) += value * batch_size as f32;
        }
        n_samples += batch_size;
    }

    let scale = if n_samples > 0 { 1.0 / n_samples as f32 } else { 0.0 };
    Ok(ValidationResult {
        loss: total_loss * scale,
        metrics: totals.into_iter().map(|(k, v)| (k, v * scale)).collect(),
        n_samples,
    })
}

/// Run `model` over every row of `dataset` and collect the outputs.
pub fn predict<B, M>(
    model: &M,
    dataset: &TabularDataset,
    batch_size: usize,
    device: &B::Device,
) -> Result<Predictions>
where
    B: Backend,
    M: AppModel<B>,
{
    let loader = DataLoader::builder(dataset.clone())
        .batch_size(batch_size)
        .shuffle(false)
        .build()?;

    let mut values: Vec<f32> = Vec::new();
    let mut n_outputs = 0usize;

    for batch_result in loader.iter::<B>(device) {
        let batch = batch_result?;
        let outputs = model.forward(batch.x);
        n_outputs = outputs.dims()[1];
        let data = outputs
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| TrainError::TensorError(format!("{e:?}")))?;
        values.extend(data);
    }

    let outputs = Array2::from_shape_vec((dataset.len(), n_outputs), values)
        .map_err(|e| TrainError::TensorError(e.to_string()))?;
    Ok(Predictions::new(outputs))
}
