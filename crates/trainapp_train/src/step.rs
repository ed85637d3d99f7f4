//! Training and validation steps run by the burn-train learner.
//!
//! [`TrainingModel`] pairs an [`AppModel`] with its loss, its validation
//! metrics and the shared [`EpochRecorder`], so the learner can drive it
//! through [`TrainStep`] and [`ValidStep`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use burn::data::dataloader::batcher::Batcher;
use burn::module::{AutodiffModule, Devices, ModuleMapper, ModuleVisitor};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::train::{RegressionOutput, TrainOutput, TrainStep, ValidStep};

use crate::error::{Result, TrainError};
use crate::losses::LossFunction;
use crate::metrics::Metric;
use crate::model::AppModel;
use crate::strategy::EpochRecorder;
use trainapp_data::TabularDataset;

/// One labelled row of a tabular dataset.
#[derive(Debug, Clone)]
pub struct TabularItem {
    /// Feature values.
    pub features: Vec<f32>,
    /// Target values.
    pub targets: Vec<f32>,
}

impl TabularItem {
    /// Split a labelled dataset into items.
    pub fn from_dataset(dataset: &TabularDataset) -> Result<Vec<Self>> {
        let y = dataset
            .y()
            .ok_or_else(|| TrainError::MissingTargets("training requires a labelled dataset".to_string()))?;

        Ok(dataset
            .x()
            .rows()
            .into_iter()
            .zip(y.rows())
            .map(|(features, targets)| Self {
                features: features.to_vec(),
                targets: targets.to_vec(),
            })
            .collect())
    }
}

/// A batch of rows on a device.
#[derive(Debug, Clone)]
pub struct TabularBatch<B: Backend> {
    /// Features, shape `(batch, features)`.
    pub x: Tensor<B, 2>,
    /// Targets, shape `(batch, targets)`.
    pub y: Tensor<B, 2>,
}

/// Stacks [`TabularItem`]s into a [`TabularBatch`].
#[derive(Debug, Clone)]
pub struct TabularBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> TabularBatcher<B> {
    /// Create a batcher placing tensors on `device`.
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<TabularItem, TabularBatch<B>> for TabularBatcher<B> {
    fn batch(&self, items: Vec<TabularItem>) -> TabularBatch<B> {
        let batch_size = items.len();
        let n_features = items.first().map_or(0, |item| item.features.len());
        let n_targets = items.first().map_or(0, |item| item.targets.len());

        let x: Vec<f32> = items.iter().flat_map(|item| item.features.iter().copied()).collect();
        let y: Vec<f32> = items.iter().flat_map(|item| item.targets.iter().copied()).collect();

        TabularBatch {
            x: Tensor::<B, 1>::from_floats(x.as_slice(), &self.device).reshape([batch_size, n_features]),
            y: Tensor::<B, 1>::from_floats(y.as_slice(), &self.device).reshape([batch_size, n_targets]),
        }
    }
}

/// An [`AppModel`] as seen by the learner.
///
/// `IB` is the backend the validation metrics run on: the inner backend of
/// the autodiff backend being trained.
pub struct TrainingModel<M, IB: Backend> {
    model: M,
    loss: LossFunction,
    recorder: Arc<Mutex<EpochRecorder>>,
    metrics: Arc<Vec<Box<dyn Metric<IB>>>>,
}

impl<M, IB: Backend> TrainingModel<M, IB> {
    /// Wrap `model`.
    pub fn new(
        model: M,
        loss: LossFunction,
        recorder: Arc<Mutex<EpochRecorder>>,
        metrics: Arc<Vec<Box<dyn Metric<IB>>>>,
    ) -> Self {
        Self {
            model,
            loss,
            recorder,
            metrics,
        }
    }

    /// The wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Unwrap the model.
    pub fn into_model(self) -> M {
        self.model
    }

    fn map_model<N>(self, f: impl FnOnce(M) -> N) -> TrainingModel<N, IB> {
        TrainingModel {
            model: f(self.model),
            loss: self.loss,
            recorder: self.recorder,
            metrics: self.metrics,
        }
    }

    fn recorder(&self) -> MutexGuard<'_, EpochRecorder> {
        self.recorder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn forward_step<B>(&self, batch: TabularBatch<B>) -> RegressionOutput<B>
    where
        B: Backend,
        M: AppModel<B>,
    {
        let output = self.model.forward(batch.x);
        let loss = self.loss.forward(output.clone(), batch.y.clone());
        RegressionOutput {
            loss,
            output,
            targets: batch.y,
        }
    }
}

impl<M: Clone, IB: Backend> Clone for TrainingModel<M, IB> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            loss: self.loss,
            recorder: Arc::clone(&self.recorder),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<M: fmt::Debug, IB: Backend> fmt::Debug for TrainingModel<M, IB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingModel")
            .field("model", &self.model)
            .field("loss", &self.loss)
            .field("metrics", &self.metrics.len())
            .finish()
    }
}

impl<M: fmt::Display, IB: Backend> fmt::Display for TrainingModel<M, IB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.model, f)
    }
}

impl<B, M, IB> Module<B> for TrainingModel<M, IB>
where
    B: Backend,
    M: Module<B>,
    IB: Backend,
{
    type Record = M::Record;

    fn collect_devices(&self, devices: Devices<B>) -> Devices<B> {
        self.model.collect_devices(devices)
    }

    fn fork(self, device: &B::Device) -> Self {
        self.map_model(|model| model.fork(device))
    }

    fn to_device(self, device: &B::Device) -> Self {
        self.map_model(|model| model.to_device(device))
    }

    fn visit<V: ModuleVisitor<B>>(&self, visitor: &mut V) {
        self.model.visit(visitor);
    }

    fn map<Mapper: ModuleMapper<B>>(self, mapper: &mut Mapper) -> Self {
        self.map_model(|model| model.map(mapper))
    }

    fn load_record(self, record: Self::Record) -> Self {
        self.map_model(|model| model.load_record(record))
    }

    fn into_record(self) -> Self::Record {
        self.model.into_record()
    }
}

impl<B, M> AutodiffModule<B> for TrainingModel<M, B::InnerBackend>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    type InnerModule = TrainingModel<M::InnerModule, B::InnerBackend>;

    fn valid(&self) -> Self::InnerModule {
        TrainingModel {
            model: self.model.valid(),
            loss: self.loss,
            recorder: Arc::clone(&self.recorder),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<B, M> TrainStep<TabularBatch<B>, RegressionOutput<B>> for TrainingModel<M, B::InnerBackend>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + AppModel<B>,
{
    fn step(&self, batch: TabularBatch<B>) -> TrainOutput<RegressionOutput<B>> {
        let item = self.forward_step(batch);
        let batch_size = item.output.dims()[0];
        let loss = item.loss.clone().into_scalar().elem::<f32>();
        self.recorder().record_train(loss, batch_size);

        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B, M> ValidStep<TabularBatch<B>, RegressionOutput<B>> for TrainingModel<M, B>
where
    B: Backend,
    M: AppModel<B>,
{
    fn step(&self, batch: TabularBatch<B>) -> RegressionOutput<B> {
        let item = self.forward_step(batch);
        let batch_size = item.output.dims()[0];
        let loss = item.loss.clone().into_scalar().elem::<f32>();
        let values: Vec<(String, f32)> = self
            .metrics
            .iter()
            .map(|metric| (metric.name().to_string(), metric.compute(&item.output, &item.targets)))
            .collect();
        self.recorder().record_valid(loss, &values, batch_size);

        item
    }
}
