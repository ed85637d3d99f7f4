//! Integration tests for the training pipeline.
//!
//! These tests verify end-to-end training functionality with synthetic data.

use burn::module::AutodiffModule;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use ndarray::Array2;

use trainapp_core::Seed;
use trainapp_data::{DataLoaders, TabularDataset};
use trainapp_train::{
    load_model, predict, save_bundle, Accuracy, AppModel, ExportMetadata, FitConfig, Learner,
    LearnerConfig, LearnerFactory, ModelExport, TrainError,
};

type TrainBackend = Autodiff<NdArray>;

#[derive(Module, Debug)]
struct LinearModel<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> LinearModel<B> {
    fn new(n_features: usize, n_classes: usize, device: &B::Device) -> Self {
        Self {
            linear: LinearConfig::new(n_features, n_classes).init(device),
        }
    }
}

impl<B: Backend> AppModel<B> for LinearModel<B> {
    fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(x)
    }
}

/// Two well separated clusters per class.
fn create_synthetic_data(n_samples: usize, n_classes: usize) -> TabularDataset {
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut x_data = Vec::with_capacity(n_samples * 2);
    let mut y_data = Vec::with_capacity(n_samples);

    for i in 0..n_samples {
        let class = i % n_classes;
        y_data.push(class as f32);
        x_data.push(class as f32 * 3.0 + rng.gen::<f32>() * 0.1);
        x_data.push(-(class as f32) * 3.0 + rng.gen::<f32>() * 0.1);
    }

    let x = Array2::from_shape_vec((n_samples, 2), x_data).unwrap();
    let y = Array2::from_shape_vec((n_samples, 1), y_data).unwrap();
    TabularDataset::from_arrays(x, Some(y)).unwrap()
}

fn create_dataloaders() -> DataLoaders {
    let train = create_synthetic_data(48, 3);
    let valid = create_synthetic_data(12, 3);
    DataLoaders::builder(train, valid)
        .batch_size(8)
        .seed(Seed::new(42))
        .build()
        .expect("Failed to create dataloaders")
}

#[test]
fn test_training_pipeline_synthetic() {
    let device = Default::default();
    let model = LinearModel::<TrainBackend>::new(2, 3, &device);

    let config = LearnerConfig::default().with_monitor(Some("accuracy".to_string()), None);
    let mut learner = LearnerFactory::<TrainBackend>::new(config, &device)
        .with_metrics(vec![Box::new(Accuracy)])
        .build(model, create_dataloaders());

    let fit = FitConfig {
        epochs: 3,
        lr: 1e-2,
        ..Default::default()
    };
    let state = learner.fit(&fit).expect("Training failed");

    assert_eq!(state.epoch, 3);
    assert_eq!(state.history.train_losses.len(), 3);
    assert_eq!(state.history.valid_losses.len(), 3);
    assert!(state.history.train_losses.iter().all(|l| l.is_finite()));
    assert!(state.best_epoch.is_some());
    assert!(state.history.metrics[0].contains_key("accuracy"));

    let result = learner.validate().expect("Validation failed");
    assert_eq!(result.n_samples, 12);
    let acc = result.get("accuracy").unwrap();
    assert!((0.0..=1.0).contains(&acc));
}

/// A learner whose monitored loss only counts as improved on the first
/// epoch, so every later epoch runs out patience.
fn stalling_learner(device: &<TrainBackend as Backend>::Device) -> Learner<TrainBackend, LinearModel<TrainBackend>> {
    let model = LinearModel::<TrainBackend>::new(2, 3, device);
    let config = LearnerConfig::default()
        .with_monitor(Some("valid_loss".to_string()), None)
        .with_min_delta(1e3);
    LearnerFactory::<TrainBackend>::new(config, device).build(model, create_dataloaders())
}

#[test]
fn test_early_stopping_after_patience() {
    let device = Default::default();
    let mut learner = stalling_learner(&device);

    let fit = FitConfig {
        epochs: 10,
        lr: 1e-1,
        patience: 2,
        ..Default::default()
    };
    let state = learner.fit(&fit).expect("Training failed").clone();

    assert_eq!(state.epoch, 3);
    assert!(state.epoch < fit.epochs);
    assert_eq!(state.history.train_losses.len(), 3);
    assert_eq!(state.history.valid_losses.len(), 3);
    assert_eq!(state.history.lrs.len(), 3);
    assert_eq!(state.best_epoch, Some(0));
    assert_eq!(state.best_value, Some(state.history.valid_losses[0]));
}

#[test]
fn test_best_model_is_returned() {
    let device = Default::default();
    let mut learner = stalling_learner(&device);

    let fit = FitConfig {
        epochs: 3,
        lr: 1e-1,
        ..Default::default()
    };
    let state = learner.fit(&fit).expect("Training failed").clone();
    assert_eq!(state.epoch, 3);
    assert_eq!(state.best_epoch, Some(0));

    let first = state.history.valid_losses[0];
    let last = state.history.valid_losses[2];
    assert!((first - last).abs() > 1e-4, "training did not move the weights");

    let result = learner.validate().expect("Validation failed");
    assert!((result.loss - first).abs() < 1e-4);
}

#[test]
fn test_without_monitor_last_model_is_returned() {
    let device = Default::default();
    let model = LinearModel::<TrainBackend>::new(2, 3, &device);
    let mut learner = LearnerFactory::<TrainBackend>::new(LearnerConfig::default(), &device)
        .build(model, create_dataloaders());

    let fit = FitConfig {
        epochs: 4,
        lr: 1e-1,
        patience: 1,
        ..Default::default()
    };
    let state = learner.fit(&fit).expect("Training failed").clone();

    // Patience without a monitor never stops training.
    assert_eq!(state.epoch, 4);
    assert!(state.best_value.is_none());
    assert!(state.best_epoch.is_none());

    let result = learner.validate().expect("Validation failed");
    assert!((result.loss - state.history.valid_losses[3]).abs() < 1e-4);
}

#[test]
fn test_unknown_monitor_is_rejected() {
    let device = Default::default();
    let model = LinearModel::<TrainBackend>::new(2, 3, &device);

    let config = LearnerConfig::default().with_monitor(Some("f1".to_string()), None);
    let mut learner = LearnerFactory::<TrainBackend>::new(config, &device).build(model, create_dataloaders());

    let result = learner.fit(&FitConfig {
        epochs: 1,
        ..Default::default()
    });
    assert!(matches!(result, Err(TrainError::UnknownMonitor(_))));
}

#[test]
fn test_predict_and_export_round_trip() {
    let device = Default::default();
    let model = LinearModel::<TrainBackend>::new(2, 3, &device);
    let learner = LearnerFactory::<TrainBackend>::new(LearnerConfig::default(), &device)
        .build(model, create_dataloaders());

    let rows = TabularDataset::from_rows(&[vec![0.0, 0.0], vec![6.0, -6.0]]).unwrap();
    let before = predict(&learner.model().valid(), &rows, 8, &device).unwrap();
    assert_eq!(before.len(), 2);
    assert_eq!(before.n_outputs(), 3);

    let dir = tempfile::tempdir().unwrap();
    let metadata = ExportMetadata::new("LinearApp");
    save_bundle::<TrainBackend, _>(learner.model(), dir.path(), Some(learner.state()), &metadata).unwrap();

    let export = ModelExport::load(dir.path()).unwrap();
    assert_eq!(export.metadata.app, "LinearApp");
    assert!(export.model_path().is_file());

    let fresh = LinearModel::<TrainBackend>::new(2, 3, &device);
    let restored = load_model::<TrainBackend, _>(fresh, export.model_path(), &device).unwrap();
    let after = predict(&restored.valid(), &rows, 8, &device).unwrap();

    for (a, b) in before.outputs().iter().zip(after.outputs().iter()) {
        assert!((a - b).abs() < 1e-5);
    }
}
