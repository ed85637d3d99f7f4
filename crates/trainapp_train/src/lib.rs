//! # trainapp_train
//!
//! Learner, training loop, metrics and model export for trainapp.
//!
//! This crate provides:
//! - [`Learner`] and [`LearnerFactory`] for managing the training process
//! - [`Trainer`], which runs the epoch loop on burn-train's learner
//! - [`AppModel`], the forward contract of trainable models
//! - Loss functions ([`LossFunction`]) and metrics (accuracy, MSE, MAE)
//! - A one-cycle learning rate schedule
//! - Export bundles with weights, metadata and history
//!
//! ## Example
//!
//! ```rust,ignore
//! use trainapp_train::{Accuracy, FitConfig, Learner, LearnerConfig};
//!
//! let mut learner = Learner::new(model, dls, LearnerConfig::default(), &device)
//!     .with_metrics(vec![Box::new(Accuracy)]);
//! learner.fit(&FitConfig { epochs: 10, ..Default::default() })?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod export;
pub mod learner;
pub mod losses;
pub mod metrics;
pub mod model;
pub mod renderer;
pub mod scheduler;
pub mod step;
pub mod strategy;
pub mod training;

pub use error::{Result, TrainError};
pub use export::{load_model, save_bundle, save_model, ExportMetadata, ModelExport};
pub use learner::{
    FitConfig, Learner, LearnerConfig, LearnerFactory, Predictions, TrainingHistory, TrainingState,
};
pub use losses::LossFunction;
pub use metrics::{monitor_goal, Accuracy, Metric, MAE, MSE};
pub use model::AppModel;
pub use renderer::TracingRenderer;
pub use scheduler::{OneCycleLR, OneCycleLRConfig};
pub use step::{TabularBatch, TabularBatcher, TabularItem, TrainingModel};
pub use strategy::{BestEpochCheckpointing, EpochRecorder, PatienceStopping};
pub use training::{evaluate, predict, Trainer, TrainerConfig, TrainingOutput, ValidationResult};
