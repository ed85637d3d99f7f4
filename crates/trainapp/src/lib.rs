//! # trainapp
//!
//! Hook-based command-line training applications on top of Burn.
//!
//! An application implements [`App`], overriding the hooks that define its
//! task (data, model, loss, metrics, inference). Each hook declares its
//! parameters; [`App::cli`] turns those declarations into a command line
//! with `train`, `validate`, `predict`, `export`, `pretrained`, `bibtex`
//! and `params` commands.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trainapp::prelude::*;
//!
//! #[derive(Default)]
//! struct MyApp;
//!
//! impl App for MyApp {
//!     type Model<B: AutodiffBackend> = Mlp<B>;
//!
//!     fn data_params(&self) -> Vec<Param> {
//!         vec![Param::path("csv"), Param::int("batch_size").default(32)]
//!     }
//!
//!     fn data(&self, args: &HookArgs) -> Result<DataLoaders> {
//!         let data = read_csv(args.get::<PathBuf>("csv")?, &CsvOptions::with_class_target("label"))?;
//!         let (train, valid) = train_valid_split(&data.dataset, 0.2, Seed::new(42))?;
//!         Ok(DataLoaders::builder(train, valid)
//!             .batch_size(args.get("batch_size")?)
//!             .build()?)
//!     }
//!
//!     fn model<B: AutodiffBackend>(&self, _args: &HookArgs, device: &B::Device) -> Result<Mlp<B>> {
//!         Ok(MlpConfig::new(4, 3).init(device))
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     MyApp.cli()?.run()?;
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod bibtex;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod pretrained;
pub mod testing;

pub use app::{App, BaseApp};
pub use cli::{AppCli, TrainBackend};
pub use error::{AppError, Result};
pub use model::{Activation, Mlp, MlpConfig};

pub use trainapp_core as core;
pub use trainapp_data as data;
pub use trainapp_train as train;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use trainapp::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Activation, App, AppCli, AppError, BaseApp, Mlp, MlpConfig, Result, TrainBackend};

    pub use burn::tensor::backend::{AutodiffBackend, Backend};
    pub use std::path::PathBuf;

    pub use trainapp_core::{Goal, Hook, HookArgs, Param, ParamKind, ParamValue, Seed};
    pub use trainapp_data::{
        read_csv, read_csv_from, train_valid_split, CsvOptions, DataLoaders, TabularDataset, TargetKind,
    };
    pub use trainapp_train::{
        Accuracy, AppModel, LossFunction, Metric, Predictions, MAE, MSE,
    };
}
