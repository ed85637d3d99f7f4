//! # trainapp_data
//!
//! Tabular datasets and dataloaders for trainapp applications.
//!
//! This crate provides:
//! - [`TabularDataset`] for feature rows with optional targets
//! - [`read_csv`] for loading CSV files with a header row
//! - [`train_valid_split`] for seeded train/validation splits
//! - [`DataLoader`] for batched iteration with shuffling
//! - [`DataLoaders`] for paired train/valid dataloaders
//!
//! ## Example
//!
//! ```rust,ignore
//! use trainapp_core::Seed;
//! use trainapp_data::{read_csv, train_valid_split, CsvOptions, DataLoaders};
//!
//! let data = read_csv("iris.csv", &CsvOptions::with_class_target("species"))?;
//! let (train, valid) = train_valid_split(&data.dataset, 0.2, Seed::new(42))?;
//!
//! let dls = DataLoaders::builder(train, valid)
//!     .batch_size(32)
//!     .seed(Seed::new(42))
//!     .build()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod dataset;
mod error;
mod io;
mod loader;
mod splits;

pub use dataset::TabularDataset;
pub use error::{DataError, Result};
pub use io::{read_csv, read_csv_from, CsvData, CsvOptions, TargetKind};
pub use loader::{Batch, DataLoader, DataLoaderBuilder, DataLoaderIter, DataLoaders, DataLoadersBuilder};
pub use splits::train_valid_split;
