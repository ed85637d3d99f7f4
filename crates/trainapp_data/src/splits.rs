//! Dataset splitting utilities.

use crate::dataset::TabularDataset;
use crate::error::{DataError, Result};
use trainapp_core::Seed;

/// Split a dataset into train and validation sets.
///
/// `valid_fraction` of the rows (rounded, at least one and leaving at least
/// one for training) go to the validation set. The shuffle is determined by
/// `seed`.
///
/// # Returns
///
/// A tuple of (train_dataset, valid_dataset).
pub fn train_valid_split(
    dataset: &TabularDataset,
    valid_fraction: f64,
    seed: Seed,
) -> Result<(TabularDataset, TabularDataset)> {
    if !(valid_fraction > 0.0 && valid_fraction < 1.0) {
        return Err(DataError::SplitError(format!(
            "valid_fraction must be between 0 and 1, got {valid_fraction}"
        )));
    }

    let n = dataset.len();
    if n < 2 {
        return Err(DataError::SplitError(format!(
            "need at least 2 samples to split, got {n}"
        )));
    }

    let n_valid = ((n as f64 * valid_fraction).round() as usize).clamp(1, n - 1);
    let indices = seed.permutation(n);

    let valid = dataset.subset(&indices[..n_valid])?;
    let train = dataset.subset(&indices[n_valid..])?;

    Ok((train, valid))
}
