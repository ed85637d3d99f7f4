//! Tabular dataset type.

use ndarray::{Array2, ArrayView1, Axis};

use crate::error::{DataError, Result};

/// A dataset of feature rows with optional targets.
///
/// Features are stored as `(N, F)`, targets as `(N, T)`. Classification
/// targets are class indices in a single column.
///
/// # Example
///
/// ```rust
/// use ndarray::Array2;
/// use trainapp_data::TabularDataset;
///
/// let x = Array2::<f32>::zeros((10, 4));
/// let y = Array2::<f32>::zeros((10, 1));
/// let ds = TabularDataset::from_arrays(x, Some(y)).unwrap();
/// assert_eq!(ds.n_features(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct TabularDataset {
    x: Array2<f32>,
    y: Option<Array2<f32>>,
}

impl TabularDataset {
    /// Create a dataset from feature and optional target arrays.
    ///
    /// # Errors
    ///
    /// Returns an error if the row counts differ.
    pub fn from_arrays(x: Array2<f32>, y: Option<Array2<f32>>) -> Result<Self> {
        let n_samples = x.nrows();

        if let Some(ref targets) = y {
            if targets.nrows() != n_samples {
                return Err(DataError::InvalidShape(format!(
                    "x has {} samples but y has {} samples",
                    n_samples,
                    targets.nrows()
                )));
            }
        }

        Ok(Self { x, y })
    }

    /// Create a dataset from feature rows only (for inference).
    ///
    /// # Errors
    ///
    /// Returns an error if the rows have different lengths.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let n_features = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != n_features) {
            return Err(DataError::InvalidShape(format!(
                "expected {} features per row, found a row with {}",
                n_features,
                bad.len()
            )));
        }
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        let x = Array2::from_shape_vec((rows.len(), n_features), flat)
            .map_err(|e| DataError::InvalidShape(e.to_string()))?;
        Ok(Self { x, y: None })
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    /// Whether the dataset has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    /// Number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Number of target columns (0 without targets).
    #[must_use]
    pub fn n_targets(&self) -> usize {
        self.y.as_ref().map_or(0, Array2::ncols)
    }

    /// Feature array.
    #[must_use]
    pub fn x(&self) -> &Array2<f32> {
        &self.x
    }

    /// Target array, if any.
    #[must_use]
    pub fn y(&self) -> Option<&Array2<f32>> {
        self.y.as_ref()
    }

    /// Whether the dataset has targets.
    #[must_use]
    pub fn has_targets(&self) -> bool {
        self.y.is_some()
    }

    /// Get a sample by index.
    pub fn get(&self, index: usize) -> Result<(ArrayView1<'_, f32>, Option<ArrayView1<'_, f32>>)> {
        if index >= self.len() {
            return Err(DataError::IndexOutOfBounds {
                index,
                length: self.len(),
            });
        }

        let x = self.x.index_axis(Axis(0), index);
        let y = self.y.as_ref().map(|y| y.index_axis(Axis(0), index));

        Ok((x, y))
    }

    /// A new dataset holding the rows at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&index) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(DataError::IndexOutOfBounds {
                index,
                length: self.len(),
            });
        }

        let x = self.x.select(Axis(0), indices);
        let y = self.y.as_ref().map(|y| y.select(Axis(0), indices));

        Ok(Self { x, y })
    }

    /// Number of distinct classes in a single-column class-index target.
    #[must_use]
    pub fn n_classes(&self) -> Option<usize> {
        let y = self.y.as_ref()?;
        if y.ncols() != 1 {
            return None;
        }
        let max = y
            .iter()
            .copied()
            .fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |m| m.max(v))))?;
        Some(max as usize + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_dataset(n: usize, f: usize) -> TabularDataset {
        let x = Array2::from_shape_fn((n, f), |(i, j)| (i * f + j) as f32);
        let y = Array2::from_shape_fn((n, 1), |(i, _)| (i % 3) as f32);
        TabularDataset::from_arrays(x, Some(y)).unwrap()
    }

    #[test]
    fn test_dataset_creation() {
        let ds = create_test_dataset(30, 4);
        assert_eq!(ds.len(), 30);
        assert_eq!(ds.n_features(), 4);
        assert_eq!(ds.n_targets(), 1);
        assert_eq!(ds.n_classes(), Some(3));
    }

    #[test]
    fn test_dataset_shape_mismatch() {
        let x = Array2::<f32>::zeros((5, 2));
        let y = Array2::<f32>::zeros((4, 1));
        assert!(TabularDataset::from_arrays(x, Some(y)).is_err());
    }

    #[test]
    fn test_dataset_subset_keeps_order() {
        let ds = create_test_dataset(10, 2);
        let subset = ds.subset(&[7, 2]).unwrap();
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.x()[[0, 0]], 14.0);
        assert_eq!(subset.x()[[1, 1]], 5.0);
        assert!(ds.subset(&[10]).is_err());
    }

    #[test]
    fn test_from_rows() {
        let ds = TabularDataset::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(ds.len(), 2);
        assert!(!ds.has_targets());
        assert!(TabularDataset::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }
}
