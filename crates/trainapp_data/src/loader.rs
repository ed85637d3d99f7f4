//! Dataloaders producing Burn tensor batches.

use burn::prelude::*;

use crate::dataset::TabularDataset;
use crate::error::{DataError, Result};
use trainapp_core::Seed;

/// A batch of samples on a device.
#[derive(Debug, Clone)]
pub struct Batch<B: Backend> {
    /// Features, shape `(batch, features)`.
    pub x: Tensor<B, 2>,
    /// Targets, shape `(batch, targets)`, when the dataset has them.
    pub y: Option<Tensor<B, 2>>,
}

impl<B: Backend> Batch<B> {
    /// Number of samples in the batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.x.dims()[0]
    }
}

/// A dataloader that produces batches from a dataset.
///
/// # Example
///
/// ```rust,ignore
/// let loader = DataLoader::builder(dataset)
///     .batch_size(32)
///     .shuffle(true)
///     .seed(Seed::new(42))
///     .build()?;
///
/// for batch in loader.iter::<NdArray>(&device) {
///     let batch = batch?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: TabularDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Option<Seed>,
}

impl DataLoader {
    /// Create a new dataloader builder.
    #[must_use]
    pub fn builder(dataset: TabularDataset) -> DataLoaderBuilder {
        DataLoaderBuilder::new(dataset)
    }

    /// The underlying dataset.
    #[must_use]
    pub fn dataset(&self) -> &TabularDataset {
        &self.dataset
    }

    /// Batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches per pass.
    #[must_use]
    pub fn n_batches(&self) -> usize {
        let n = self.dataset.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    /// Total number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Whether the loader has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Seed of the shuffle order, or `None` when rows keep their order.
    ///
    /// An unseeded shuffling loader draws a fresh seed on every call.
    #[must_use]
    pub fn shuffle_seed(&self) -> Option<u64> {
        self.shuffle
            .then(|| self.seed.map_or_else(rand::random, |seed| seed.value()))
    }

    /// Iterate over batches on `device`.
    ///
    /// Shuffled loaders reshuffle on each call; with a seed the order of
    /// the `n`-th call is reproducible across runs.
    #[must_use]
    pub fn iter<B: Backend>(&self, device: &B::Device) -> DataLoaderIter<'_, B> {
        DataLoaderIter::new(self, device.clone(), 0)
    }

    /// Iterate over the batches of a given epoch.
    ///
    /// With a seed, each epoch gets its own reproducible shuffle.
    #[must_use]
    pub fn iter_epoch<B: Backend>(&self, device: &B::Device, epoch: usize) -> DataLoaderIter<'_, B> {
        DataLoaderIter::new(self, device.clone(), epoch)
    }
}

/// Builder for [`DataLoader`].
pub struct DataLoaderBuilder {
    dataset: TabularDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Option<Seed>,
}

impl DataLoaderBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(dataset: TabularDataset) -> Self {
        Self {
            dataset,
            batch_size: 32,
            shuffle: false,
            drop_last: false,
            seed: None,
        }
    }

    /// Set the batch size.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable shuffling.
    #[must_use]
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Drop the last incomplete batch.
    #[must_use]
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Set the shuffle seed.
    #[must_use]
    pub fn seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the dataloader.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero batch size or an empty dataset.
    pub fn build(self) -> Result<DataLoader> {
        if self.batch_size == 0 {
            return Err(DataError::InvalidBatchSize(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.dataset.is_empty() {
            return Err(DataError::EmptyDataset);
        }

        Ok(DataLoader {
            dataset: self.dataset,
            batch_size: self.batch_size,
            shuffle: self.shuffle,
            drop_last: self.drop_last,
            seed: self.seed,
        })
    }
}

/// Iterator over batches from a [`DataLoader`].
pub struct DataLoaderIter<'a, B: Backend> {
    loader: &'a DataLoader,
    device: B::Device,
    indices: Vec<usize>,
    current_batch: usize,
    n_batches: usize,
}

impl<'a, B: Backend> DataLoaderIter<'a, B> {
    fn new(loader: &'a DataLoader, device: B::Device, epoch: usize) -> Self {
        let n = loader.dataset.len();
        let indices = if loader.shuffle {
            let seed = loader
                .seed
                .map(|s| s.derive(&format!("epoch-{epoch}")))
                .unwrap_or_else(|| Seed::new(rand::random()));
            seed.permutation(n)
        } else {
            (0..n).collect()
        };

        Self {
            loader,
            device,
            indices,
            current_batch: 0,
            n_batches: loader.n_batches(),
        }
    }

    fn create_batch(&self, indices: &[usize]) -> Result<Batch<B>> {
        let subset = self.loader.dataset.subset(indices)?;
        let batch_size = subset.len();

        let x_flat: Vec<f32> = subset.x().iter().copied().collect();
        let x = Tensor::<B, 1>::from_floats(x_flat.as_slice(), &self.device)
            .reshape([batch_size, subset.n_features()]);

        let y = subset.y().map(|y| {
            let y_flat: Vec<f32> = y.iter().copied().collect();
            Tensor::<B, 1>::from_floats(y_flat.as_slice(), &self.device)
                .reshape([batch_size, y.ncols()])
        });

        Ok(Batch { x, y })
    }
}

impl<B: Backend> Iterator for DataLoaderIter<'_, B> {
    type Item = Result<Batch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_batch >= self.n_batches {
            return None;
        }

        let start = self.current_batch * self.loader.batch_size;
        let end = (start + self.loader.batch_size).min(self.indices.len());
        self.current_batch += 1;

        Some(self.create_batch(&self.indices[start..end]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.n_batches - self.current_batch;
        (remaining, Some(remaining))
    }
}

impl<B: Backend> ExactSizeIterator for DataLoaderIter<'_, B> {}

/// Paired dataloaders for training and validation.
///
/// # Example
///
/// ```rust,ignore
/// let dls = DataLoaders::builder(train_ds, valid_ds)
///     .batch_size(32)
///     .seed(Seed::new(42))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct DataLoaders {
    train: DataLoader,
    valid: DataLoader,
}

impl DataLoaders {
    /// Create a new builder.
    #[must_use]
    pub fn builder(train: TabularDataset, valid: TabularDataset) -> DataLoadersBuilder {
        DataLoadersBuilder::new(train, valid)
    }

    /// Training dataloader.
    #[must_use]
    pub fn train(&self) -> &DataLoader {
        &self.train
    }

    /// Validation dataloader.
    #[must_use]
    pub fn valid(&self) -> &DataLoader {
        &self.valid
    }

    /// Batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.train.batch_size()
    }

    /// Number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.train.dataset().n_features()
    }
}

/// Builder for [`DataLoaders`].
pub struct DataLoadersBuilder {
    train: TabularDataset,
    valid: TabularDataset,
    batch_size: usize,
    shuffle_train: bool,
    seed: Option<Seed>,
}

impl DataLoadersBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(train: TabularDataset, valid: TabularDataset) -> Self {
        Self {
            train,
            valid,
            batch_size: 32,
            shuffle_train: true,
            seed: None,
        }
    }

    /// Set the batch size for both loaders.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable shuffling for the training loader.
    #[must_use]
    pub fn shuffle_train(mut self, shuffle: bool) -> Self {
        self.shuffle_train = shuffle;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the dataloaders.
    pub fn build(self) -> Result<DataLoaders> {
        if self.train.n_features() != self.valid.n_features() {
            return Err(DataError::InvalidShape(format!(
                "train has {} features but valid has {}",
                self.train.n_features(),
                self.valid.n_features()
            )));
        }

        let mut train_builder = DataLoader::builder(self.train)
            .batch_size(self.batch_size)
            .shuffle(self.shuffle_train);

        if let Some(seed) = self.seed {
            train_builder = train_builder.seed(seed.derive("train"));
        }

        let valid_builder = DataLoader::builder(self.valid)
            .batch_size(self.batch_size)
            .shuffle(false);

        Ok(DataLoaders {
            train: train_builder.build()?,
            valid: valid_builder.build()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use ndarray::Array2;

    type TestBackend = NdArray;

    fn create_test_dataset(n: usize) -> TabularDataset {
        let x = Array2::from_shape_fn((n, 4), |(i, j)| (i * 4 + j) as f32);
        let y = Array2::from_shape_fn((n, 1), |(i, _)| (i % 3) as f32);
        TabularDataset::from_arrays(x, Some(y)).unwrap()
    }

    #[test]
    fn test_loader_n_batches() {
        let ds = create_test_dataset(100);

        let loader = DataLoader::builder(ds.clone()).batch_size(32).build().unwrap();
        assert_eq!(loader.n_batches(), 4);

        let loader = DataLoader::builder(ds)
            .batch_size(32)
            .drop_last(true)
            .build()
            .unwrap();
        assert_eq!(loader.n_batches(), 3);
    }

    #[test]
    fn test_loader_rejects_zero_batch_size() {
        let result = DataLoader::builder(create_test_dataset(4)).batch_size(0).build();
        assert!(matches!(result, Err(DataError::InvalidBatchSize(_))));
    }

    #[test]
    fn test_loader_batches_shapes() {
        let device = Default::default();
        let loader = DataLoader::builder(create_test_dataset(10))
            .batch_size(4)
            .build()
            .unwrap();

        let batches: Vec<Batch<TestBackend>> = loader
            .iter::<TestBackend>(&device)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].x.dims(), [4, 4]);
        assert_eq!(batches[2].batch_size(), 2);
        assert_eq!(batches[2].y.as_ref().unwrap().dims(), [2, 1]);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let device = Default::default();
        let build = || {
            DataLoader::builder(create_test_dataset(20))
                .batch_size(20)
                .shuffle(true)
                .seed(Seed::new(5))
                .build()
                .unwrap()
        };

        let first = |loader: &DataLoader| -> Vec<f32> {
            let batch = loader.iter_epoch::<TestBackend>(&device, 3).next().unwrap().unwrap();
            batch.x.into_data().to_vec::<f32>().unwrap()
        };

        assert_eq!(first(&build()), first(&build()));
    }

    #[test]
    fn test_shuffle_seed() {
        let ordered = DataLoader::builder(create_test_dataset(4)).build().unwrap();
        assert_eq!(ordered.shuffle_seed(), None);

        let seeded = DataLoader::builder(create_test_dataset(4))
            .shuffle(true)
            .seed(Seed::new(9))
            .build()
            .unwrap();
        assert_eq!(seeded.shuffle_seed(), Some(9));

        let unseeded = DataLoader::builder(create_test_dataset(4))
            .shuffle(true)
            .build()
            .unwrap();
        assert!(unseeded.shuffle_seed().is_some());
    }

    #[test]
    fn test_loaders_builder() {
        let dls = DataLoaders::builder(create_test_dataset(100), create_test_dataset(20))
            .batch_size(16)
            .seed(Seed::new(42))
            .build()
            .unwrap();

        assert_eq!(dls.batch_size(), 16);
        assert_eq!(dls.n_features(), 4);
        assert_eq!(dls.train().len(), 100);
        assert_eq!(dls.valid().len(), 20);
    }
}
