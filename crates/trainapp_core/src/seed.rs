//! Deterministic random number generation for shuffling and splitting.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A seed for deterministic random number generation.
///
/// The same seed always yields the same shuffles, so a `train` run with
/// `--seed 42` splits and batches its data identically every time.
///
/// ```rust
/// use trainapp_core::Seed;
///
/// let a = Seed::new(42).permutation(10);
/// let b = Seed::new(42).permutation(10);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seed(u64);

impl Seed {
    /// Create a seed with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The underlying seed value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// A ChaCha8 generator seeded from this value.
    #[must_use]
    pub fn to_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.0)
    }

    /// Derive an independent seed for a named random stream.
    #[must_use]
    pub fn derive(&self, key: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.0.hash(&mut hasher);
        key.hash(&mut hasher);
        Self(hasher.finish())
    }

    /// A shuffled permutation of `0..n`.
    #[must_use]
    pub fn permutation(&self, n: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut self.to_rng());
        indices
    }
}

impl Default for Seed {
    fn default() -> Self {
        Self::new(42)
    }
}

impl From<u64> for Seed {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}
