//! Sparse weight vectors.

use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::data::{Example, ExampleView};

/// Dense-by-key storage of weights for a sparse model.
///
/// Keys at or beyond `len()` have never been written and read as the
/// caller-supplied default. Growth fills the gap with that default, so a
/// vector must always be used with one default value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseWeightVector {
    weights: Vec<f64>,
}

impl SparseWeightVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_weights(weights: Vec<f64>) -> Self {
        Self { weights }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn get(&self, key: usize, default: f64) -> f64 {
        self.weights.get(key).copied().unwrap_or(default)
    }

    /// Set a weight, growing the vector with `default` if needed.
    pub fn set(&mut self, key: usize, value: f64, default: f64) {
        if key >= self.weights.len() {
            self.weights.resize(key + 1, default);
        }
        self.weights[key] = value;
    }

    /// Like [`get`](Self::get) but with a per-key default.
    #[inline]
    pub fn get_or_else(&self, key: usize, default: impl Fn(usize) -> f64) -> f64 {
        match self.weights.get(key) {
            Some(&w) => w,
            None => default(key),
        }
    }

    /// Like [`set`](Self::set) but filling the gap with a per-key default.
    pub fn set_or_else(&mut self, key: usize, value: f64, default: impl Fn(usize) -> f64) {
        while self.weights.len() <= key {
            let k = self.weights.len();
            self.weights.push(default(k));
        }
        self.weights[key] = value;
    }

    pub fn dot(&self, example: ExampleView<'_>, default: f64) -> f64 {
        example.iter().map(|(k, v)| self.get(k, default) * v).sum()
    }

    /// `w[k] = get(k, default) + factor * value` for every example entry.
    pub fn scaled_add(&mut self, example: ExampleView<'_>, factor: f64, default: f64) {
        for (k, v) in example.iter() {
            let w = self.get(k, default) + factor * v;
            self.set(k, w, default);
        }
    }

    /// `w[k] = get(k, default) * factor^value` for every example entry.
    ///
    /// Binary values are special-cased so the common path avoids `powf`.
    pub fn scaled_multiply(&mut self, example: ExampleView<'_>, factor: f64, default: f64) {
        for (k, v) in example.iter() {
            let multiplier = if v == 0.0 {
                1.0
            } else if v == 1.0 {
                factor
            } else {
                factor.powf(v)
            };
            let w = self.get(k, default) * multiplier;
            self.set(k, w, default);
        }
    }

    /// Project an example through this vector used as a diagonal matrix.
    ///
    /// Each value is multiplied by the weight at its key, or divided by it
    /// when `inverse` is set.
    pub fn pairwise_multiply(&self, example: ExampleView<'_>, default: f64, inverse: bool) -> Example {
        let mut out = Example::with_capacity(example.len());
        for (k, v) in example.iter() {
            let w = self.get(k, default);
            out.push(k, if inverse { v / w } else { v * w });
        }
        out
    }

    /// Move `w[old]` to `w[permutation[old]]`. Slots with no source get `default`.
    pub fn remap(&mut self, permutation: &[usize], default: f64) {
        let target_len = self
            .weights
            .iter()
            .enumerate()
            .filter_map(|(old, _)| permutation.get(old).map(|&new| new + 1))
            .max()
            .unwrap_or(0);
        let mut remapped = vec![default; target_len];
        for (old, &w) in self.weights.iter().enumerate() {
            if let Some(&new) = permutation.get(old) {
                remapped[new] = w;
            }
        }
        self.weights = remapped;
    }

    pub fn truncate(&mut self, len: usize) {
        self.weights.truncate(len);
    }

    pub fn clear(&mut self) {
        self.weights.clear();
    }
}

// ============================================================================
// BiasedWeightVector
// ============================================================================

/// How unseen weights of a [`BiasedWeightVector`] are initialized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeightInit {
    /// Every unseen weight starts at the given constant.
    Constant(f64),
    /// Unseen weights are drawn from `N(0, stddev²)`, seeded per key.
    Gaussian { stddev: f64, seed: u64 },
}

impl Default for WeightInit {
    fn default() -> Self {
        Self::Constant(0.0)
    }
}

impl WeightInit {
    /// Same distribution with the seed offset by `stream`, for independent vectors.
    pub fn reseeded(self, stream: u64) -> Self {
        match self {
            Self::Constant(c) => Self::Constant(c),
            Self::Gaussian { stddev, seed } => Self::Gaussian {
                stddev,
                seed: seed.wrapping_add(stream.wrapping_mul(0xD1B5_4A32_D192_ED03)),
            },
        }
    }

    /// Initial value for `key`. The bias uses `usize::MAX`.
    ///
    /// Random draws are a pure function of `(seed, key)`, so a vector can be
    /// serialized without generator state and still agree with itself.
    pub fn value(&self, key: usize) -> f64 {
        match *self {
            Self::Constant(c) => c,
            Self::Gaussian { stddev, seed } => {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(
                    seed ^ (key as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
                );
                let z: f64 = StandardNormal.sample(&mut rng);
                z * stddev
            }
        }
    }
}

/// A weight vector with a bias term that acts as a hallucinated feature of value 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasedWeightVector {
    weights: SparseWeightVector,
    bias: f64,
    init: WeightInit,
}

impl Default for BiasedWeightVector {
    fn default() -> Self {
        Self::new(WeightInit::default())
    }
}

impl BiasedWeightVector {
    pub fn new(init: WeightInit) -> Self {
        Self {
            weights: SparseWeightVector::new(),
            bias: init.value(usize::MAX),
            init,
        }
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn weights(&self) -> &SparseWeightVector {
        &self.weights
    }

    pub fn get(&self, key: usize) -> f64 {
        self.weights.get_or_else(key, |k| self.init.value(k))
    }

    /// `w·x + bias`.
    pub fn dot(&self, example: ExampleView<'_>) -> f64 {
        example.iter().map(|(k, v)| self.get(k) * v).sum::<f64>() + self.bias
    }

    /// Additive update; the bias moves by `factor`.
    pub fn scaled_add(&mut self, example: ExampleView<'_>, factor: f64) {
        let init = self.init;
        for (k, v) in example.iter() {
            let w = self.get(k) + factor * v;
            self.weights.set_or_else(k, w, |i| init.value(i));
        }
        self.bias += factor;
    }

    pub fn remap(&mut self, permutation: &[usize]) {
        let init = self.init;
        let mut remapped = SparseWeightVector::new();
        for (old, &w) in self.weights.as_slice().iter().enumerate() {
            if let Some(&new) = permutation.get(old) {
                remapped.set_or_else(new, w, |i| init.value(i));
            }
        }
        self.weights = remapped;
    }

    pub fn truncate(&mut self, len: usize) {
        self.weights.truncate(len);
    }

    pub fn clear(&mut self) {
        self.weights.clear();
        self.bias = self.init.value(usize::MAX);
    }
}

// ============================================================================
// Tests
// ============================================================================
