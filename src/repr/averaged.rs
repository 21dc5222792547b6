//! Lazily averaged weight vector.
//!
//! Keeps the current weights plus an accumulator so that the average of every
//! weight vector that existed during training can be read back without
//! storing snapshots. For an update of `Δ` made while `e` examples had been
//! seen, the accumulator grows by `e·Δ`; after `E` examples the average at a
//! key is `(E·w − acc) / E`.

use serde::{Deserialize, Serialize};

use super::SparseWeightVector;
use crate::data::ExampleView;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AveragedWeightVector {
    weights: SparseWeightVector,
    accumulator: SparseWeightVector,
    examples: u64,
}

impl AveragedWeightVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of examples seen, with or without an update.
    pub fn examples(&self) -> u64 {
        self.examples
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Current (non-averaged) weight.
    pub fn get(&self, key: usize, default: f64) -> f64 {
        self.weights.get(key, default)
    }

    /// Averaged weight; 0 before any example has been seen.
    pub fn averaged_weight(&self, key: usize, default: f64) -> f64 {
        if self.examples == 0 {
            return 0.0;
        }
        let e = self.examples as f64;
        (e * self.weights.get(key, default) - self.accumulator.get(key, 0.0)) / e
    }

    /// Dot product with the averaged weights.
    pub fn dot(&self, example: ExampleView<'_>, default: f64) -> f64 {
        example
            .iter()
            .map(|(k, v)| self.averaged_weight(k, default) * v)
            .sum()
    }

    /// Dot product with the current weights.
    pub fn simple_dot(&self, example: ExampleView<'_>, default: f64) -> f64 {
        self.weights.dot(example, default)
    }

    /// Additive update for one example. Counts the example as seen.
    pub fn scaled_add(&mut self, example: ExampleView<'_>, factor: f64, default: f64) {
        let e = self.examples as f64;
        for (k, v) in example.iter() {
            let delta = factor * v;
            let w = self.weights.get(k, default) + delta;
            self.weights.set(k, w, default);
            let acc = self.accumulator.get(k, 0.0) + e * delta;
            self.accumulator.set(k, acc, 0.0);
        }
        self.examples += 1;
    }

    /// Record an example on which no update was made.
    pub fn correct_example(&mut self) {
        self.examples += 1;
    }

    pub fn remap(&mut self, permutation: &[usize], default: f64) {
        self.weights.remap(permutation, default);
        self.accumulator.remap(permutation, 0.0);
    }

    pub fn truncate(&mut self, len: usize) {
        self.weights.truncate(len);
        self.accumulator.truncate(len);
    }

    pub fn clear(&mut self) {
        self.weights.clear();
        self.accumulator.clear();
        self.examples = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Example;

    #[test]
    fn average_matches_snapshots() {
        let x = Example::new(vec![0], vec![1.0]);
        let mut w = AveragedWeightVector::new();

        // Snapshots after each example: 1, 1, 3 -> mean 5/3
        w.scaled_add(x.view(), 1.0, 0.0);
        w.correct_example();
        w.scaled_add(x.view(), 2.0, 0.0);

        assert_eq!(w.examples(), 3);
        assert_eq!(w.get(0, 0.0), 3.0);
        assert!((w.averaged_weight(0, 0.0) - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn average_is_zero_before_any_example() {
        let w = AveragedWeightVector::new();
        assert_eq!(w.averaged_weight(4, 1.0), 0.0);
    }

    #[test]
    fn default_weight_enters_average() {
        let x = Example::new(vec![2], vec![1.0]);
        let mut w = AveragedWeightVector::new();
        w.correct_example();
        w.scaled_add(x.view(), 1.0, 1.0);
        // Snapshots of key 2: 1 (default), 2 -> mean 1.5
        assert!((w.averaged_weight(2, 1.0) - 1.5).abs() < 1e-12);
    }
}
