//! Sparse example encodings.
//!
//! An [`Example`] is the key/value form of one instance after its features
//! have been mapped through a [`Lexicon`](crate::lexicon::Lexicon). Learners
//! only ever see [`ExampleView`]s.

use serde::{Deserialize, Serialize};

/// Owned sparse example: parallel `keys` and `values` arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub keys: Vec<usize>,
    pub values: Vec<f64>,
}

impl Example {
    pub fn new(keys: Vec<usize>, values: Vec<f64>) -> Self {
        debug_assert_eq!(keys.len(), values.len());
        Self { keys, values }
    }

    /// Example where every listed key has value 1.
    pub fn binary(keys: Vec<usize>) -> Self {
        let values = vec![1.0; keys.len()];
        Self { keys, values }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            keys: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, key: usize, value: f64) {
        self.keys.push(key);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn view(&self) -> ExampleView<'_> {
        ExampleView {
            keys: &self.keys,
            values: &self.values,
        }
    }

    /// Remap keys through a prune permutation and drop keys at or beyond `cutoff`.
    ///
    /// Keys outside the permutation (the unknown-feature sentinel) are dropped too.
    pub fn apply_permutation(&mut self, permutation: &[usize], cutoff: usize) {
        let mut write = 0;
        for read in 0..self.keys.len() {
            let Some(&new_key) = permutation.get(self.keys[read]) else {
                continue;
            };
            if new_key >= cutoff {
                continue;
            }
            self.keys[write] = new_key;
            self.values[write] = self.values[read];
            write += 1;
        }
        self.keys.truncate(write);
        self.values.truncate(write);
    }

    /// Drop keys at or beyond `cutoff`, keeping the order of the rest.
    pub fn drop_pruned(&mut self, cutoff: usize) {
        let mut write = 0;
        for read in 0..self.keys.len() {
            if self.keys[read] < cutoff {
                self.keys[write] = self.keys[read];
                self.values[write] = self.values[read];
                write += 1;
            }
        }
        self.keys.truncate(write);
        self.values.truncate(write);
    }
}

/// Borrowed sparse example.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExampleView<'a> {
    pub keys: &'a [usize],
    pub values: &'a [f64],
}

impl<'a> ExampleView<'a> {
    pub fn new(keys: &'a [usize], values: &'a [f64]) -> Self {
        debug_assert_eq!(keys.len(), values.len());
        Self { keys, values }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + 'a {
        self.keys.iter().copied().zip(self.values.iter().copied())
    }

    /// Sum of squared values.
    pub fn squared_norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_permutation_remaps_and_drops_pruned() {
        let mut ex = Example::new(vec![0, 1, 2, 7], vec![1.0, 2.0, 3.0, 4.0]);
        // 0 -> 2 (pruned), 1 -> 0, 2 -> 1, key 7 is the unknown sentinel.
        ex.apply_permutation(&[2, 0, 1], 2);
        assert_eq!(ex.keys, vec![0, 1]);
        assert_eq!(ex.values, vec![2.0, 3.0]);
    }

    #[test]
    fn squared_norm() {
        let a = Example::new(vec![0, 3], vec![2.0, -1.0]);
        assert_eq!(a.view().squared_norm(), 5.0);
    }
}
