//! Bidirectional feature ↔ key table backing a lexicon.

use std::collections::HashMap;

use crate::feature::Feature;

/// Dense map from features to insertion-order keys and back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    index: HashMap<Feature, usize>,
    features: Vec<Feature>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, feature: &Feature) -> Option<usize> {
        self.index.get(feature).copied()
    }

    pub fn contains(&self, feature: &Feature) -> bool {
        self.index.contains_key(feature)
    }

    pub fn feature(&self, key: usize) -> Option<&Feature> {
        self.features.get(key)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Append a feature that is not yet present and return its key.
    pub(crate) fn push(&mut self, feature: Feature) -> usize {
        let key = self.features.len();
        self.index.insert(feature.clone(), key);
        self.features.push(feature);
        key
    }

    /// Exchange the features at two keys.
    pub(crate) fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.features.swap(a, b);
        if let Some(k) = self.index.get_mut(&self.features[a]) {
            *k = a;
        }
        if let Some(k) = self.index.get_mut(&self.features[b]) {
            *k = b;
        }
    }

    /// Drop every key at or beyond `len`, returning the removed features.
    pub(crate) fn truncate(&mut self, len: usize) -> Vec<Feature> {
        if len >= self.features.len() {
            return Vec::new();
        }
        let removed: Vec<Feature> = self.features.drain(len..).collect();
        for f in &removed {
            self.index.remove(f);
        }
        removed
    }

    /// Build a table from features already ordered by key.
    pub(crate) fn from_features(features: Vec<Feature>) -> Self {
        let index = features
            .iter()
            .enumerate()
            .map(|(k, f)| (f.clone(), k))
            .collect();
        Self { index, features }
    }
}
