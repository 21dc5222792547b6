//! Store for constituents of compound features.
//!
//! Constituents never receive a weight of their own, so they are kept out of
//! the main lexicon. Each entry carries a signed parent count: the magnitude
//! is the number of live compound entries in this store that contain it, and
//! a negative sign marks an entry that also lives in the main lexicon and is
//! to be deleted here once its last parent goes away.

use std::collections::HashMap;

use tracing::debug;

use super::table::FeatureTable;
use super::LexiconError;
use crate::feature::Feature;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildLexicon {
    index: HashMap<Feature, usize>,
    features: Vec<Option<Feature>>,
    parents: Vec<i32>,
}

impl ChildLexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots, including deleted ones.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of live entries.
    pub fn live_len(&self) -> usize {
        self.index.len()
    }

    pub fn get(&self, feature: &Feature) -> Option<usize> {
        self.index.get(feature).copied()
    }

    pub fn contains(&self, feature: &Feature) -> bool {
        self.index.contains_key(feature)
    }

    pub fn feature(&self, key: usize) -> Option<&Feature> {
        self.features.get(key).and_then(Option::as_ref)
    }

    pub fn parent_count(&self, key: usize) -> Option<i32> {
        self.feature(key).map(|_| self.parents[key])
    }

    /// Live entries as `(key, feature, parent count)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Feature, i32)> + '_ {
        self.features
            .iter()
            .enumerate()
            .filter_map(|(k, f)| f.as_ref().map(|f| (k, f, self.parents[k])))
    }

    /// Intern `feature`, registering parent counts for its constituents when new.
    ///
    /// `outer` is the owning lexicon's table; a constituent that already lives
    /// there starts out marked.
    pub fn register(&mut self, feature: &Feature, outer: &FeatureTable) -> usize {
        if let Some(key) = self.get(feature) {
            return key;
        }
        let key = self.features.len();
        self.features.push(Some(feature.clone()));
        self.parents.push(0);
        self.index.insert(feature.clone(), key);
        for child in feature.constituents() {
            self.increment_parent_counts(child, outer);
        }
        key
    }

    fn increment_parent_counts(&mut self, feature: &Feature, outer: &FeatureTable) {
        let key = self.register(feature, outer);
        let count = self.parents[key];
        self.parents[key] = match count {
            0 if outer.contains(feature) => -1,
            0 => 1,
            n if n > 0 => n + 1,
            n => n - 1,
        };
    }

    /// Called when `feature` enters the main lexicon.
    ///
    /// An entry without parents is deleted, cascading to its constituents;
    /// one with parents is marked. Returns whether the feature was present.
    pub fn remove(&mut self, feature: &Feature) -> Result<bool, LexiconError> {
        let Some(key) = self.get(feature) else {
            return Ok(false);
        };
        match self.parents[key] {
            0 => self.delete(key)?,
            n if n > 0 => self.parents[key] = -n,
            _ => return Err(LexiconError::ChildMarkedTwice(feature.to_string())),
        }
        Ok(true)
    }

    /// Called when a compound holding `feature` as a constituent is deleted.
    pub fn decrement_parent_counts(&mut self, feature: &Feature) -> Result<(), LexiconError> {
        let key = self
            .get(feature)
            .ok_or_else(|| LexiconError::MissingChild(feature.to_string()))?;
        match self.parents[key] {
            0 => return Err(LexiconError::ParentCount(feature.to_string())),
            -1 => {
                self.parents[key] = 0;
                self.delete(key)?;
            }
            n if n < 0 => self.parents[key] = n + 1,
            n => self.parents[key] = n - 1,
        }
        Ok(())
    }

    /// Flip a marked entry back to live, used when its main-lexicon copy is discarded.
    pub(crate) fn unmark(&mut self, feature: &Feature) {
        if let Some(key) = self.get(feature) {
            if self.parents[key] < 0 {
                self.parents[key] = -self.parents[key];
            }
        }
    }

    fn delete(&mut self, key: usize) -> Result<(), LexiconError> {
        let Some(feature) = self.features[key].take() else {
            return Ok(());
        };
        self.index.remove(&feature);
        debug!(feature = %feature, "deleted child feature");
        for child in feature.constituents() {
            self.decrement_parent_counts(child)?;
        }
        Ok(())
    }

    /// Re-resolve every marked entry against the owning lexicon.
    ///
    /// Marked entries claim to live in the main lexicon as well; after a load
    /// the two stores are reconciled by value and a miss means the pair is corrupt.
    pub fn set_parent(&self, outer: &FeatureTable) -> Result<(), LexiconError> {
        for (_, feature, count) in self.iter() {
            if count < 0 && !outer.contains(feature) {
                return Err(LexiconError::UnresolvedChild(feature.to_string()));
            }
        }
        Ok(())
    }

    /// Copy without deleted slots.
    pub fn compacted(&self) -> Self {
        let mut out = Self::new();
        for (_, feature, count) in self.iter() {
            out.index.insert(feature.clone(), out.features.len());
            out.features.push(Some(feature.clone()));
            out.parents.push(count);
        }
        out
    }

    pub(crate) fn from_parts(features: Vec<Feature>, parents: Vec<i32>) -> Self {
        let index = features
            .iter()
            .enumerate()
            .map(|(k, f)| (f.clone(), k))
            .collect();
        Self {
            index,
            features: features.into_iter().map(Some).collect(),
            parents,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
