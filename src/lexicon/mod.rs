//! Feature lexicon: the bijective map from features to dense integer keys.
//!
//! Keys are handed out in insertion order while training and stay stable
//! until [`Lexicon::prune`] compacts them. Constituents of compound features
//! are interned in a nested [`ChildLexicon`] rather than the main table, since
//! they never receive a weight of their own.
//!
//! Whether a lookup may insert is decided by an explicit [`Mode`] argument.

mod children;
mod counts;
mod pruning;
mod table;

pub use children::ChildLexicon;
pub use counts::{CountPolicy, FeatureCounts};
pub use pruning::{PruneThresholds, PruningPolicy};
pub use table::FeatureTable;

use thiserror::Error;

use crate::data::Example;
use crate::feature::Feature;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by lexicon operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexiconError {
    // --- Configuration errors: reported before any mutation ---
    /// Per-class counting is active but no label was given.
    #[error("per-class feature counting requires a class label")]
    PerClassLabelRequired,

    /// Global counting is active but a label was given.
    #[error("global feature counting does not take a class label (got {0})")]
    GlobalLabelForbidden(usize),

    /// A pruning operation was requested before counting was enabled.
    #[error("pruning requires feature counts; enable a count policy first")]
    CountingDisabled,

    #[error("invalid lexicon configuration: {0}")]
    Configuration(String),

    #[error("key {key} is out of range for a lexicon of size {size}")]
    UnknownKey { key: usize, size: usize },

    // --- Data errors: the lexicon is in an inconsistent state ---
    #[error("child feature {0} marked for removal twice")]
    ChildMarkedTwice(String),

    #[error("parent count of child feature {0} is already zero")]
    ParentCount(String),

    #[error("child feature {0} is not in the child lexicon")]
    MissingChild(String),

    #[error("child feature {0} cannot be found in its parent lexicon")]
    UnresolvedChild(String),
}

impl LexiconError {
    /// Whether the error reports misuse rather than corrupted state.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::PerClassLabelRequired
                | Self::GlobalLabelForbidden(_)
                | Self::CountingDisabled
                | Self::Configuration(_)
                | Self::UnknownKey { .. }
        )
    }
}

// ============================================================================
// Mode
// ============================================================================

/// Whether a lookup may grow the lexicon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Unknown features are inserted and counts are updated.
    Training,
    /// The lexicon is read-only; unknown features map to [`Lexicon::cutoff`].
    #[default]
    Inference,
}

// ============================================================================
// Lexicon
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lexicon {
    table: FeatureTable,
    counts: FeatureCounts,
    /// Keys at or beyond this are pruned. `None` until a prune happens.
    cutoff: Option<usize>,
    children: Option<ChildLexicon>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn contains(&self, feature: &Feature) -> bool {
        self.table.contains(feature)
    }

    pub fn key_of(&self, feature: &Feature) -> Option<usize> {
        self.table.get(feature)
    }

    pub fn feature(&self, key: usize) -> Option<&Feature> {
        self.table.feature(key)
    }

    pub fn table(&self) -> &FeatureTable {
        &self.table
    }

    /// Iterate `(key, feature)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Feature)> + '_ {
        self.table.features().iter().enumerate()
    }

    /// First pruned key; the lexicon size when no prune has happened.
    pub fn cutoff(&self) -> usize {
        self.cutoff.unwrap_or_else(|| self.len())
    }

    pub fn prune_cutoff(&self) -> Option<usize> {
        self.cutoff
    }

    pub fn children(&self) -> Option<&ChildLexicon> {
        self.children.as_ref()
    }

    pub fn counts(&self) -> &FeatureCounts {
        &self.counts
    }

    pub fn count_policy(&self) -> CountPolicy {
        self.counts.policy()
    }

    /// Global count of `key`, zero without global counts.
    pub fn count(&self, key: usize) -> u32 {
        self.counts.global(key)
    }

    /// Per-class count of `key`, zero without per-class counts.
    pub fn class_count(&self, key: usize, class: usize) -> u32 {
        self.counts.per_class(key, class)
    }

    /// Every entry with its counts, sorted by the features' natural order.
    ///
    /// Counts hold one value under global counting, one per class under
    /// per-class counting and none otherwise.
    pub fn count_table(&self) -> Vec<(&Feature, usize, Vec<u32>)> {
        let mut rows: Vec<_> = self
            .iter()
            .map(|(key, feature)| {
                let counts = match &self.counts {
                    FeatureCounts::None => Vec::new(),
                    FeatureCounts::Global(_) => vec![self.counts.global(key)],
                    FeatureCounts::PerClass(rows) => {
                        (0..rows.len()).map(|c| self.counts.per_class(key, c)).collect()
                    }
                };
                (feature, key, counts)
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }

    /// Key of `feature`, or [`cutoff`](Self::cutoff) when unknown. Never mutates.
    pub fn peek(&self, feature: &Feature) -> usize {
        self.key_of(feature).unwrap_or_else(|| self.cutoff())
    }

    /// Map `feature` to its key.
    ///
    /// In [`Mode::Training`] an unknown feature is appended and counts are
    /// updated; in [`Mode::Inference`] this is [`peek`](Self::peek).
    pub fn lookup(&mut self, feature: &Feature, mode: Mode, label: Option<usize>) -> Result<usize, LexiconError> {
        if mode == Mode::Inference {
            return Ok(self.peek(feature));
        }
        self.counts.check_label(label)?;

        if let Some(key) = self.table.get(feature) {
            self.counts.increment(key, label);
            return Ok(key);
        }

        if let Some(children) = self.children.as_mut() {
            children.remove(feature)?;
        }
        let key = self.table.push(feature.clone());
        self.counts.increment(key, label);
        Ok(key)
    }

    /// Switch counting policy. Switching keeps the entries and drops only the counts.
    pub fn count_features(&mut self, policy: CountPolicy) {
        if self.counts.policy() != policy {
            self.counts = FeatureCounts::for_policy(policy);
        }
    }

    /// Collapse per-class counts into global counts.
    pub fn per_class_to_global_counts(&mut self) -> Result<(), LexiconError> {
        let FeatureCounts::PerClass(rows) = &self.counts else {
            return Err(LexiconError::Configuration(
                "per-class counts are required to derive global counts".into(),
            ));
        };
        let mut global = vec![0u32; self.len()];
        for row in rows {
            for (key, &c) in row.iter().enumerate() {
                if key < global.len() {
                    global[key] = global[key].saturating_add(c);
                }
            }
        }
        self.counts = FeatureCounts::Global(global);
        Ok(())
    }

    /// Register a constituent of a compound feature seen while training.
    ///
    /// A constituent that already has a main key only gets its count bumped;
    /// otherwise it is interned in the child lexicon.
    pub fn get_child_feature(&mut self, feature: &Feature, label: Option<usize>) -> Result<(), LexiconError> {
        self.counts.check_label(label)?;
        if let Some(key) = self.table.get(feature) {
            self.counts.increment(key, label);
        } else {
            self.children
                .get_or_insert_with(ChildLexicon::new)
                .register(feature, &self.table);
        }
        Ok(())
    }

    /// Key used to reference `feature` as a constituent.
    ///
    /// A main key if present, otherwise `-(child_key) - 1`.
    pub fn lookup_child(&self, feature: &Feature) -> Option<i64> {
        if let Some(key) = self.key_of(feature) {
            return Some(key as i64);
        }
        self.children
            .as_ref()
            .and_then(|c| c.get(feature))
            .map(|k| -(k as i64) - 1)
    }

    /// Inverse of [`lookup_child`](Self::lookup_child).
    pub fn lookup_key(&self, key: i64) -> Option<&Feature> {
        if key >= 0 {
            self.feature(key as usize)
        } else {
            let child = (-key - 1) as usize;
            self.children.as_ref().and_then(|c| c.feature(child))
        }
    }

    /// Encode raw `(feature, value)` pairs as a sparse example.
    ///
    /// The label arity is checked up front so a rejected example leaves the
    /// lexicon untouched.
    pub fn encode(
        &mut self,
        raw: &[(Feature, f64)],
        mode: Mode,
        label: Option<usize>,
    ) -> Result<Example, LexiconError> {
        if mode == Mode::Inference {
            return Ok(self.encode_frozen(raw));
        }
        self.counts.check_label(label)?;

        let mut example = Example::with_capacity(raw.len());
        for (feature, value) in raw {
            for child in feature.constituents() {
                self.get_child_feature(child, label)?;
            }
            let key = self.lookup(feature, Mode::Training, label)?;
            example.push(key, *value);
        }
        Ok(example)
    }

    /// Read-only encoding; unknown features map to the cutoff sentinel.
    pub fn encode_frozen(&self, raw: &[(Feature, f64)]) -> Example {
        let mut example = Example::with_capacity(raw.len());
        for (feature, value) in raw {
            example.push(self.peek(feature), *value);
        }
        example
    }

    /// Re-attach the child lexicon to this lexicon after a load.
    pub fn reattach_children(&self) -> Result<(), LexiconError> {
        match &self.children {
            Some(children) => children.set_parent(&self.table),
            None => Ok(()),
        }
    }

    pub(crate) fn from_parts(
        features: Vec<Feature>,
        counts: FeatureCounts,
        cutoff: Option<usize>,
        children: Option<ChildLexicon>,
    ) -> Self {
        Self {
            table: FeatureTable::from_features(features),
            counts,
            cutoff,
            children,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn word(w: &str) -> Feature {
        Feature::discrete("", "w", "", w)
    }

    #[test]
    fn training_lookup_inserts_in_order() {
        let mut lex = Lexicon::new();
        assert_eq!(lex.lookup(&word("a"), Mode::Training, None).unwrap(), 0);
        assert_eq!(lex.lookup(&word("b"), Mode::Training, None).unwrap(), 1);
        assert_eq!(lex.lookup(&word("a"), Mode::Training, None).unwrap(), 0);
        assert_eq!(lex.len(), 2);
        assert_eq!(lex.feature(1), Some(&word("b")));
    }

    #[test]
    fn failed_child_removal_leaves_table_untouched() {
        // Registering against a table that holds `b` marks it; a later
        // insertion of `b` into a table without it is inconsistent.
        let mut outer = FeatureTable::default();
        outer.push(word("b"));
        let mut children = ChildLexicon::new();
        children.register(&Feature::conjunction("", "c", word("a"), word("b")), &outer);

        let mut lex = Lexicon::new();
        lex.count_features(CountPolicy::Global);
        lex.children = Some(children);
        let before = lex.clone();

        assert!(matches!(
            lex.lookup(&word("b"), Mode::Training, None),
            Err(LexiconError::ChildMarkedTwice(_))
        ));
        assert_eq!(lex, before);
        assert!(!lex.contains(&word("b")));
    }

    #[test]
    fn inference_lookup_returns_cutoff_without_mutation() {
        let mut lex = Lexicon::new();
        lex.lookup(&word("a"), Mode::Training, None).unwrap();
        let before = lex.clone();
        assert_eq!(lex.lookup(&word("zzz"), Mode::Inference, None).unwrap(), 1);
        assert_eq!(lex, before);
    }

    #[test]
    fn global_counts_track_lookups() {
        let mut lex = Lexicon::new();
        lex.count_features(CountPolicy::Global);
        for w in ["a", "b", "a", "a"] {
            lex.lookup(&word(w), Mode::Training, None).unwrap();
        }
        assert_eq!(lex.count(0), 3);
        assert_eq!(lex.count(1), 1);
    }

    #[test]
    fn label_mismatch_is_rejected_before_mutation() {
        let mut lex = Lexicon::new();
        lex.count_features(CountPolicy::PerClass);
        let err = lex.lookup(&word("a"), Mode::Training, None).unwrap_err();
        assert_eq!(err, LexiconError::PerClassLabelRequired);
        assert!(err.is_configuration());
        assert!(lex.is_empty());

        lex.count_features(CountPolicy::Global);
        let err = lex.encode(&[(word("a"), 1.0)], Mode::Training, Some(1)).unwrap_err();
        assert_eq!(err, LexiconError::GlobalLabelForbidden(1));
        assert!(lex.is_empty());
    }

    #[test]
    fn switching_policy_keeps_entries() {
        let mut lex = Lexicon::new();
        lex.count_features(CountPolicy::Global);
        lex.lookup(&word("a"), Mode::Training, None).unwrap();
        lex.count_features(CountPolicy::None);
        assert_eq!(lex.len(), 1);
        assert_eq!(lex.count(0), 0);
    }

    #[test]
    fn per_class_to_global_sums_rows() {
        let mut lex = Lexicon::new();
        lex.count_features(CountPolicy::PerClass);
        lex.lookup(&word("a"), Mode::Training, Some(0)).unwrap();
        lex.lookup(&word("a"), Mode::Training, Some(2)).unwrap();
        lex.per_class_to_global_counts().unwrap();
        assert_eq!(lex.count_policy(), CountPolicy::Global);
        assert_eq!(lex.count(0), 2);
    }

    #[test]
    fn compound_constituents_go_to_child_lexicon() {
        let mut lex = Lexicon::new();
        let ab = Feature::conjunction("", "c", word("a"), word("b"));
        let ex = lex.encode(&[(ab.clone(), 1.0)], Mode::Training, None).unwrap();

        assert_eq!(ex.keys, vec![0]);
        assert_eq!(lex.len(), 1);
        let children = lex.children().unwrap();
        assert!(children.contains(&word("a")));
        assert!(lex.lookup_child(&word("a")).unwrap() < 0);
        assert_eq!(lex.lookup_key(lex.lookup_child(&word("b")).unwrap()), Some(&word("b")));
    }

    #[test]
    fn main_insert_removes_unreferenced_child() {
        let mut lex = Lexicon::new();
        let ab = Feature::conjunction("", "c", word("a"), word("b"));
        lex.encode(&[(ab, 1.0)], Mode::Training, None).unwrap();

        // "a" has no child-lexicon parents, so it leaves the child lexicon.
        lex.lookup(&word("a"), Mode::Training, None).unwrap();
        assert!(!lex.children().unwrap().contains(&word("a")));
        assert_eq!(lex.lookup_child(&word("a")), Some(1));
    }

    #[test]
    fn constituent_in_main_lexicon_gets_counted() {
        let mut lex = Lexicon::new();
        lex.count_features(CountPolicy::Global);
        lex.lookup(&word("a"), Mode::Training, None).unwrap();
        let ab = Feature::conjunction("", "c", word("a"), word("b"));
        lex.encode(&[(ab, 1.0)], Mode::Training, None).unwrap();
        assert_eq!(lex.count(0), 2);
        assert!(!lex.children().unwrap().contains(&word("a")));
    }

    #[test]
    fn count_table_is_sorted_by_feature() {
        let mut lex = Lexicon::new();
        lex.count_features(CountPolicy::Global);
        for w in ["c", "a", "c"] {
            lex.lookup(&word(w), Mode::Training, None).unwrap();
        }
        let table = lex.count_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0], (&word("a"), 1, vec![1]));
        assert_eq!(table[1], (&word("c"), 0, vec![2]));
    }

    #[test]
    fn encode_frozen_uses_sentinel() {
        let mut lex = Lexicon::new();
        lex.lookup(&word("a"), Mode::Training, None).unwrap();
        let ex = lex.encode_frozen(&[(word("a"), 1.0), (word("q"), 2.0)]);
        assert_eq!(ex.keys, vec![0, 1]);
    }
}
