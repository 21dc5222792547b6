//! Feature occurrence counting.

use serde::{Deserialize, Serialize};

use super::LexiconError;

/// Which occurrence counts a lexicon keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CountPolicy {
    /// Occurrences are not counted.
    #[default]
    None,
    /// One count per feature regardless of label.
    Global,
    /// One count per (feature, label) pair; lookups must supply the label.
    PerClass,
}

/// Count storage matching a [`CountPolicy`].
///
/// Arrays may be shorter than the lexicon; missing entries read as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FeatureCounts {
    #[default]
    None,
    Global(Vec<u32>),
    /// Indexed `[class][key]`.
    PerClass(Vec<Vec<u32>>),
}

impl FeatureCounts {
    pub fn for_policy(policy: CountPolicy) -> Self {
        match policy {
            CountPolicy::None => Self::None,
            CountPolicy::Global => Self::Global(Vec::new()),
            CountPolicy::PerClass => Self::PerClass(Vec::new()),
        }
    }

    pub fn policy(&self) -> CountPolicy {
        match self {
            Self::None => CountPolicy::None,
            Self::Global(_) => CountPolicy::Global,
            Self::PerClass(_) => CountPolicy::PerClass,
        }
    }

    /// Check that `label` has the arity the active policy expects.
    pub fn check_label(&self, label: Option<usize>) -> Result<(), LexiconError> {
        match (self, label) {
            (Self::Global(_), Some(l)) => Err(LexiconError::GlobalLabelForbidden(l)),
            (Self::PerClass(_), None) => Err(LexiconError::PerClassLabelRequired),
            _ => Ok(()),
        }
    }

    /// Add one occurrence. The label must already have been checked.
    pub(crate) fn increment(&mut self, key: usize, label: Option<usize>) {
        match self {
            Self::None => {}
            Self::Global(counts) => bump(counts, key),
            Self::PerClass(rows) => {
                if let Some(class) = label {
                    if rows.len() <= class {
                        rows.resize_with(class + 1, Vec::new);
                    }
                    bump(&mut rows[class], key);
                }
            }
        }
    }

    /// Global count of `key`.
    pub fn global(&self, key: usize) -> u32 {
        match self {
            Self::Global(counts) => counts.get(key).copied().unwrap_or(0),
            _ => 0,
        }
    }

    /// Count of `key` under `class`.
    pub fn per_class(&self, key: usize, class: usize) -> u32 {
        match self {
            Self::PerClass(rows) => rows
                .get(class)
                .and_then(|row| row.get(key))
                .copied()
                .unwrap_or(0),
            _ => 0,
        }
    }

    pub fn num_classes(&self) -> usize {
        match self {
            Self::PerClass(rows) => rows.len(),
            _ => 0,
        }
    }

    /// Swap the counts of two keys in every array.
    pub(crate) fn swap(&mut self, a: usize, b: usize) {
        let hi = a.max(b);
        match self {
            Self::None => {}
            Self::Global(counts) => swap_padded(counts, a, b, hi),
            Self::PerClass(rows) => {
                for row in rows {
                    swap_padded(row, a, b, hi);
                }
            }
        }
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        match self {
            Self::None => {}
            Self::Global(counts) => counts.truncate(len),
            Self::PerClass(rows) => {
                for row in rows {
                    row.truncate(len);
                }
            }
        }
    }
}

fn bump(counts: &mut Vec<u32>, key: usize) {
    if counts.len() <= key {
        counts.resize(key + 1, 0);
    }
    counts[key] = counts[key].saturating_add(1);
}

fn swap_padded(counts: &mut Vec<u32>, a: usize, b: usize, hi: usize) {
    if counts.len() <= hi {
        counts.resize(hi + 1, 0);
    }
    counts.swap(a, b);
}
