//! Count-driven pruning and compaction.
//!
//! Pruning moves every pruned key to the tail of the lexicon and records the
//! resulting permutation. Example encodings and weight vectors produced
//! before the prune must be remapped with it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::counts::FeatureCounts;
use super::{Lexicon, LexiconError};
use crate::data::Example;

/// Which features a prune removes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PruningPolicy {
    /// Nothing is pruned; a previous prune cutoff is cleared.
    #[default]
    None,
    /// Prune features whose count is below this threshold.
    Absolute(u32),
    /// Prune features whose count is below `ceil(max_count * fraction)`,
    /// computed separately for each counting dimension.
    Percentage(f64),
}

/// Resolved thresholds for a policy against the current counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneThresholds {
    Global(u32),
    /// Indexed by class.
    PerClass(Vec<u32>),
}

fn percentage_threshold(max: u32, fraction: f64) -> u32 {
    (max as f64 * fraction).ceil() as u32
}

impl Lexicon {
    /// Thresholds implied by `policy`, or `None` for [`PruningPolicy::None`].
    pub fn thresholds(&self, policy: &PruningPolicy) -> Result<Option<PruneThresholds>, LexiconError> {
        if let PruningPolicy::Percentage(fraction) = *policy {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(LexiconError::Configuration(format!(
                    "pruning percentage must be in [0, 1], got {fraction}"
                )));
            }
        }

        let thresholds = match (policy, &self.counts) {
            (PruningPolicy::None, _) => return Ok(None),
            (_, FeatureCounts::None) => return Err(LexiconError::CountingDisabled),
            (PruningPolicy::Absolute(t), FeatureCounts::Global(_)) => PruneThresholds::Global(*t),
            (PruningPolicy::Absolute(t), FeatureCounts::PerClass(rows)) => {
                PruneThresholds::PerClass(vec![*t; rows.len()])
            }
            (PruningPolicy::Percentage(p), FeatureCounts::Global(counts)) => {
                let max = counts.iter().copied().max().unwrap_or(0);
                PruneThresholds::Global(percentage_threshold(max, *p))
            }
            (PruningPolicy::Percentage(p), FeatureCounts::PerClass(rows)) => PruneThresholds::PerClass(
                rows.iter()
                    .map(|row| percentage_threshold(row.iter().copied().max().unwrap_or(0), *p))
                    .collect(),
            ),
        };
        Ok(Some(thresholds))
    }

    /// Whether `key` is pruned under `policy`.
    ///
    /// With per-class counts and `label = None`, a key is pruned only when it
    /// falls below the threshold in every class.
    pub fn is_pruned(
        &self,
        key: usize,
        label: Option<usize>,
        policy: &PruningPolicy,
    ) -> Result<bool, LexiconError> {
        if key >= self.len() {
            return Err(LexiconError::UnknownKey { key, size: self.len() });
        }
        Ok(match self.thresholds(policy)? {
            Some(t) => self.is_pruned_with(key, label, &t),
            None => false,
        })
    }

    pub(crate) fn is_pruned_with(&self, key: usize, label: Option<usize>, t: &PruneThresholds) -> bool {
        match t {
            PruneThresholds::Global(threshold) => self.counts.global(key) < *threshold,
            PruneThresholds::PerClass(thresholds) => match label {
                Some(class) => {
                    let threshold = thresholds.get(class).copied().unwrap_or(0);
                    self.counts.per_class(key, class) < threshold
                }
                None => thresholds
                    .iter()
                    .enumerate()
                    .all(|(class, &threshold)| self.counts.per_class(key, class) < threshold),
            },
        }
    }

    /// Move pruned keys past a new cutoff.
    ///
    /// Returns `permutation[old_key] = new_key`, or `None` for
    /// [`PruningPolicy::None`], which only clears a previous cutoff.
    pub fn prune(&mut self, policy: &PruningPolicy) -> Result<Option<Vec<usize>>, LexiconError> {
        let Some(thresholds) = self.thresholds(policy)? else {
            self.cutoff = None;
            return Ok(None);
        };

        let size = self.len();
        // moved[position] = original key of the feature now at `position`
        let mut moved: Vec<usize> = (0..size).collect();
        let mut cutoff = size;

        while cutoff > 0 && self.is_pruned_with(cutoff - 1, None, &thresholds) {
            cutoff -= 1;
        }

        let mut i = cutoff;
        while i > 0 {
            i -= 1;
            if self.is_pruned_with(i, None, &thresholds) {
                cutoff -= 1;
                self.swap_keys(i, cutoff);
                moved.swap(i, cutoff);
            }
        }

        invert_permutation(&mut moved);
        self.cutoff = Some(cutoff);
        debug!(size, cutoff, ?policy, "pruned lexicon");
        Ok(Some(moved))
    }

    fn swap_keys(&mut self, a: usize, b: usize) {
        self.table.swap(a, b);
        self.counts.swap(a, b);
    }

    /// Drop every key at or beyond the prune cutoff. Idempotent.
    pub fn discard_pruned_features(&mut self) {
        let Some(cutoff) = self.cutoff.take() else {
            return;
        };
        let removed = self.table.truncate(cutoff);
        self.counts.truncate(cutoff);
        if let Some(children) = self.children.as_mut() {
            for feature in &removed {
                children.unmark(feature);
            }
        }
        debug!(discarded = removed.len(), "discarded pruned features");
    }

    /// Drop the keys of `example` that are pruned for `label` (per-example pruning).
    ///
    /// Keys outside the lexicon are dropped as well.
    pub fn prune_example(
        &self,
        example: &Example,
        label: Option<usize>,
        policy: &PruningPolicy,
    ) -> Result<Example, LexiconError> {
        let thresholds = self.thresholds(policy)?;
        let mut out = Example::with_capacity(example.len());
        for (k, v) in example.view().iter() {
            if k >= self.len() {
                continue;
            }
            let pruned = thresholds
                .as_ref()
                .is_some_and(|t| self.is_pruned_with(k, label, t));
            if !pruned {
                out.push(k, v);
            }
        }
        Ok(out)
    }
}

/// Invert a permutation in place by following its cycles.
///
/// The top bit of each entry marks slots already holding their inverse, so
/// no second array is needed. Entries must be below `usize::MAX >> 1`.
pub(crate) fn invert_permutation(perm: &mut [usize]) {
    const DONE: usize = !(usize::MAX >> 1);

    for start in 0..perm.len() {
        if perm[start] & DONE != 0 {
            continue;
        }
        let mut prev = start;
        let mut next = perm[start];
        while next != start {
            let after = perm[next];
            perm[next] = prev | DONE;
            prev = next;
            next = after;
        }
        perm[start] = prev | DONE;
    }

    for p in perm.iter_mut() {
        *p &= !DONE;
    }
}

// ============================================================================
// Tests
// ============================================================================
