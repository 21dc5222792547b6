//! A lexicon and the learner trained over it.

use super::{Learner, LearnerError};
use crate::data::Example;
use crate::feature::Feature;
use crate::lexicon::{CountPolicy, Lexicon, Mode, PruningPolicy};

/// Sole owner of a `(Lexicon, Learner)` pair.
///
/// Raw examples go in as `(Feature, value)` pairs. Training encodes them with
/// [`Mode::Training`] so the lexicon grows; every query uses
/// [`Mode::Inference`] and leaves it untouched. Keys at or beyond the prune
/// cutoff never reach the learner.
///
/// Independent copies are made with [`fork`](Self::fork).
#[derive(Debug, Clone)]
pub struct TrainingSession<L: Learner> {
    lexicon: Lexicon,
    learner: L,
}

impl<L: Learner> TrainingSession<L> {
    /// Session over an empty lexicon.
    pub fn new(learner: L) -> Self {
        Self::with_lexicon(Lexicon::new(), learner)
    }

    pub fn with_lexicon(lexicon: Lexicon, learner: L) -> Self {
        Self { lexicon, learner }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn lexicon_mut(&mut self) -> &mut Lexicon {
        &mut self.lexicon
    }

    pub fn learner(&self) -> &L {
        &self.learner
    }

    pub fn learner_mut(&mut self) -> &mut L {
        &mut self.learner
    }

    pub fn into_parts(self) -> (Lexicon, L) {
        (self.lexicon, self.learner)
    }

    /// Encode `raw` for training under label index `label`, counting
    /// occurrences as the lexicon's policy asks.
    pub fn encode_training(&mut self, raw: &[(Feature, f64)], label: usize) -> Result<Example, LearnerError> {
        let count_label = match self.lexicon.count_policy() {
            CountPolicy::PerClass => Some(label),
            CountPolicy::Global | CountPolicy::None => None,
        };
        let mut example = self.lexicon.encode(raw, Mode::Training, count_label)?;
        if let Some(cutoff) = self.lexicon.prune_cutoff() {
            example.drop_pruned(cutoff);
        }
        Ok(example)
    }

    /// Encode `raw` without touching the lexicon; unknown and pruned features are dropped.
    pub fn encode(&self, raw: &[(Feature, f64)]) -> Example {
        let mut example = self.lexicon.encode_frozen(raw);
        example.drop_pruned(self.lexicon.cutoff());
        example
    }

    /// Train on one raw example. Returns whether the learner changed.
    pub fn learn(&mut self, raw: &[(Feature, f64)], label: &str) -> Result<bool, LearnerError> {
        let index = self.learner.add_label(label)?;
        let example = self.encode_training(raw, index)?;
        self.learner.learn(example.view(), index)
    }

    /// Train on an example that is already encoded against this lexicon.
    pub fn learn_encoded(&mut self, example: &Example, label: usize) -> Result<bool, LearnerError> {
        self.learner.learn(example.view(), label)
    }

    pub fn classify_index(&self, raw: &[(Feature, f64)]) -> usize {
        self.learner.classify(self.encode(raw).view())
    }

    /// Predicted label value.
    pub fn classify(&self, raw: &[(Feature, f64)]) -> Result<&str, LearnerError> {
        let index = self.classify_index(raw);
        let labels = self.learner.labels();
        labels
            .get(index)
            .map(String::as_str)
            .ok_or(LearnerError::UnknownLabel { label: index, n_labels: labels.len() })
    }

    /// One score per label, in label order.
    pub fn scores(&self, raw: &[(Feature, f64)]) -> Vec<f64> {
        self.learner.scores(self.encode(raw).view())
    }

    /// Score of a single label value.
    pub fn score(&self, raw: &[(Feature, f64)], label: &str) -> Result<f64, LearnerError> {
        let index = self
            .learner
            .label_index(label)
            .ok_or_else(|| LearnerError::UnknownLabelValue(label.to_string()))?;
        Ok(self.scores(raw)[index])
    }

    /// Prune the lexicon and move the learner's weights along with it.
    ///
    /// Weights of pruned keys are dropped. The returned permutation must be
    /// applied to any example encoded before the prune.
    pub fn prune(&mut self, policy: &PruningPolicy) -> Result<Option<Vec<usize>>, LearnerError> {
        let permutation = self.lexicon.prune(policy)?;
        if let Some(permutation) = &permutation {
            self.learner.remap(permutation);
            self.learner.truncate(self.lexicon.cutoff());
        }
        Ok(permutation)
    }

    /// Drop pruned features from the lexicon for good.
    pub fn discard_pruned(&mut self) {
        self.lexicon.discard_pruned_features();
        self.learner.truncate(self.lexicon.len());
    }

    /// Independent copy; training either side never affects the other.
    pub fn fork(&self) -> Self {
        Self {
            lexicon: self.lexicon.clone(),
            learner: self.learner.deep_clone(),
        }
    }

    pub fn finish_training(&mut self) {
        self.learner.finish_training();
    }
}
