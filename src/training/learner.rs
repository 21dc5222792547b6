//! The learner interface shared by every online algorithm.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use super::LearnerError;
use crate::data::ExampleView;

/// Closed set of learner implementations.
///
/// Used as the type tag in persisted models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LearnerKind {
    Perceptron,
    AveragedPerceptron,
    Winnow,
    BinaryMira,
    PassiveAggressive,
    ConfidenceWeighted,
    MulticlassMira,
}

impl LearnerKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Perceptron => "perceptron",
            Self::AveragedPerceptron => "averaged-perceptron",
            Self::Winnow => "winnow",
            Self::BinaryMira => "binary-mira",
            Self::PassiveAggressive => "passive-aggressive",
            Self::ConfidenceWeighted => "confidence-weighted",
            Self::MulticlassMira => "multiclass-mira",
        }
    }
}

/// An online, mistake-driven classifier over sparse examples.
///
/// Labels are indices into [`labels`](Learner::labels). A learner is owned by
/// exactly one training session; independent copies are made with
/// [`deep_clone`](Learner::deep_clone).
pub trait Learner: Clone + Debug {
    fn kind(&self) -> LearnerKind;

    /// Label values in index order.
    fn labels(&self) -> &[String];

    fn label_index(&self, value: &str) -> Option<usize> {
        self.labels().iter().position(|l| l == value)
    }

    /// Index of `value`, registering it if the learner's label set can grow.
    fn add_label(&mut self, value: &str) -> Result<usize, LearnerError> {
        self.label_index(value)
            .ok_or_else(|| LearnerError::UnknownLabelValue(value.to_string()))
    }

    /// Train on one example. Returns whether any weight changed.
    fn learn(&mut self, example: ExampleView<'_>, label: usize) -> Result<bool, LearnerError>;

    /// One score per label, in label order.
    fn scores(&self, example: ExampleView<'_>) -> Vec<f64>;

    /// Index of the predicted label.
    fn classify(&self, example: ExampleView<'_>) -> usize;

    /// Reset to the untrained state, keeping configuration and labels.
    fn forget(&mut self);

    /// Called once after the last training example.
    fn finish_training(&mut self) {}

    /// Move weights to the keys given by a lexicon prune permutation.
    fn remap(&mut self, permutation: &[usize]);

    /// Drop weights at or beyond `len`.
    fn truncate(&mut self, len: usize);

    /// Number of materialized weights in the largest weight vector.
    fn num_weights(&self) -> usize;

    /// Independent copy sharing no state with `self`.
    fn deep_clone(&self) -> Self {
        self.clone()
    }
}

pub(crate) fn check_label(label: usize, n_labels: usize) -> Result<(), LearnerError> {
    if label >= n_labels {
        return Err(LearnerError::UnknownLabel { label, n_labels });
    }
    Ok(())
}

pub(crate) fn check_example(example: ExampleView<'_>) -> Result<(), LearnerError> {
    if example.keys.len() != example.values.len() {
        return Err(LearnerError::DimensionMismatch {
            keys: example.keys.len(),
            values: example.values.len(),
        });
    }
    Ok(())
}
