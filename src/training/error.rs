use thiserror::Error;

use super::ConfigError;
use crate::lexicon::LexiconError;

/// Errors raised while building, training or querying a learner.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LearnerError {
    /// A binary learner was given a label set that is not of size two.
    #[error("binary learner requires exactly 2 labels, got {0}")]
    NonBinaryLabels(usize),

    #[error("label index {label} is out of range for {n_labels} labels")]
    UnknownLabel { label: usize, n_labels: usize },

    #[error("label value {0:?} is not known to this learner")]
    UnknownLabelValue(String),

    /// An update produced a non-finite quantity. Nothing was modified.
    #[error("{what} is not finite ({value})")]
    Domain { what: &'static str, value: f64 },

    #[error("example has {keys} keys but {values} values")]
    DimensionMismatch { keys: usize, values: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lexicon(#[from] LexiconError),
}
