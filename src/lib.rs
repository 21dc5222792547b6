//! perceptrons: sparse feature lexicons and online linear learners.
//!
//! Symbolic features are interned in a [`Lexicon`] that hands out dense
//! integer keys, and examples encoded against it train online linear
//! classifiers.
//!
//! # Key Types
//!
//! - [`Feature`] - Primitive and compound symbolic features
//! - [`Lexicon`] - Feature-to-key map with occurrence counts and pruning
//! - [`LinearThresholdUnit`] - Binary learner driven by an [`UpdateRule`]
//!   (Perceptron, averaged Perceptron, Winnow, MIRA, PA, CW)
//! - [`MulticlassMira`] - One weight vector per label
//! - [`TrainingSession`] / [`OnlineTrainer`] - Lexicon and learner driven together
//!
//! # Persistence
//!
//! [`NativeCodec`](io::NativeCodec) reads and writes lexicons and learners.
//! See the [`io`] module for details.

// Re-export approx traits for users who want to compare scores
pub use approx;

pub mod data;
pub mod feature;
pub mod io;
pub mod lexicon;
pub mod repr;
pub mod testing;
pub mod training;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Features and examples
pub use data::{Example, ExampleView};
pub use feature::Feature;

// Lexicon
pub use lexicon::{CountPolicy, Lexicon, LexiconError, Mode, PruningPolicy};

// Learners
pub use training::rules::{
    AveragedPerceptron, BinaryMira, ConfidenceWeighted, PassiveAggressive, Perceptron, Winnow,
};
pub use training::{
    Learner, LearnerError, LearnerKind, LinearThresholdUnit, LtuParams, MulticlassMira, UpdateRule,
};

// Training
pub use training::{LabeledExample, OnlineTrainer, TrainerConfig, TrainingReport, TrainingSession};
