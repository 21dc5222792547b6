//! Online learners and the machinery that trains them.
//!
//! - [`Learner`]: the interface every algorithm implements
//! - [`LinearThresholdUnit`]: the binary engine, parameterized by an [`UpdateRule`]
//! - [`rules`]: Perceptron, averaged Perceptron, Winnow, binary MIRA,
//!   Passive-Aggressive and confidence-weighted updates
//! - [`MulticlassMira`]: one weight vector per label with a joint update
//! - [`TrainingSession`]: sole owner of a lexicon and a learner
//! - [`OnlineTrainer`]: multi-pass training driven by [`TrainerConfig`]
//!
//! ## Logging
//!
//! [`TrainingLogger`] emits `tracing` events gated by [`Verbosity`]. Install
//! any `tracing` subscriber to see them.

mod callback;
mod config;
mod error;
mod learner;
mod logger;
mod ltu;
mod multiclass_mira;
pub mod rules;
mod session;
mod trainer;

pub use callback::{EarlyStopAction, EarlyStopping};
pub use config::{ConfigError, TrainerConfig, TrainerConfigBuilder};
pub use error::LearnerError;
pub use learner::{Learner, LearnerKind};
pub use logger::{PassStats, TrainingLogger, Verbosity};
pub use ltu::{learn_step, LinearState, LinearThresholdUnit, LtuParams, Phase, RuleState, UpdateOutcome, UpdateRule};
pub use multiclass_mira::MulticlassMira;
pub use session::TrainingSession;
pub use trainer::{LabeledExample, OnlineTrainer, TrainingReport};
