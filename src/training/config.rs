//! Trainer configuration with builder pattern.
//!
//! [`TrainerConfig`] drives [`OnlineTrainer`](super::OnlineTrainer). It uses
//! the `bon` crate for the builder and validates on `build()`.
//!
//! ```
//! use perceptrons::lexicon::{CountPolicy, PruningPolicy};
//! use perceptrons::training::TrainerConfig;
//!
//! let config = TrainerConfig::builder().build().unwrap();
//! assert_eq!(config.n_passes, 1);
//!
//! let config = TrainerConfig::builder()
//!     .n_passes(10)
//!     .count_policy(CountPolicy::Global)
//!     .pruning(PruningPolicy::Absolute(2))
//!     .build()
//!     .unwrap();
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

use super::Verbosity;
use crate::lexicon::{CountPolicy, PruningPolicy};

// =============================================================================
// ConfigError
// =============================================================================

/// Errors from parameter validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Learning rate must be positive and finite.
    InvalidLearningRate(f64),
    /// Thickness must be non-negative.
    InvalidThickness { field: &'static str, value: f64 },
    /// A parameter is outside its valid range.
    InvalidParameter { field: &'static str, value: f64 },
    /// At least one pass is required.
    InvalidNPasses,
    /// Pruning was requested without a count policy to prune by.
    PruningWithoutCounts,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLearningRate(v) => {
                write!(f, "learning_rate must be positive, got {}", v)
            }
            Self::InvalidThickness { field, value } => {
                write!(f, "{} must be non-negative, got {}", field, value)
            }
            Self::InvalidParameter { field, value } => {
                write!(f, "invalid value for {}: {}", field, value)
            }
            Self::InvalidNPasses => write!(f, "n_passes must be at least 1"),
            Self::PruningWithoutCounts => {
                write!(f, "pruning requires a count policy other than None")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// TrainerConfig
// =============================================================================

/// Configuration for multi-pass online training.
///
/// # Structure
///
/// - **Passes**: how many times the data is replayed and in what order
/// - **Lexicon**: what is counted and how the lexicon is pruned after encoding
/// - **Stopping**: early stopping on mistake counts and convergence
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct TrainerConfig {
    // === Passes ===
    /// Number of passes over the data. Default: 1.
    #[builder(default = 1)]
    pub n_passes: u32,

    /// Shuffle example order before each pass. Default: false.
    #[builder(default)]
    pub shuffle: bool,

    /// Seed for shuffling. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,

    // === Lexicon ===
    /// Occurrence counting while encoding. Default: `None`.
    #[builder(default)]
    pub count_policy: CountPolicy,

    /// Pruning applied once all examples are encoded. Default: `None`.
    #[builder(default)]
    pub pruning: PruningPolicy,

    /// Physically drop pruned features after pruning. Default: false.
    #[builder(default)]
    pub discard_pruned: bool,

    // === Stopping ===
    /// Stop when mistakes have not decreased for this many passes.
    /// 0 disables early stopping. Default: 0.
    #[builder(default)]
    pub early_stopping_rounds: u32,

    /// Stop after the first mistake-free pass. Default: false.
    #[builder(default)]
    pub stop_on_converge: bool,

    /// Verbosity level. Default: `Silent`.
    #[builder(default)]
    pub verbosity: Verbosity,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self::builder().__build_internal()
    }
}

impl<S: trainer_config_builder::IsComplete> TrainerConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `n_passes == 0`
    /// - a percentage pruning fraction is outside `[0, 1]`
    /// - pruning is requested with `CountPolicy::None`
    pub fn build(self) -> Result<TrainerConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl TrainerConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.n_passes == 0 {
            return Err(ConfigError::InvalidNPasses);
        }
        match self.pruning {
            PruningPolicy::None => {}
            PruningPolicy::Percentage(p) if !(0.0..=1.0).contains(&p) => {
                return Err(ConfigError::InvalidParameter { field: "pruning", value: p });
            }
            _ if self.count_policy == CountPolicy::None => {
                return Err(ConfigError::PruningWithoutCounts);
            }
            _ => {}
        }
        Ok(())
    }
}
