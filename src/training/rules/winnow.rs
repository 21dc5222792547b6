//! Littlestone's Winnow: multiplicative updates on positive weights.

use serde::{Deserialize, Serialize};

use crate::data::ExampleView;
use crate::training::learner::LearnerKind;
use crate::training::ltu::{LinearState, LtuParams, UpdateRule};
use crate::training::{ConfigError, LearnerError};

/// Promotion multiplies touched weights by `α = learning_rate`, demotion by `β`.
///
/// Weights start at `initial_weight` and stay strictly positive as long as
/// `initial_weight`, `α` and `β` are positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Winnow {
    pub params: LtuParams,
    /// Demotion factor. Default: `1 / α`.
    pub beta: f64,
}

impl Default for Winnow {
    fn default() -> Self {
        Self::new(2.0, 16.0)
    }
}

impl Winnow {
    /// Winnow with promotion factor `alpha`, `β = 1/α` and initial weight 1.
    pub fn new(alpha: f64, threshold: f64) -> Self {
        Self {
            params: LtuParams {
                learning_rate: alpha,
                threshold,
                initial_weight: 1.0,
                ..Default::default()
            },
            beta: 1.0 / alpha,
        }
    }

    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }
}

impl UpdateRule for Winnow {
    type State = LinearState;

    const KIND: LearnerKind = LearnerKind::Winnow;

    fn params(&self) -> &LtuParams {
        &self.params
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.params.validate()?;
        if !(self.beta > 0.0) || !self.beta.is_finite() {
            return Err(ConfigError::InvalidParameter { field: "beta", value: self.beta });
        }
        if !(self.params.initial_weight > 0.0) {
            return Err(ConfigError::InvalidParameter {
                field: "initial_weight",
                value: self.params.initial_weight,
            });
        }
        Ok(())
    }

    fn initial_state(&self) -> LinearState {
        LinearState::new(self.params.initial_weight)
    }

    fn training_score(&self, state: &LinearState, example: ExampleView<'_>) -> f64 {
        state.dot(example)
    }

    fn learning_rate(
        &self,
        _state: &LinearState,
        _example: ExampleView<'_>,
        label: bool,
        _score: f64,
    ) -> Result<f64, LearnerError> {
        Ok(if label { self.params.learning_rate } else { self.beta })
    }

    fn promote(&self, state: &mut LinearState, example: ExampleView<'_>, rate: f64) {
        state.scaled_multiply(example, rate);
    }

    fn demote(&self, state: &mut LinearState, example: ExampleView<'_>, rate: f64) {
        state.scaled_multiply(example, rate);
    }
}
