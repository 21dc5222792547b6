//! Passive-Aggressive (PA-I) updates.

use serde::{Deserialize, Serialize};

use super::sign;
use crate::data::ExampleView;
use crate::training::learner::LearnerKind;
use crate::training::ltu::{LinearState, LtuParams, UpdateRule};
use crate::training::{ConfigError, LearnerError};

/// Updates on the usual threshold predicates with the hinge-loss step
/// `clip((1 − y·s) / (‖x‖² + 1), 0, C)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassiveAggressive {
    pub params: LtuParams,
    /// Upper bound `C` on a single step. Default: 1.
    pub aggressiveness: f64,
}

impl Default for PassiveAggressive {
    fn default() -> Self {
        Self {
            params: LtuParams::default(),
            aggressiveness: 1.0,
        }
    }
}

impl UpdateRule for PassiveAggressive {
    type State = LinearState;

    const KIND: LearnerKind = LearnerKind::PassiveAggressive;

    fn params(&self) -> &LtuParams {
        &self.params
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.params.validate()?;
        if !(self.aggressiveness > 0.0) || !self.aggressiveness.is_finite() {
            return Err(ConfigError::InvalidParameter {
                field: "aggressiveness",
                value: self.aggressiveness,
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
        example: ExampleView<'_>,
        label: bool,
        score: f64,
    ) -> Result<f64, LearnerError> {
        let loss = 1.0 - sign(label) * score;
        Ok((loss / (example.squared_norm() + 1.0)).clamp(0.0, self.aggressiveness))
    }

    fn promote(&self, state: &mut LinearState, example: ExampleView<'_>, rate: f64) {
        state.scaled_add(example, rate);
    }

    fn demote(&self, state: &mut LinearState, example: ExampleView<'_>, rate: f64) {
        state.scaled_add(example, -rate);
    }
}
