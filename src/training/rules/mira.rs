//! Binary MIRA (margin infused relaxed algorithm).

use serde::{Deserialize, Serialize};

use super::sign;
use crate::data::ExampleView;
use crate::training::learner::LearnerKind;
use crate::training::ltu::{LinearState, LtuParams, UpdateRule};
use crate::training::{ConfigError, LearnerError};

/// Steps below this magnitude are skipped.
const MIN_STEP: f64 = 1e-9;

/// Every example is considered; the step
/// `clip((β/2 − y·s) / (‖x‖² + 1), 0, 1) · η`
/// is zero once the signed margin reaches `β/2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryMira {
    pub params: LtuParams,
    /// Target margin is `β/2`. Default: 2.
    pub beta: f64,
}

impl Default for BinaryMira {
    fn default() -> Self {
        Self {
            params: LtuParams { learning_rate: 1.0, ..Default::default() },
            beta: 2.0,
        }
    }
}

impl UpdateRule for BinaryMira {
    type State = LinearState;

    const KIND: LearnerKind = LearnerKind::BinaryMira;

    fn params(&self) -> &LtuParams {
        &self.params
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.params.validate()?;
        if !(self.beta >= 0.0) || !self.beta.is_finite() {
            return Err(ConfigError::InvalidParameter { field: "beta", value: self.beta });
        }
        Ok(())
    }

    fn initial_state(&self) -> LinearState {
        LinearState::new(self.params.initial_weight)
    }

    fn training_score(&self, state: &LinearState, example: ExampleView<'_>) -> f64 {
        state.dot(example)
    }

    fn should_promote(&self, label: bool, _score: f64) -> bool {
        label
    }

    fn should_demote(&self, label: bool, _score: f64) -> bool {
        !label
    }

    fn learning_rate(
        &self,
        _state: &LinearState,
        example: ExampleView<'_>,
        label: bool,
        score: f64,
    ) -> Result<f64, LearnerError> {
        let step = (self.beta / 2.0 - sign(label) * score) / (example.squared_norm() + 1.0);
        let rate = step.clamp(0.0, 1.0) * self.params.learning_rate;
        Ok(if rate.abs() < MIN_STEP { 0.0 } else { rate })
    }

    fn promote(&self, state: &mut LinearState, example: ExampleView<'_>, rate: f64) {
        state.scaled_add(example, rate);
    }

    fn demote(&self, state: &mut LinearState, example: ExampleView<'_>, rate: f64) {
        state.scaled_add(example, -rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Example;
    use crate::training::ltu::LinearThresholdUnit;

    #[test]
    fn closed_form_step() {
        let mut ltu = LinearThresholdUnit::boolean(BinaryMira::default()).unwrap();
        let ex = Example::new(vec![0], vec![1.0]);
        // (1 - 0) / (1 + 1) = 0.5
        ltu.learn_binary(ex.view(), true).unwrap();
        assert_eq!(ltu.state().weights.as_slice(), &[0.5]);
        assert_eq!(ltu.state().bias, 0.5);
    }

    #[test]
    fn step_is_clipped_to_one() {
        let rule = BinaryMira { beta: 20.0, ..Default::default() };
        let mut ltu = LinearThresholdUnit::boolean(rule).unwrap();
        let ex = Example::new(vec![0], vec![1.0]);
        // (10 - 0) / 2 = 5 -> clipped to 1
        ltu.learn_binary(ex.view(), false).unwrap();
        assert_eq!(ltu.state().weights.as_slice(), &[-1.0]);
    }

    #[test]
    fn confident_example_is_untouched() {
        let mut ltu = LinearThresholdUnit::boolean(BinaryMira::default()).unwrap();
        let ex = Example::new(vec![0], vec![1.0]);
        for _ in 0..3 {
            ltu.learn_binary(ex.view(), true).unwrap();
        }
        // Score is now at least beta / 2 = 1.
        assert!(ltu.score(ex.view()) >= 1.0);
        let before = ltu.state().clone();
        assert!(!ltu.learn_binary(ex.view(), true).unwrap().updated());
        assert_eq!(ltu.state(), &before);
    }
}
