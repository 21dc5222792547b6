//! Averaged perceptron.
//!
//! Trains exactly like [`Perceptron`](super::Perceptron) but predicts with
//! the average of every weight vector (and bias) that existed during
//! training. Every example advances the example counter, updated or not.

use serde::{Deserialize, Serialize};

use crate::data::ExampleView;
use crate::repr::AveragedWeightVector;
use crate::training::learner::LearnerKind;
use crate::training::ltu::{LtuParams, RuleState, UpdateOutcome, UpdateRule};
use crate::training::LearnerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragedState {
    pub weights: AveragedWeightVector,
    pub bias: f64,
    /// Bias accumulator, same scheme as the weight accumulator.
    pub averaged_bias: f64,
    pub default: f64,
}

impl AveragedState {
    pub fn new(initial_weight: f64) -> Self {
        Self {
            weights: AveragedWeightVector::new(),
            bias: initial_weight,
            averaged_bias: 0.0,
            default: initial_weight,
        }
    }

    /// Average bias over all examples seen, 0 before the first.
    pub fn average_bias(&self) -> f64 {
        let e = self.weights.examples();
        if e == 0 {
            return 0.0;
        }
        let e = e as f64;
        (e * self.bias - self.averaged_bias) / e
    }

    fn update(&mut self, example: ExampleView<'_>, factor: f64) {
        let e = self.weights.examples() as f64;
        self.weights.scaled_add(example, factor, self.default);
        self.bias += factor;
        self.averaged_bias += e * factor;
    }
}

impl RuleState for AveragedState {
    fn remap(&mut self, permutation: &[usize]) {
        self.weights.remap(permutation, self.default);
    }

    fn truncate(&mut self, len: usize) {
        self.weights.truncate(len);
    }

    fn num_weights(&self) -> usize {
        self.weights.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AveragedPerceptron {
    pub params: LtuParams,
}

impl AveragedPerceptron {
    pub fn new(params: LtuParams) -> Self {
        Self { params }
    }
}

impl UpdateRule for AveragedPerceptron {
    type State = AveragedState;

    const KIND: LearnerKind = LearnerKind::AveragedPerceptron;

    fn params(&self) -> &LtuParams {
        &self.params
    }

    fn initial_state(&self) -> AveragedState {
        AveragedState::new(self.params.initial_weight)
    }

    fn training_score(&self, state: &AveragedState, example: ExampleView<'_>) -> f64 {
        state.weights.simple_dot(example, state.default) + state.bias
    }

    fn score(&self, state: &AveragedState, example: ExampleView<'_>) -> f64 {
        state.weights.dot(example, state.default) + state.average_bias()
    }

    fn promote(&self, state: &mut AveragedState, example: ExampleView<'_>, rate: f64) {
        state.update(example, rate);
    }

    fn demote(&self, state: &mut AveragedState, example: ExampleView<'_>, rate: f64) {
        state.update(example, -rate);
    }

    fn observe_unchanged(&self, state: &mut AveragedState) {
        state.weights.correct_example();
    }

    /// Promotion and demotion are exclusive here so each example is counted once.
    fn learn(
        &self,
        state: &mut AveragedState,
        example: ExampleView<'_>,
        label: bool,
    ) -> Result<UpdateOutcome, LearnerError> {
        let score = self.training_score(state, example);
        let rate = self.params.learning_rate;
        let outcome = if self.should_promote(label, score) {
            self.promote(state, example, rate);
            UpdateOutcome { promoted: true, demoted: false }
        } else if self.should_demote(label, score) {
            self.demote(state, example, rate);
            UpdateOutcome { promoted: false, demoted: true }
        } else {
            self.observe_unchanged(state);
            UpdateOutcome::default()
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Example;
    use crate::testing::DEFAULT_TOLERANCE;
    use crate::training::ltu::LinearThresholdUnit;
    use crate::assert_approx_eq;

    #[test]
    fn untrained_score_is_zero() {
        let ltu = LinearThresholdUnit::boolean(AveragedPerceptron::default()).unwrap();
        assert_eq!(ltu.score(Example::binary(vec![0]).view()), 0.0);
    }

    #[test]
    fn averages_weights_and_bias_over_examples() {
        let params = LtuParams { learning_rate: 1.0, ..Default::default() };
        let mut ltu = LinearThresholdUnit::boolean(AveragedPerceptron::new(params)).unwrap();
        let ex = Example::binary(vec![0]);

        // Example 1: score 0 on a negative demotes -> w = -1, b = -1.
        ltu.learn_binary(ex.view(), false).unwrap();
        // Examples 2 and 3: correct, no update.
        ltu.learn_binary(ex.view(), false).unwrap();
        ltu.learn_binary(ex.view(), false).unwrap();

        let state = ltu.state();
        assert_eq!(state.weights.examples(), 3);
        // w was -1 after every example, so the average is -1.
        assert_approx_eq!(state.weights.averaged_weight(0, 0.0), -1.0, DEFAULT_TOLERANCE);
        assert_approx_eq!(state.average_bias(), -1.0, DEFAULT_TOLERANCE);
        assert_approx_eq!(ltu.score(ex.view()), -2.0, DEFAULT_TOLERANCE);
    }

    #[test]
    fn late_update_has_small_average_effect() {
        let params = LtuParams { learning_rate: 1.0, ..Default::default() };
        let mut ltu = LinearThresholdUnit::boolean(AveragedPerceptron::new(params)).unwrap();
        let a = Example::binary(vec![0]);
        let b = Example::binary(vec![1]);

        // Three correct positives on `a` (score 0 >= 0), then a mistake on `b`.
        for _ in 0..3 {
            ltu.learn_binary(a.view(), true).unwrap();
        }
        ltu.learn_binary(b.view(), false).unwrap();

        // w1 = -1 only after the 4th example: average -1/4.
        let state = ltu.state();
        assert_approx_eq!(state.weights.averaged_weight(1, 0.0), -0.25, DEFAULT_TOLERANCE);
        assert_approx_eq!(state.average_bias(), -0.25, DEFAULT_TOLERANCE);
    }
}
