//! Rosenblatt perceptron with a thick separator.

use serde::{Deserialize, Serialize};

use crate::data::ExampleView;
use crate::training::learner::LearnerKind;
use crate::training::ltu::{LinearState, LtuParams, UpdateRule};

/// `w += η·x` on promotion, `w -= η·x` on demotion.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Perceptron {
    pub params: LtuParams,
}

impl Perceptron {
    pub fn new(params: LtuParams) -> Self {
        Self { params }
    }
}

impl UpdateRule for Perceptron {
    type State = LinearState;

    const KIND: LearnerKind = LearnerKind::Perceptron;

    fn params(&self) -> &LtuParams {
        &self.params
    }

    fn initial_state(&self) -> LinearState {
        LinearState::new(self.params.initial_weight)
    }

    fn training_score(&self, state: &LinearState, example: ExampleView<'_>) -> f64 {
        state.dot(example)
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
    fn mistake_driven_updates() {
        let mut ltu = LinearThresholdUnit::boolean(Perceptron::default()).unwrap();
        let ex = Example::new(vec![0, 2], vec![1.0, 2.0]);

        // Score 0 is on the threshold: a negative demotes.
        let outcome = ltu.learn_binary(ex.view(), false).unwrap();
        assert!(outcome.demoted && !outcome.promoted);
        assert_eq!(ltu.state().weights.as_slice(), &[-0.1, 0.0, -0.2]);
        assert_eq!(ltu.state().bias, -0.1);

        // Now correctly negative, so another negative is a no-op.
        let before = ltu.state().clone();
        assert!(!ltu.learn_binary(ex.view(), false).unwrap().updated());
        assert_eq!(ltu.state(), &before);
    }

    #[test]
    fn thickness_forces_updates_inside_margin() {
        let params = LtuParams { learning_rate: 1.0, ..Default::default() }.with_thickness(5.0);
        let mut ltu = LinearThresholdUnit::boolean(Perceptron::new(params)).unwrap();
        let ex = Example::binary(vec![0]);
        // Scores 0, 2 and 4 are all inside the margin of 5.
        for _ in 0..3 {
            assert!(ltu.learn_binary(ex.view(), true).unwrap().promoted);
        }
        assert!(!ltu.learn_binary(ex.view(), true).unwrap().promoted);
        assert_eq!(ltu.score(ex.view()), 6.0);
    }

    #[test]
    fn initial_weight_seeds_bias_and_unseen_keys() {
        let params = LtuParams { initial_weight: 0.5, ..Default::default() };
        let ltu = LinearThresholdUnit::boolean(Perceptron::new(params)).unwrap();
        let ex = Example::binary(vec![3, 9]);
        assert_eq!(ltu.score(ex.view()), 1.5);
    }
}
