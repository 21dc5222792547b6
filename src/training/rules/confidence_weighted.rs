//! Confidence-weighted linear classification.
//!
//! Keeps a diagonal Gaussian over the weights: a mean vector plus a
//! per-key precision (inverse variance), with the bias treated as a feature
//! of constant value 1. Each update solves for the smallest step `α` that
//! makes the example correct with probability set by the confidence `φ`:
//!
//! ```text
//! m = y·(w·x + b)            v = Σ x²/p + 1/p_b
//! t = 2φm + 1
//! α = (−t + √(t² − 8φ(m − φv))) / (4φv)
//! ```
//!
//! then `w += αy·Σx`, `b += αy/p_b`, `p += 2αφ·x²`, `p_b += 2αφ`.

use serde::{Deserialize, Serialize};

use super::sign;
use crate::data::ExampleView;
use crate::repr::SparseWeightVector;
use crate::training::learner::LearnerKind;
use crate::training::ltu::{LtuParams, RuleState, UpdateRule};
use crate::training::{ConfigError, LearnerError};

/// Steps below this are treated as zero; `α` only approaches zero asymptotically.
const MIN_STEP: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CwState {
    pub weights: SparseWeightVector,
    pub bias: f64,
    pub precisions: SparseWeightVector,
    pub bias_precision: f64,
    pub default: f64,
    pub default_precision: f64,
}

impl CwState {
    pub fn new(initial_weight: f64, initial_variance: f64) -> Self {
        Self {
            weights: SparseWeightVector::new(),
            bias: initial_weight,
            precisions: SparseWeightVector::new(),
            bias_precision: 1.0 / initial_variance,
            default: initial_weight,
            default_precision: 1.0 / initial_variance,
        }
    }

    fn margin_variance(&self, example: ExampleView<'_>) -> f64 {
        example
            .iter()
            .map(|(k, x)| x * x / self.precisions.get(k, self.default_precision))
            .sum::<f64>()
            + 1.0 / self.bias_precision
    }

    fn update(&mut self, example: ExampleView<'_>, alpha: f64, y: f64, confidence: f64) {
        let sigma_x = self
            .precisions
            .pairwise_multiply(example, self.default_precision, true);
        self.weights.scaled_add(sigma_x.view(), alpha * y, self.default);
        self.bias += alpha * y / self.bias_precision;

        let growth = 2.0 * alpha * confidence;
        for (k, x) in example.iter() {
            let p = self.precisions.get(k, self.default_precision) + growth * x * x;
            self.precisions.set(k, p, self.default_precision);
        }
        self.bias_precision += growth;
    }
}

impl RuleState for CwState {
    fn remap(&mut self, permutation: &[usize]) {
        self.weights.remap(permutation, self.default);
        self.precisions.remap(permutation, self.default_precision);
    }

    fn truncate(&mut self, len: usize) {
        self.weights.truncate(len);
        self.precisions.truncate(len);
    }

    fn num_weights(&self) -> usize {
        self.weights.len().max(self.precisions.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeighted {
    pub params: LtuParams,
    /// `φ`, the confidence parameter. Default: 2.
    pub confidence: f64,
    /// Prior variance of every weight. Default: 1.
    pub initial_variance: f64,
}

impl Default for ConfidenceWeighted {
    fn default() -> Self {
        Self {
            params: LtuParams::default(),
            confidence: 2.0,
            initial_variance: 1.0,
        }
    }
}

impl UpdateRule for ConfidenceWeighted {
    type State = CwState;

    const KIND: LearnerKind = LearnerKind::ConfidenceWeighted;

    fn params(&self) -> &LtuParams {
        &self.params
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.params.validate()?;
        for (field, value) in [
            ("confidence", self.confidence),
            ("initial_variance", self.initial_variance),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::InvalidParameter { field, value });
            }
        }
        Ok(())
    }

    fn initial_state(&self) -> CwState {
        CwState::new(self.params.initial_weight, self.initial_variance)
    }

    fn training_score(&self, state: &CwState, example: ExampleView<'_>) -> f64 {
        state.weights.dot(example, state.default) + state.bias
    }

    fn should_promote(&self, label: bool, _score: f64) -> bool {
        label
    }

    fn should_demote(&self, label: bool, _score: f64) -> bool {
        !label
    }

    /// The closed-form `α`. Non-finite values are reported, not applied.
    fn learning_rate(
        &self,
        state: &CwState,
        example: ExampleView<'_>,
        label: bool,
        score: f64,
    ) -> Result<f64, LearnerError> {
        let phi = self.confidence;
        let m = sign(label) * score;
        let v = state.margin_variance(example);
        let t = 2.0 * phi * m + 1.0;
        let alpha = (-t + (t * t - 8.0 * phi * (m - phi * v)).sqrt()) / (4.0 * phi * v);
        if !alpha.is_finite() {
            return Err(LearnerError::Domain { what: "confidence-weighted step", value: alpha });
        }
        Ok(if alpha < MIN_STEP { 0.0 } else { alpha })
    }

    fn promote(&self, state: &mut CwState, example: ExampleView<'_>, rate: f64) {
        state.update(example, rate, 1.0, self.confidence);
    }

    fn demote(&self, state: &mut CwState, example: ExampleView<'_>, rate: f64) {
        state.update(example, rate, -1.0, self.confidence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Example;
    use crate::training::ltu::LinearThresholdUnit;

    #[test]
    fn first_update_matches_closed_form() {
        let mut ltu = LinearThresholdUnit::boolean(ConfidenceWeighted::default()).unwrap();
        let ex = Example::new(vec![0], vec![1.0]);
        ltu.learn_binary(ex.view(), true).unwrap();

        // m = 0, v = 1 + 1 = 2, t = 1, so alpha = (-1 + sqrt(1 + 8 phi^2 v)) / (4 phi v).
        let (phi, v) = (2.0f64, 2.0f64);
        let alpha = (-1.0 + (1.0f64 + 8.0 * phi * phi * v).sqrt()) / (4.0 * phi * v);
        let state = ltu.state();
        assert!((state.weights.get(0, 0.0) - alpha).abs() < 1e-12);
        assert!((state.bias - alpha).abs() < 1e-12);
        assert!((state.precisions.get(0, 1.0) - (1.0 + 2.0 * alpha * phi)).abs() < 1e-12);
        assert!((state.bias_precision - (1.0 + 2.0 * alpha * phi)).abs() < 1e-12);
    }

    #[test]
    fn precision_grows_with_squared_value() {
        let mut ltu = LinearThresholdUnit::boolean(ConfidenceWeighted::default()).unwrap();
        let ex = Example::new(vec![0], vec![2.0]);
        ltu.learn_binary(ex.view(), true).unwrap();

        // v = 2²/1 + 1 = 5; the weight moves by alpha·x/p, the precision by 2·alpha·phi·x².
        let (phi, v, x) = (2.0f64, 5.0f64, 2.0f64);
        let alpha = (-1.0 + (1.0f64 + 8.0 * phi * phi * v).sqrt()) / (4.0 * phi * v);
        let state = ltu.state();
        assert!((state.weights.get(0, 0.0) - alpha * x).abs() < 1e-12);
        assert!((state.precisions.get(0, 1.0) - (1.0 + 2.0 * alpha * phi * x * x)).abs() < 1e-12);
        assert!((state.bias_precision - (1.0 + 2.0 * alpha * phi)).abs() < 1e-12);
    }

    #[test]
    fn confident_example_is_untouched() {
        let mut ltu = LinearThresholdUnit::boolean(ConfidenceWeighted::default()).unwrap();
        let ex = Example::new(vec![0], vec![1.0]);
        for _ in 0..50 {
            ltu.learn_binary(ex.view(), true).unwrap();
        }
        let before = ltu.state().clone();
        // Once m >= phi * v the step is not positive.
        assert!(!ltu.learn_binary(ex.view(), true).unwrap().updated());
        assert_eq!(ltu.state(), &before);
    }

    #[test]
    fn precision_only_grows() {
        let mut ltu = LinearThresholdUnit::boolean(ConfidenceWeighted::default()).unwrap();
        let a = Example::new(vec![0, 1], vec![1.0, -2.0]);
        let b = Example::new(vec![1, 2], vec![0.5, 1.0]);
        let mut last = 1.0;
        for i in 0..10 {
            ltu.learn_binary(if i % 2 == 0 { a.view() } else { b.view() }, i % 3 == 0).unwrap();
            let p = ltu.state().precisions.get(1, 1.0);
            assert!(p >= last);
            last = p;
        }
    }
}
