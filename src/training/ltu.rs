//! Linear threshold unit engine.
//!
//! A [`LinearThresholdUnit`] owns a weight state and an [`UpdateRule`]. Per
//! example the engine:
//!
//! 1. scores the example with the training weights,
//! 2. evaluates the rule's `should_promote` / `should_demote` predicates,
//!    which are independent and may both fire,
//! 3. asks the rule for a learning rate and skips the update if it is not
//!    positive,
//! 4. lets the rule apply `promote` and/or `demote` to the state.
//!
//! The rule is the only code that touches weights. A rejected learning rate
//! leaves the state untouched.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::learner::{check_example, check_label, Learner, LearnerKind};
use super::{ConfigError, LearnerError};
use crate::data::ExampleView;
use crate::repr::SparseWeightVector;

// =============================================================================
// Parameters
// =============================================================================

/// Parameters shared by every linear threshold unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LtuParams {
    /// Step size for additive rules, promotion factor for Winnow. Default: 0.1.
    pub learning_rate: f64,
    /// Decision threshold. Default: 0.
    pub threshold: f64,
    /// Margin above the threshold within which positives still promote. Default: 0.
    pub positive_thickness: f64,
    /// Margin below the threshold within which negatives still demote. Default: 0.
    pub negative_thickness: f64,
    /// Value of unseen weights and of the initial bias. Default: 0.
    pub initial_weight: f64,
}

impl Default for LtuParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            threshold: 0.0,
            positive_thickness: 0.0,
            negative_thickness: 0.0,
            initial_weight: 0.0,
        }
    }
}

impl LtuParams {
    /// Set both thicknesses.
    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.positive_thickness = thickness;
        self.negative_thickness = thickness;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.learning_rate > 0.0) || !self.learning_rate.is_finite() {
            return Err(ConfigError::InvalidLearningRate(self.learning_rate));
        }
        for (field, value) in [
            ("positive_thickness", self.positive_thickness),
            ("negative_thickness", self.negative_thickness),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::InvalidThickness { field, value });
            }
        }
        for (field, value) in [
            ("threshold", self.threshold),
            ("initial_weight", self.initial_weight),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidParameter { field, value });
            }
        }
        Ok(())
    }
}

// =============================================================================
// State
// =============================================================================

/// Weight state owned by a linear threshold unit.
pub trait RuleState: Clone + Debug + PartialEq + Serialize + DeserializeOwned {
    fn remap(&mut self, permutation: &[usize]);

    fn truncate(&mut self, len: usize);

    fn num_weights(&self) -> usize;
}

/// Weights plus a bias, with unseen weights reading as `default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearState {
    pub weights: SparseWeightVector,
    pub bias: f64,
    pub default: f64,
}

impl LinearState {
    /// Empty weights; the bias starts at the initial weight.
    pub fn new(initial_weight: f64) -> Self {
        Self {
            weights: SparseWeightVector::new(),
            bias: initial_weight,
            default: initial_weight,
        }
    }

    #[inline]
    pub fn dot(&self, example: ExampleView<'_>) -> f64 {
        self.weights.dot(example, self.default) + self.bias
    }

    /// `w += factor·x`, `bias += factor`.
    pub fn scaled_add(&mut self, example: ExampleView<'_>, factor: f64) {
        self.weights.scaled_add(example, factor, self.default);
        self.bias += factor;
    }

    /// `w *= factor^x`, `bias *= factor`.
    pub fn scaled_multiply(&mut self, example: ExampleView<'_>, factor: f64) {
        self.weights.scaled_multiply(example, factor, self.default);
        self.bias *= factor;
    }
}

impl RuleState for LinearState {
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

// =============================================================================
// Update rule
// =============================================================================

/// What a single `learn` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    pub promoted: bool,
    pub demoted: bool,
}

impl UpdateOutcome {
    pub fn updated(&self) -> bool {
        self.promoted || self.demoted
    }
}

/// Strategy for one linear threshold algorithm.
///
/// Rules are immutable configuration; every mutation goes through the
/// `State` they are handed.
pub trait UpdateRule: Clone + Debug + PartialEq + Serialize + DeserializeOwned {
    type State: RuleState;

    const KIND: LearnerKind;

    fn params(&self) -> &LtuParams;

    fn validate(&self) -> Result<(), ConfigError> {
        self.params().validate()
    }

    fn initial_state(&self) -> Self::State;

    /// Score used for training decisions.
    fn training_score(&self, state: &Self::State, example: ExampleView<'_>) -> f64;

    /// Score used for prediction. Defaults to the training score.
    fn score(&self, state: &Self::State, example: ExampleView<'_>) -> f64 {
        self.training_score(state, example)
    }

    fn should_promote(&self, label: bool, score: f64) -> bool {
        let p = self.params();
        label && score < p.threshold + p.positive_thickness
    }

    fn should_demote(&self, label: bool, score: f64) -> bool {
        let p = self.params();
        !label && score >= p.threshold - p.negative_thickness
    }

    /// Step size for this example. A non-positive rate skips the update.
    fn learning_rate(
        &self,
        _state: &Self::State,
        _example: ExampleView<'_>,
        _label: bool,
        _score: f64,
    ) -> Result<f64, LearnerError> {
        Ok(self.params().learning_rate)
    }

    fn promote(&self, state: &mut Self::State, example: ExampleView<'_>, rate: f64);

    fn demote(&self, state: &mut Self::State, example: ExampleView<'_>, rate: f64);

    /// Called for an example that caused no update.
    fn observe_unchanged(&self, _state: &mut Self::State) {}

    fn learn(
        &self,
        state: &mut Self::State,
        example: ExampleView<'_>,
        label: bool,
    ) -> Result<UpdateOutcome, LearnerError> {
        learn_step(self, state, example, label)
    }
}

/// The default per-example transition shared by all rules.
pub fn learn_step<R: UpdateRule>(
    rule: &R,
    state: &mut R::State,
    example: ExampleView<'_>,
    label: bool,
) -> Result<UpdateOutcome, LearnerError> {
    let score = rule.training_score(state, example);
    let promote = rule.should_promote(label, score);
    let demote = rule.should_demote(label, score);

    if !promote && !demote {
        rule.observe_unchanged(state);
        return Ok(UpdateOutcome::default());
    }

    let rate = rule.learning_rate(state, example, label, score)?;
    if !rate.is_finite() {
        return Err(LearnerError::Domain { what: "learning rate", value: rate });
    }
    if rate <= 0.0 {
        rule.observe_unchanged(state);
        return Ok(UpdateOutcome::default());
    }

    if promote {
        rule.promote(state, example, rate);
    }
    if demote {
        rule.demote(state, example, rate);
    }
    Ok(UpdateOutcome { promoted: promote, demoted: demote })
}

// =============================================================================
// LinearThresholdUnit
// =============================================================================

/// Lifecycle of a learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Untrained,
    Training,
    Trained,
}

/// Binary classifier: label index 1 is the positive class.
///
/// Scores are `[-(s - θ), s - θ]`; the positive label wins when `s ≥ θ`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct LinearThresholdUnit<R: UpdateRule> {
    rule: R,
    state: R::State,
    labels: [String; 2],
    phase: Phase,
}

impl<R: UpdateRule> LinearThresholdUnit<R> {
    /// Create an untrained unit over `labels`, which must have two values.
    pub fn new(rule: R, labels: &[&str]) -> Result<Self, LearnerError> {
        rule.validate()?;
        let [negative, positive] = labels else {
            return Err(LearnerError::NonBinaryLabels(labels.len()));
        };
        let state = rule.initial_state();
        Ok(Self {
            rule,
            state,
            labels: [negative.to_string(), positive.to_string()],
            phase: Phase::Untrained,
        })
    }

    /// Create an untrained unit over `["false", "true"]`.
    pub fn boolean(rule: R) -> Result<Self, LearnerError> {
        Self::new(rule, &["false", "true"])
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }

    pub fn state(&self) -> &R::State {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn threshold(&self) -> f64 {
        self.rule.params().threshold
    }

    /// Train on one example with a boolean label.
    pub fn learn_binary(&mut self, example: ExampleView<'_>, label: bool) -> Result<UpdateOutcome, LearnerError> {
        check_example(example)?;
        self.phase = Phase::Training;
        self.rule.learn(&mut self.state, example, label)
    }

    /// Raw prediction score `s`, compared against the threshold.
    pub fn score(&self, example: ExampleView<'_>) -> f64 {
        self.rule.score(&self.state, example)
    }

    pub fn predict(&self, example: ExampleView<'_>) -> bool {
        self.score(example) >= self.threshold()
    }
}

impl<R: UpdateRule> Learner for LinearThresholdUnit<R> {
    fn kind(&self) -> LearnerKind {
        R::KIND
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn learn(&mut self, example: ExampleView<'_>, label: usize) -> Result<bool, LearnerError> {
        check_label(label, 2)?;
        Ok(self.learn_binary(example, label == 1)?.updated())
    }

    fn scores(&self, example: ExampleView<'_>) -> Vec<f64> {
        let s = self.score(example) - self.threshold();
        vec![-s, s]
    }

    fn classify(&self, example: ExampleView<'_>) -> usize {
        usize::from(self.predict(example))
    }

    fn forget(&mut self) {
        self.state = self.rule.initial_state();
        self.phase = Phase::Untrained;
    }

    fn finish_training(&mut self) {
        self.phase = Phase::Trained;
    }

    fn remap(&mut self, permutation: &[usize]) {
        self.state.remap(permutation);
    }

    fn truncate(&mut self, len: usize) {
        self.state.truncate(len);
    }

    fn num_weights(&self) -> usize {
        self.state.num_weights()
    }
}

// =============================================================================
// Tests
// =============================================================================
