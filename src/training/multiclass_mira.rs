//! Multiclass MIRA over one biased weight vector per label.
//!
//! For an example `x` with label `l`, the update solves
//!
//! ```text
//! minimize  Σ_i ‖w_i' − w_i‖²   s.t.  w_l'·x − w_i'·x ≥ δ_il
//! ```
//!
//! in closed form: each vector moves by `τ_i·x` with
//! `τ_i = min(θ − (s_i − δ_il), δ_il)`, where `s_i = w_i·x / (‖x‖² + 1)` and
//! `θ` is found by bisection so that `Σ τ_i = 0`. An example the true label
//! already wins by a normalized margin of 1 leaves every vector unchanged.

use serde::{Deserialize, Serialize};

use super::learner::{check_example, check_label, Learner, LearnerKind};
use super::ltu::Phase;
use super::LearnerError;
use crate::data::ExampleView;
use crate::repr::{BiasedWeightVector, WeightInit};

/// Bisection stops once the bracket is narrower than this, relative to the
/// larger of its endpoints and 1; smaller multipliers are not applied.
const TOLERANCE: f64 = 1e-9;

/// The relative bracket starts at most 2 wide, so this is never reached
/// unless the endpoints are not finite.
const MAX_BISECTIONS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MulticlassMira {
    init: WeightInit,
    labels: Vec<String>,
    vectors: Vec<BiasedWeightVector>,
    phase: Phase,
}

impl Default for MulticlassMira {
    fn default() -> Self {
        Self::new(WeightInit::default())
    }
}

impl MulticlassMira {
    /// Empty learner; labels are added as they are seen.
    pub fn new(init: WeightInit) -> Self {
        Self {
            init,
            labels: Vec::new(),
            vectors: Vec::new(),
            phase: Phase::Untrained,
        }
    }

    pub fn with_labels(init: WeightInit, labels: &[&str]) -> Self {
        let mut mira = Self::new(init);
        for label in labels {
            mira.push_label(label);
        }
        mira
    }

    pub fn init(&self) -> WeightInit {
        self.init
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn vector(&self, label: usize) -> Option<&BiasedWeightVector> {
        self.vectors.get(label)
    }

    fn push_label(&mut self, value: &str) -> usize {
        let index = self.vectors.len();
        self.labels.push(value.to_string());
        self.vectors
            .push(BiasedWeightVector::new(self.init.reseeded(index as u64)));
        index
    }

    /// Find `θ` with `Σ_i min(θ − d_i, δ_i) = 0`.
    fn solve_theta(scores: &[f64], label: usize) -> f64 {
        let delta = |i: usize| if i == label { 1.0 } else { 0.0 };
        let mut lo = scores.iter().copied().fold(f64::INFINITY, f64::min) - 1.0;
        let mut hi = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max) + 1.0;

        for _ in 0..MAX_BISECTIONS {
            let scale = lo.abs().max(hi.abs()).max(1.0);
            if hi - lo < TOLERANCE * scale {
                break;
            }
            let mid = lo + (hi - lo) / 2.0;
            if mid <= lo || mid >= hi {
                // Adjacent floats: the bracket cannot shrink further.
                break;
            }
            let total: f64 = scores
                .iter()
                .enumerate()
                .map(|(i, &s)| (mid - s).min(delta(i)))
                .sum();
            if total <= 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

impl Learner for MulticlassMira {
    fn kind(&self) -> LearnerKind {
        LearnerKind::MulticlassMira
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn add_label(&mut self, value: &str) -> Result<usize, LearnerError> {
        Ok(match self.label_index(value) {
            Some(index) => index,
            None => self.push_label(value),
        })
    }

    fn learn(&mut self, example: ExampleView<'_>, label: usize) -> Result<bool, LearnerError> {
        check_example(example)?;
        check_label(label, self.vectors.len())?;
        self.phase = Phase::Training;
        if self.vectors.len() == 1 {
            return Ok(false);
        }

        let norm = example.squared_norm() + 1.0;
        let delta = |i: usize| if i == label { 1.0 } else { 0.0 };
        let mut shifted = Vec::with_capacity(self.vectors.len());
        for (i, w) in self.vectors.iter().enumerate() {
            let s = w.dot(example) / norm;
            if !s.is_finite() {
                return Err(LearnerError::Domain { what: "multiclass score", value: s });
            }
            shifted.push(s - delta(i));
        }

        let theta = Self::solve_theta(&shifted, label);
        let mut updated = false;
        for (i, (w, &d)) in self.vectors.iter_mut().zip(&shifted).enumerate() {
            let tau = (theta - d).min(delta(i));
            if tau.abs() >= TOLERANCE {
                w.scaled_add(example, tau);
                updated = true;
            }
        }
        Ok(updated)
    }

    fn scores(&self, example: ExampleView<'_>) -> Vec<f64> {
        self.vectors.iter().map(|w| w.dot(example)).collect()
    }

    /// First label with the highest score; 0 when no labels are known.
    fn classify(&self, example: ExampleView<'_>) -> usize {
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (i, s) in self.scores(example).into_iter().enumerate() {
            if s > best_score {
                best = i;
                best_score = s;
            }
        }
        best
    }

    fn forget(&mut self) {
        for w in &mut self.vectors {
            w.clear();
        }
        self.phase = Phase::Untrained;
    }

    fn finish_training(&mut self) {
        self.phase = Phase::Trained;
    }

    fn remap(&mut self, permutation: &[usize]) {
        for w in &mut self.vectors {
            w.remap(permutation);
        }
    }

    fn truncate(&mut self, len: usize) {
        for w in &mut self.vectors {
            w.truncate(len);
        }
    }

    fn num_weights(&self) -> usize {
        self.vectors
            .iter()
            .map(|w| w.weights().len())
            .max()
            .unwrap_or(0)
    }
}
