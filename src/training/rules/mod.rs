//! Concrete update rules for [`LinearThresholdUnit`](super::LinearThresholdUnit).
//!
//! | Rule | Update | Learner alias |
//! |------|--------|---------------|
//! | [`Perceptron`] | additive, fixed rate | [`SparsePerceptron`] |
//! | [`AveragedPerceptron`] | additive, averaged for prediction | [`SparseAveragedPerceptron`] |
//! | [`Winnow`] | multiplicative | [`SparseWinnow`] |
//! | [`BinaryMira`] | additive, closed-form step | [`SparseBinaryMira`] |
//! | [`PassiveAggressive`] | additive, hinge-loss step | [`SparsePassiveAggressive`] |
//! | [`ConfidenceWeighted`] | joint mean and variance | [`SparseConfidenceWeighted`] |

mod averaged;
mod confidence_weighted;
mod mira;
mod passive_aggressive;
mod perceptron;
mod winnow;

pub use averaged::{AveragedPerceptron, AveragedState};
pub use confidence_weighted::{ConfidenceWeighted, CwState};
pub use mira::BinaryMira;
pub use passive_aggressive::PassiveAggressive;
pub use perceptron::Perceptron;
pub use winnow::Winnow;

use super::LinearThresholdUnit;

pub type SparsePerceptron = LinearThresholdUnit<Perceptron>;
pub type SparseAveragedPerceptron = LinearThresholdUnit<AveragedPerceptron>;
pub type SparseWinnow = LinearThresholdUnit<Winnow>;
pub type SparseBinaryMira = LinearThresholdUnit<BinaryMira>;
pub type SparsePassiveAggressive = LinearThresholdUnit<PassiveAggressive>;
pub type SparseConfidenceWeighted = LinearThresholdUnit<ConfidenceWeighted>;

/// `+1` for the positive label, `-1` otherwise.
#[inline]
pub(crate) fn sign(label: bool) -> f64 {
    if label {
        1.0
    } else {
        -1.0
    }
}
