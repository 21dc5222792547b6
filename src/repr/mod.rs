//! Weight vector representations.
//!
//! - [`SparseWeightVector`]: plain per-key weights with a per-call default
//! - [`BiasedWeightVector`]: weights plus a bias term, optionally randomly initialized
//! - [`AveragedWeightVector`]: weights plus a lazily reconstructed running average

mod averaged;
mod weights;

pub use averaged::AveragedWeightVector;
pub use weights::{BiasedWeightVector, SparseWeightVector, WeightInit};
