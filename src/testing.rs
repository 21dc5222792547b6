//! Testing utilities for perceptrons.
//!
//! Assertion helpers and small fixtures shared by unit tests and the
//! integration tests under `tests/`.
//!
//! ```ignore
//! use perceptrons::testing::{assert_scores_eq, DEFAULT_TOLERANCE};
//! ```

use approx::AbsDiffEq;

use crate::feature::Feature;
use crate::training::LabeledExample;

// =============================================================================
// Constants
// =============================================================================

/// Default tolerance for floating point comparisons of O(1) scores.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

// =============================================================================
// Floating Point Assertions
// =============================================================================

/// Assert that two f64 values are approximately equal.
///
/// # Examples
///
/// ```
/// # use perceptrons::assert_approx_eq;
/// assert_approx_eq!(1.0, 1.0001, 0.001);
/// ```
///
/// # Panics
///
/// Panics if the absolute difference exceeds tolerance.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left_val: f64 = $left;
        let right_val: f64 = $right;
        let tol: f64 = $tolerance;
        let diff = (left_val - right_val).abs();
        if !(diff <= tol) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`\n right: `{:?}`\n  diff: `{:?}` > tolerance `{:?}`",
                left_val, right_val, diff, tol
            );
        }
    }};
    ($left:expr, $right:expr, $tolerance:expr, $($arg:tt)+) => {{
        let left_val: f64 = $left;
        let right_val: f64 = $right;
        let tol: f64 = $tolerance;
        let diff = (left_val - right_val).abs();
        if !(diff <= tol) {
            panic!(
                "assertion failed: `(left ≈ right)` - {}\n  left: `{:?}`\n right: `{:?}`\n  diff: `{:?}` > tolerance `{:?}`",
                format_args!($($arg)+), left_val, right_val, diff, tol
            );
        }
    }};
}

/// Assert that two slices are approximately equal element-wise.
///
/// # Panics
///
/// Panics if lengths differ or any element differs by more than tolerance.
pub fn assert_slice_approx_eq(actual: &[f64], expected: &[f64], tolerance: f64, context: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{context}: length mismatch - got {}, expected {}",
        actual.len(),
        expected.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            a.abs_diff_eq(e, tolerance),
            "{context}[{i}]: {a} ≠ {e} (diff={}, tolerance={tolerance})",
            (a - e).abs()
        );
    }
}

/// Render differing rows git-style: `-` for expected, `+` for actual.
fn diff_scores(actual: &[Vec<f64>], expected: &[Vec<f64>], epsilon: f64) -> String {
    let mut result = format!("Epsilon: {epsilon:.0e}\n\n");
    for (i, (act_row, exp_row)) in actual.iter().zip(expected.iter()).enumerate() {
        let differs = act_row.len() != exp_row.len()
            || act_row.iter().zip(exp_row).any(|(a, e)| !a.abs_diff_eq(e, epsilon));
        if !differs {
            continue;
        }
        result.push_str(&format!("[{i:3}] -"));
        for val in exp_row {
            result.push_str(&format!(" {val:>12.6}"));
        }
        result.push_str("  (expected)\n      +");
        for val in act_row {
            result.push_str(&format!(" {val:>12.6}"));
        }
        result.push_str("  (actual)\n");
    }
    result
}

/// Assert that per-example score rows match.
///
/// # Panics
///
/// Panics if row counts differ or any score differs by more than `epsilon`,
/// showing a diff of the differing rows.
pub fn assert_scores_eq(actual: &[Vec<f64>], expected: &[Vec<f64>], epsilon: f64, context: &str) {
    if actual.len() != expected.len() {
        panic!(
            "\n{context}: row count mismatch\n- {}  (expected)\n+ {}  (actual)\n",
            expected.len(),
            actual.len()
        );
    }
    let diff_count = actual
        .iter()
        .zip(expected)
        .filter(|(a, e)| a.len() != e.len() || a.iter().zip(e.iter()).any(|(x, y)| !x.abs_diff_eq(y, epsilon)))
        .count();
    if diff_count > 0 {
        let diff_output = diff_scores(actual, expected, epsilon);
        panic!("\n{context}: {diff_count}/{} rows differ\n\n{diff_output}", actual.len());
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Discrete `test.word` feature with value `w`.
pub fn word(w: &str) -> Feature {
    Feature::discrete("test", "word", "", w)
}

/// Boolean examples whose label is decided by a single indicator word:
/// `"pos"` examples contain `"good"` and `"neg"` examples contain `"bad"`.
/// Each example has two active features.
pub fn separable_examples() -> Vec<LabeledExample> {
    [
        (["good", "movie"], "pos"),
        (["bad", "movie"], "neg"),
        (["good", "plot"], "pos"),
        (["bad", "plot"], "neg"),
    ]
    .into_iter()
    .map(|(words, label)| {
        let features = words.iter().map(|w| (word(w), 1.0)).collect();
        LabeledExample::new(features, label)
    })
    .collect()
}
