//! Training progress logging.
//!
//! [`TrainingLogger`] turns per-pass statistics into `tracing` events. Output
//! is gated by [`Verbosity`] so silent runs never format anything.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How much a trainer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Verbosity {
    #[default]
    Silent,
    Warning,
    Info,
    Debug,
}

/// Statistics for one pass over the training data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassStats {
    pub pass: usize,
    pub examples: usize,
    pub mistakes: usize,
    pub updates: usize,
}

impl PassStats {
    /// Fraction of examples classified correctly before their update.
    pub fn accuracy(&self) -> f64 {
        if self.examples == 0 {
            return 1.0;
        }
        1.0 - self.mistakes as f64 / self.examples as f64
    }
}

pub struct TrainingLogger {
    verbosity: Verbosity,
    started: Option<Instant>,
    n_passes: usize,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            started: None,
            n_passes: 0,
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn start_training(&mut self, n_passes: usize) {
        self.started = Some(Instant::now());
        self.n_passes = n_passes;
        if self.verbosity >= Verbosity::Info {
            info!(n_passes, "starting training");
        }
    }

    pub fn log_round(&self, stats: &PassStats) {
        if self.verbosity >= Verbosity::Debug {
            debug!(
                pass = stats.pass,
                n_passes = self.n_passes,
                examples = stats.examples,
                mistakes = stats.mistakes,
                updates = stats.updates,
                "pass finished"
            );
        } else if self.verbosity >= Verbosity::Info {
            info!(
                pass = stats.pass,
                mistakes = stats.mistakes,
                accuracy = stats.accuracy(),
                "pass finished"
            );
        }
    }

    pub fn log_pruning(&self, before: usize, cutoff: usize) {
        if self.verbosity >= Verbosity::Info {
            info!(before, cutoff, pruned = before - cutoff.min(before), "pruned lexicon");
        }
    }

    pub fn log_early_stopping(&self, pass: usize, best_pass: usize) {
        if self.verbosity >= Verbosity::Info {
            info!(pass, best_pass, "early stopping: mistakes stopped decreasing");
        }
    }

    pub fn log_converged(&self, pass: usize) {
        if self.verbosity >= Verbosity::Info {
            info!(pass, "converged: no mistakes in a full pass");
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= Verbosity::Warning {
            warn!("{message}");
        }
    }

    pub fn finish_training(&self) {
        if self.verbosity >= Verbosity::Info {
            let elapsed = self.started.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0);
            info!(elapsed_secs = elapsed, "training finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_ordering() {
        assert!(Verbosity::Debug > Verbosity::Info);
        assert!(Verbosity::Info > Verbosity::Warning);
        assert!(Verbosity::Warning > Verbosity::Silent);
    }

    #[test]
    fn accuracy_of_empty_pass_is_one() {
        let stats = PassStats { pass: 0, examples: 0, mistakes: 0, updates: 0 };
        assert_eq!(stats.accuracy(), 1.0);
        let stats = PassStats { pass: 0, examples: 4, mistakes: 1, updates: 1 };
        assert_eq!(stats.accuracy(), 0.75);
    }

    #[test]
    fn logger_runs_under_subscriber() {
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        tracing::subscriber::with_default(subscriber, || {
            let mut logger = TrainingLogger::new(Verbosity::Debug);
            logger.start_training(2);
            logger.log_round(&PassStats { pass: 0, examples: 3, mistakes: 1, updates: 2 });
            logger.log_early_stopping(1, 0);
            logger.finish_training();
        });
    }
}
