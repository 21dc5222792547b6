//! Early stopping for multi-pass training.
//!
//! Tracks the mistake count of each pass and signals when it has not
//! decreased for a patience window.

/// What the trainer should do after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyStopAction {
    /// The value improved on the best seen so far.
    Improved,
    /// No improvement, still within patience.
    Continue,
    /// Patience exhausted.
    Stop,
}

/// Early stopping on the per-pass mistake count.
///
/// A patience of zero disables early stopping entirely.
///
/// ```
/// use perceptrons::training::{EarlyStopAction, EarlyStopping};
///
/// let mut early_stop = EarlyStopping::new(2);
/// assert_eq!(early_stop.update(5), EarlyStopAction::Improved);
/// assert_eq!(early_stop.update(5), EarlyStopAction::Continue);
/// assert_eq!(early_stop.update(6), EarlyStopAction::Stop);
/// ```
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best_mistakes: Option<usize>,
    best_round: usize,
    current_round: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best_mistakes: None,
            best_round: 0,
            current_round: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.patience > 0
    }

    /// Record the mistake count of the pass just finished.
    pub fn update(&mut self, mistakes: usize) -> EarlyStopAction {
        let is_improvement = self.best_mistakes.map_or(true, |best| mistakes < best);

        let round = self.current_round;
        self.current_round += 1;

        if is_improvement {
            self.best_mistakes = Some(mistakes);
            self.best_round = round;
            return EarlyStopAction::Improved;
        }

        if self.is_enabled() && self.current_round - self.best_round > self.patience {
            EarlyStopAction::Stop
        } else {
            EarlyStopAction::Continue
        }
    }

    pub fn best_round(&self) -> usize {
        self.best_round
    }
}
