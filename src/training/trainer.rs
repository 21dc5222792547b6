//! Multi-pass online training over an in-memory dataset.
//!
//! The trainer encodes every example once, prunes the lexicon if asked,
//! applies the prune permutation to the encoded examples and then replays
//! them pass after pass. Each example is classified before it is learned, so
//! the per-pass mistake count is the usual online error.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::Example;
use crate::feature::Feature;
use crate::training::{
    EarlyStopAction, EarlyStopping, Learner, LearnerError, PassStats, TrainerConfig,
    TrainingLogger, TrainingSession,
};

// ============================================================================
// Inputs and outputs
// ============================================================================

/// One raw training example.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledExample {
    pub features: Vec<(Feature, f64)>,
    pub label: String,
}

impl LabeledExample {
    pub fn new(features: Vec<(Feature, f64)>, label: impl Into<String>) -> Self {
        Self {
            features,
            label: label.into(),
        }
    }
}

/// Summary of a [`OnlineTrainer::train`] run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    /// Statistics of every pass that ran, in order.
    pub passes: Vec<PassStats>,
    /// Permutation returned by the lexicon prune, if one happened.
    pub permutation: Option<Vec<usize>>,
    /// Early stopping fired; the learner was rolled back to its best pass.
    pub stopped_early: bool,
    /// A pass finished without mistakes and `stop_on_converge` was set.
    pub converged: bool,
}

impl TrainingReport {
    pub fn final_pass(&self) -> Option<&PassStats> {
        self.passes.last()
    }
}

// ============================================================================
// OnlineTrainer
// ============================================================================

/// Runs [`TrainerConfig`] against a [`TrainingSession`].
///
/// ```
/// use perceptrons::feature::Feature;
/// use perceptrons::training::rules::{Perceptron, SparsePerceptron};
/// use perceptrons::training::{LabeledExample, OnlineTrainer, TrainerConfig, TrainingSession};
///
/// let word = |w: &str| (Feature::discrete("doc", "word", w, "true"), 1.0);
/// let data = vec![
///     LabeledExample::new(vec![word("great")], "pos"),
///     LabeledExample::new(vec![word("awful")], "neg"),
/// ];
///
/// let learner = SparsePerceptron::new(Perceptron::default(), &["neg", "pos"]).unwrap();
/// let mut session = TrainingSession::new(learner);
/// let config = TrainerConfig::builder().n_passes(5).build().unwrap();
/// let report = OnlineTrainer::new(config).train(&mut session, &data).unwrap();
///
/// assert_eq!(report.final_pass().unwrap().mistakes, 0);
/// assert_eq!(session.classify(&[word("great")]).unwrap(), "pos");
/// ```
#[derive(Debug, Clone)]
pub struct OnlineTrainer {
    config: TrainerConfig,
}

impl OnlineTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train `session` on `data`.
    ///
    /// # Errors
    ///
    /// Configuration errors are reported before the session is touched.
    /// Learner and lexicon errors abort the run and leave the session in the
    /// state reached so far.
    pub fn train<L: Learner>(
        &self,
        session: &mut TrainingSession<L>,
        data: &[LabeledExample],
    ) -> Result<TrainingReport, LearnerError> {
        self.config.validate()?;
        let config = &self.config;
        let n_passes = config.n_passes as usize;

        let mut logger = TrainingLogger::new(config.verbosity);
        logger.start_training(n_passes);
        let mut report = TrainingReport::default();

        // Encode once; the lexicon only grows here.
        session.lexicon_mut().count_features(config.count_policy);
        let mut encoded: Vec<(Example, usize)> = Vec::with_capacity(data.len());
        for item in data {
            let label = session.learner_mut().add_label(&item.label)?;
            let example = session.encode_training(&item.features, label)?;
            encoded.push((example, label));
        }

        let before = session.lexicon().len();
        if let Some(permutation) = session.prune(&config.pruning)? {
            let cutoff = session.lexicon().cutoff();
            for (example, _) in &mut encoded {
                example.apply_permutation(&permutation, cutoff);
            }
            logger.log_pruning(before, cutoff);
            report.permutation = Some(permutation);
        }
        if config.discard_pruned {
            session.discard_pruned();
        }

        if encoded.is_empty() {
            logger.warn("no training examples");
            session.finish_training();
            logger.finish_training();
            return Ok(report);
        }

        let mut order: Vec<usize> = (0..encoded.len()).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
        let mut early_stopping = EarlyStopping::new(config.early_stopping_rounds as usize);
        let mut best_learner: Option<L> = None;

        for pass in 0..n_passes {
            if config.shuffle {
                order.shuffle(&mut rng);
            }

            let mut stats = PassStats {
                pass,
                examples: encoded.len(),
                mistakes: 0,
                updates: 0,
            };
            for &i in &order {
                let (example, label) = &encoded[i];
                if session.learner().classify(example.view()) != *label {
                    stats.mistakes += 1;
                }
                if session.learn_encoded(example, *label)? {
                    stats.updates += 1;
                }
            }
            logger.log_round(&stats);
            report.passes.push(stats);

            if config.stop_on_converge && stats.mistakes == 0 {
                logger.log_converged(pass);
                report.converged = true;
                break;
            }

            if early_stopping.is_enabled() {
                match early_stopping.update(stats.mistakes) {
                    EarlyStopAction::Improved => {
                        best_learner = Some(session.learner().deep_clone());
                    }
                    EarlyStopAction::Stop => {
                        logger.log_early_stopping(pass, early_stopping.best_round());
                        report.stopped_early = true;
                        break;
                    }
                    EarlyStopAction::Continue => {}
                }
            }
        }

        if report.stopped_early {
            if let Some(best) = best_learner {
                *session.learner_mut() = best;
            }
        }

        session.finish_training();
        logger.finish_training();
        Ok(report)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::{CountPolicy, PruningPolicy};
    use crate::training::rules::{Perceptron, SparsePerceptron};
    use crate::training::ConfigError;

    fn word(w: &str) -> (Feature, f64) {
        (Feature::discrete("doc", "word", w, "true"), 1.0)
    }

    fn session() -> TrainingSession<SparsePerceptron> {
        TrainingSession::new(SparsePerceptron::new(Perceptron::default(), &["neg", "pos"]).unwrap())
    }

    fn toy_data() -> Vec<LabeledExample> {
        vec![
            LabeledExample::new(vec![word("good"), word("fun")], "pos"),
            LabeledExample::new(vec![word("bad"), word("dull")], "neg"),
            LabeledExample::new(vec![word("good"), word("fine")], "pos"),
            LabeledExample::new(vec![word("bad"), word("boring")], "neg"),
        ]
    }

    #[test]
    fn converges_and_stops() {
        let config = TrainerConfig::builder()
            .n_passes(20)
            .stop_on_converge(true)
            .build()
            .unwrap();
        let mut session = session();
        let report = OnlineTrainer::new(config).train(&mut session, &toy_data()).unwrap();

        assert!(report.converged);
        assert!(report.passes.len() < 20);
        assert_eq!(report.final_pass().unwrap().mistakes, 0);
        for item in toy_data() {
            assert_eq!(session.classify(&item.features).unwrap(), item.label);
        }
    }

    #[test]
    fn runs_every_pass_without_stopping_rules() {
        let config = TrainerConfig::builder().n_passes(4).build().unwrap();
        let report = OnlineTrainer::new(config).train(&mut session(), &toy_data()).unwrap();
        assert_eq!(report.passes.len(), 4);
        assert!(!report.converged);
        assert!(!report.stopped_early);
    }

    #[test]
    fn shuffle_is_seeded() {
        let config = TrainerConfig::builder()
            .n_passes(3)
            .shuffle(true)
            .seed(7)
            .build()
            .unwrap();
        let trainer = OnlineTrainer::new(config);
        let (mut a, mut b) = (session(), session());
        let ra = trainer.train(&mut a, &toy_data()).unwrap();
        let rb = trainer.train(&mut b, &toy_data()).unwrap();
        assert_eq!(ra, rb);
        assert_eq!(a.learner(), b.learner());
    }

    #[test]
    fn early_stopping_on_flat_mistakes() {
        // Contradictory labels keep the mistake count from ever reaching zero.
        let data = vec![
            LabeledExample::new(vec![word("same")], "pos"),
            LabeledExample::new(vec![word("same")], "neg"),
        ];
        let config = TrainerConfig::builder()
            .n_passes(50)
            .early_stopping_rounds(2)
            .build()
            .unwrap();
        let report = OnlineTrainer::new(config).train(&mut session(), &data).unwrap();
        assert!(report.stopped_early);
        assert!(report.passes.len() < 50);
    }

    #[test]
    fn pruning_remaps_encoded_examples() {
        let config = TrainerConfig::builder()
            .n_passes(5)
            .count_policy(CountPolicy::Global)
            .pruning(PruningPolicy::Absolute(2))
            .discard_pruned(true)
            .build()
            .unwrap();
        let mut session = session();
        let report = OnlineTrainer::new(config).train(&mut session, &toy_data()).unwrap();

        // Only "good" and "bad" occur twice.
        let permutation = report.permutation.unwrap();
        assert_eq!(permutation.len(), 6);
        assert_eq!(session.lexicon().len(), 2);
        assert_eq!(session.classify(&[word("good")]).unwrap(), "pos");
        assert_eq!(session.classify(&[word("bad")]).unwrap(), "neg");
    }

    #[test]
    fn invalid_config_touches_nothing() {
        let config = TrainerConfig { n_passes: 0, ..Default::default() };
        let mut session = session();
        let err = OnlineTrainer::new(config).train(&mut session, &toy_data()).unwrap_err();
        assert_eq!(err, LearnerError::Config(ConfigError::InvalidNPasses));
        assert!(session.lexicon().is_empty());
    }

    #[test]
    fn empty_data() {
        let report = OnlineTrainer::new(TrainerConfig::default())
            .train(&mut session(), &[])
            .unwrap();
        assert!(report.passes.is_empty());
    }
}
