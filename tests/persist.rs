//! Persistence round trips for trained sessions.
//!
//! A session is saved as two files, the lexicon and the learner, and must
//! score every input identically after loading.

use rstest::rstest;

use perceptrons::feature::Feature;
use perceptrons::io::{DeserializeError, ModelPayload, NativeCodec, PersistLearner};
use perceptrons::lexicon::{CountPolicy, Lexicon, Mode, PruningPolicy};
use perceptrons::repr::WeightInit;
use perceptrons::testing::{assert_scores_eq, separable_examples, word, DEFAULT_TOLERANCE};
use perceptrons::training::rules::{
    AveragedPerceptron, ConfidenceWeighted, Perceptron, SparseAveragedPerceptron,
    SparseConfidenceWeighted, SparsePerceptron, SparseWinnow, Winnow,
};
use perceptrons::training::{
    Learner, LearnerKind, MulticlassMira, OnlineTrainer, TrainerConfig, TrainingSession,
};

const LABELS: &[&str] = &["neg", "pos"];

fn probes() -> Vec<Vec<(Feature, f64)>> {
    vec![
        vec![(word("good"), 1.0)],
        vec![(word("bad"), 2.0), (word("plot"), 0.5)],
        vec![(word("never-seen"), 1.0)],
        vec![(word("good"), 1.0), (word("bad"), 1.0), (word("movie"), 1.0)],
    ]
}

fn trained<L: Learner>(learner: L) -> TrainingSession<L> {
    let config = TrainerConfig::builder()
        .n_passes(5)
        .count_policy(CountPolicy::Global)
        .build()
        .unwrap();
    let mut session = TrainingSession::new(learner);
    OnlineTrainer::new(config).train(&mut session, &separable_examples()).unwrap();
    session
}

fn save_and_load<L: PersistLearner>(session: &TrainingSession<L>) -> TrainingSession<L> {
    let codec = NativeCodec::new();
    let lexicon_bytes = codec.serialize_lexicon(session.lexicon()).unwrap();
    let learner_bytes = codec.serialize_learner(session.learner()).unwrap();

    let lexicon = codec.deserialize_lexicon(&lexicon_bytes).unwrap();
    let learner: L = codec.deserialize_learner(&learner_bytes).unwrap();
    TrainingSession::with_lexicon(lexicon, learner)
}

fn assert_same_scores<L: Learner>(actual: &TrainingSession<L>, expected: &TrainingSession<L>) {
    let score_all = |s: &TrainingSession<L>| probes().iter().map(|p| s.scores(p)).collect::<Vec<_>>();
    assert_scores_eq(&score_all(actual), &score_all(expected), DEFAULT_TOLERANCE, "reloaded session");
}

fn roundtrip<L: PersistLearner + PartialEq>(learner: L) {
    let session = trained(learner);
    let loaded = save_and_load(&session);
    assert_eq!(loaded.lexicon(), session.lexicon());
    assert_eq!(loaded.learner(), session.learner());
    assert_same_scores(&loaded, &session);
}

// =============================================================================
// Round trips
// =============================================================================

#[rstest]
#[case::perceptron(LearnerKind::Perceptron)]
#[case::averaged_perceptron(LearnerKind::AveragedPerceptron)]
#[case::winnow(LearnerKind::Winnow)]
#[case::confidence_weighted(LearnerKind::ConfidenceWeighted)]
#[case::multiclass_mira(LearnerKind::MulticlassMira)]
fn trained_session_roundtrip(#[case] kind: LearnerKind) {
    match kind {
        LearnerKind::Perceptron => {
            roundtrip(SparsePerceptron::new(Perceptron::default(), LABELS).unwrap())
        }
        LearnerKind::AveragedPerceptron => {
            roundtrip(SparseAveragedPerceptron::new(AveragedPerceptron::default(), LABELS).unwrap())
        }
        LearnerKind::Winnow => roundtrip(SparseWinnow::new(Winnow::new(2.0, 4.0), LABELS).unwrap()),
        LearnerKind::ConfidenceWeighted => {
            roundtrip(SparseConfidenceWeighted::new(ConfidenceWeighted::default(), LABELS).unwrap())
        }
        LearnerKind::MulticlassMira => {
            roundtrip(MulticlassMira::new(WeightInit::Gaussian { stddev: 0.1, seed: 11 }))
        }
        other => unreachable!("no case for {other:?}"),
    }
}

#[test]
fn pruned_session_roundtrip_keeps_cutoff_and_counts() {
    let mut session = trained(SparsePerceptron::new(Perceptron::default(), LABELS).unwrap());
    session.learn(&[(word("good"), 1.0), (word("rare"), 1.0)], "pos").unwrap();
    session.prune(&PruningPolicy::Absolute(2)).unwrap();
    let rare = session.lexicon().key_of(&word("rare")).unwrap();
    assert!(rare >= session.lexicon().cutoff());

    let loaded = save_and_load(&session);
    assert_eq!(loaded.lexicon().prune_cutoff(), session.lexicon().prune_cutoff());
    for (key, _) in session.lexicon().iter() {
        assert_eq!(loaded.lexicon().count(key), session.lexicon().count(key));
    }
    assert_same_scores(&loaded, &session);
}

#[test]
fn compound_features_survive_roundtrip() {
    let bigram = |a: &str, b: &str| Feature::conjunction("test", "bigram", word(a), word(b));
    let mut lexicon = Lexicon::new();
    lexicon.count_features(CountPolicy::Global);
    let raw = vec![(bigram("good", "movie"), 1.0), (bigram("bad", "movie"), 1.0), (word("movie"), 1.0)];
    lexicon.encode(&raw, Mode::Training, None).unwrap();

    let codec = NativeCodec::new();
    let loaded = codec
        .deserialize_lexicon(&codec.serialize_lexicon(&lexicon).unwrap())
        .unwrap();
    assert_eq!(loaded.len(), 3);
    for (key, feature) in lexicon.iter() {
        assert_eq!(loaded.key_of(feature), Some(key));
    }
    let children = loaded.children().unwrap();
    assert!(children.contains(&word("good")));
    assert!(!children.contains(&word("movie")));
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn flipped_byte_is_detected() {
    let session = trained(SparsePerceptron::new(Perceptron::default(), LABELS).unwrap());
    let codec = NativeCodec::new();
    let mut bytes = codec.serialize_learner(session.learner()).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    assert!(matches!(
        codec.deserialize_learner::<SparsePerceptron>(&bytes),
        Err(DeserializeError::ChecksumMismatch { .. })
    ));
}

#[test]
fn truncated_file_is_detected() {
    let codec = NativeCodec::new();
    let lexicon = trained(SparsePerceptron::new(Perceptron::default(), LABELS).unwrap())
        .into_parts()
        .0;
    let bytes = codec.serialize_lexicon(&lexicon).unwrap();
    assert!(matches!(
        codec.deserialize_lexicon(&bytes[..bytes.len() - 3]),
        Err(DeserializeError::Truncated { .. })
    ));
}

#[test]
fn lexicon_file_is_not_a_learner() {
    let codec = NativeCodec::new();
    let bytes = codec.serialize_lexicon(&Lexicon::new()).unwrap();
    assert!(matches!(
        codec.deserialize_any_learner(&bytes),
        Err(DeserializeError::CorruptPayload(_))
    ));
}

#[test]
fn any_learner_reports_its_kind() {
    let session = trained(MulticlassMira::default());
    let codec = NativeCodec::new();
    let payload = codec
        .deserialize_any_learner(&codec.serialize_learner(session.learner()).unwrap())
        .unwrap();
    assert!(matches!(payload, ModelPayload::MulticlassMira(_)));
    assert_eq!(payload.kind(), LearnerKind::MulticlassMira);
}
