//! Property-based tests for lexicon counting and pruning.

use std::collections::HashMap;

use proptest::collection::vec as prop_vec;
use proptest::prelude::*;

use perceptrons::feature::Feature;
use perceptrons::lexicon::{CountPolicy, Lexicon, Mode, PruningPolicy};
use perceptrons::testing::word;

// =============================================================================
// Generators
// =============================================================================

/// Word streams over a small alphabet so features repeat.
fn arb_words() -> impl Strategy<Value = Vec<u8>> {
    prop_vec(0u8..12, 1..80)
}

fn feature(id: u8) -> Feature {
    word(&format!("w{id}"))
}

fn counted(words: &[u8]) -> Lexicon {
    let mut lex = Lexicon::new();
    lex.count_features(CountPolicy::Global);
    for &w in words {
        lex.lookup(&feature(w), Mode::Training, None).unwrap();
    }
    lex
}

fn occurrences(words: &[u8]) -> HashMap<u8, u32> {
    let mut counts = HashMap::new();
    for &w in words {
        *counts.entry(w).or_insert(0) += 1;
    }
    counts
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn global_counts_match_occurrences(words in arb_words()) {
        let lex = counted(&words);
        for (w, expected) in occurrences(&words) {
            let key = lex.key_of(&feature(w)).unwrap();
            prop_assert_eq!(lex.count(key), expected);
        }
    }

    #[test]
    fn per_class_counts_match_occurrences(
        tagged in prop_vec((0u8..8, 0usize..3), 1..60)
    ) {
        let mut lex = Lexicon::new();
        lex.count_features(CountPolicy::PerClass);
        for &(w, class) in &tagged {
            lex.lookup(&feature(w), Mode::Training, Some(class)).unwrap();
        }
        for (key, f) in lex.iter() {
            for class in 0..3 {
                let expected = tagged
                    .iter()
                    .filter(|&&(w, c)| c == class && feature(w) == *f)
                    .count() as u32;
                prop_assert_eq!(lex.class_count(key, class), expected);
            }
        }
    }

    #[test]
    fn prune_none_is_a_no_op(words in arb_words()) {
        let mut lex = counted(&words);
        let before = lex.clone();
        prop_assert_eq!(lex.prune(&PruningPolicy::None).unwrap(), None);
        prop_assert_eq!(lex, before);
    }

    #[test]
    fn prune_permutation_is_a_bijection(words in arb_words(), threshold in 1u32..6) {
        let mut lex = counted(&words);
        let originals: Vec<Feature> = lex.iter().map(|(_, f)| f.clone()).collect();
        let perm = lex.prune(&PruningPolicy::Absolute(threshold)).unwrap().unwrap();

        prop_assert_eq!(perm.len(), originals.len());
        let mut sorted = perm.clone();
        sorted.sort_unstable();
        prop_assert_eq!(sorted, (0..originals.len()).collect::<Vec<_>>());

        for (old, f) in originals.iter().enumerate() {
            prop_assert_eq!(lex.key_of(f), Some(perm[old]));
        }
    }

    #[test]
    fn prune_splits_on_strict_threshold(words in arb_words(), threshold in 1u32..6) {
        let mut lex = counted(&words);
        lex.prune(&PruningPolicy::Absolute(threshold)).unwrap();
        let cutoff = lex.cutoff();
        for key in 0..lex.len() {
            prop_assert_eq!(key >= cutoff, lex.count(key) < threshold);
        }
    }

    #[test]
    fn percentage_prune_keeps_the_most_frequent(words in arb_words(), fraction in 0.0f64..=1.0) {
        let mut lex = counted(&words);
        let max = occurrences(&words).into_values().max().unwrap();
        lex.prune(&PruningPolicy::Percentage(fraction)).unwrap();

        let threshold = (f64::from(max) * fraction).ceil() as u32;
        prop_assert!(lex.cutoff() > 0);
        for key in 0..lex.len() {
            prop_assert_eq!(key >= lex.cutoff(), lex.count(key) < threshold);
        }
    }

    #[test]
    fn inference_lookups_never_mutate(words in arb_words(), probes in arb_words()) {
        let mut lex = counted(&words);
        let before = lex.clone();
        for &w in &probes {
            let key = lex.lookup(&feature(w), Mode::Inference, None).unwrap();
            prop_assert!(key <= lex.len());
        }
        prop_assert_eq!(lex, before);
    }
}
