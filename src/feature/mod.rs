//! Feature model.
//!
//! A [`Feature`] is an immutable, value-equal, totally ordered key. Primitive
//! features carry a `(package, classifier, identifier, value)` tuple, compound
//! features own their constituents. Two features are the same dictionary key
//! exactly when they compare equal; no bookkeeping relies on object identity.
//!
//! Real-valued features do not carry their strength. The strength travels
//! alongside the feature as the example value, so `Feature::real(..)` is the
//! key under which every strength of that feature is stored.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifier / Value
// ============================================================================

/// Identifier of a primitive feature: either a string or a raw byte string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Identifier {
    Str(String),
    Bytes(Vec<u8>),
}

impl Identifier {
    pub fn is_str(&self) -> bool {
        matches!(self, Self::Str(_))
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<u8>> for Identifier {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

/// Value carried by a primitive feature key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureValue {
    /// A discrete feature's value is part of its identity.
    Discrete(String),
    /// A real feature's strength is supplied per example.
    Real,
}

// ============================================================================
// FeatureKind
// ============================================================================

/// Closed variant tag for a feature, used by the binary lexicon format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FeatureKind {
    DiscretePrimitive = 0,
    RealPrimitive = 1,
    DiscreteConjunctive = 2,
    RealConjunctive = 3,
    DiscreteReferring = 4,
    RealReferring = 5,
}

impl FeatureKind {
    /// Convert from u8, returning None for unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::DiscretePrimitive),
            1 => Some(Self::RealPrimitive),
            2 => Some(Self::DiscreteConjunctive),
            3 => Some(Self::RealConjunctive),
            4 => Some(Self::DiscreteReferring),
            5 => Some(Self::RealReferring),
            _ => None,
        }
    }

    pub fn is_discrete(self) -> bool {
        matches!(
            self,
            Self::DiscretePrimitive | Self::DiscreteConjunctive | Self::DiscreteReferring
        )
    }
}

// ============================================================================
// Feature
// ============================================================================

/// A sparse named attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Primitive {
        package: String,
        classifier: String,
        identifier: Identifier,
        value: FeatureValue,
    },
    /// Conjunction of two features. Discrete iff both sides are discrete.
    Conjunctive {
        package: String,
        classifier: String,
        left: Box<Feature>,
        right: Box<Feature>,
    },
    /// A feature produced by a classifier that refers to another feature.
    Referring {
        package: String,
        classifier: String,
        discrete: bool,
        referent: Box<Feature>,
    },
}

impl Feature {
    /// Discrete primitive feature.
    pub fn discrete(
        package: impl Into<String>,
        classifier: impl Into<String>,
        identifier: impl Into<Identifier>,
        value: impl Into<String>,
    ) -> Self {
        Self::Primitive {
            package: package.into(),
            classifier: classifier.into(),
            identifier: identifier.into(),
            value: FeatureValue::Discrete(value.into()),
        }
    }

    /// Real primitive feature key.
    pub fn real(
        package: impl Into<String>,
        classifier: impl Into<String>,
        identifier: impl Into<Identifier>,
    ) -> Self {
        Self::Primitive {
            package: package.into(),
            classifier: classifier.into(),
            identifier: identifier.into(),
            value: FeatureValue::Real,
        }
    }

    /// Conjunction of `left` and `right`.
    pub fn conjunction(
        package: impl Into<String>,
        classifier: impl Into<String>,
        left: Feature,
        right: Feature,
    ) -> Self {
        Self::Conjunctive {
            package: package.into(),
            classifier: classifier.into(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Referring feature wrapping `referent`.
    pub fn referring(
        package: impl Into<String>,
        classifier: impl Into<String>,
        discrete: bool,
        referent: Feature,
    ) -> Self {
        Self::Referring {
            package: package.into(),
            classifier: classifier.into(),
            discrete,
            referent: Box::new(referent),
        }
    }

    /// The feature used to key a label value in a label lexicon.
    pub fn label(value: impl Into<String>) -> Self {
        Self::discrete("", "label", "", value)
    }

    pub fn package(&self) -> &str {
        match self {
            Self::Primitive { package, .. }
            | Self::Conjunctive { package, .. }
            | Self::Referring { package, .. } => package,
        }
    }

    pub fn classifier(&self) -> &str {
        match self {
            Self::Primitive { classifier, .. }
            | Self::Conjunctive { classifier, .. }
            | Self::Referring { classifier, .. } => classifier,
        }
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            Self::Primitive { value: FeatureValue::Discrete(_), .. } => FeatureKind::DiscretePrimitive,
            Self::Primitive { value: FeatureValue::Real, .. } => FeatureKind::RealPrimitive,
            Self::Conjunctive { .. } if self.is_discrete() => FeatureKind::DiscreteConjunctive,
            Self::Conjunctive { .. } => FeatureKind::RealConjunctive,
            Self::Referring { discrete: true, .. } => FeatureKind::DiscreteReferring,
            Self::Referring { .. } => FeatureKind::RealReferring,
        }
    }

    pub fn is_discrete(&self) -> bool {
        match self {
            Self::Primitive { value, .. } => matches!(value, FeatureValue::Discrete(_)),
            Self::Conjunctive { left, right, .. } => left.is_discrete() && right.is_discrete(),
            Self::Referring { discrete, .. } => *discrete,
        }
    }

    pub fn is_compound(&self) -> bool {
        !matches!(self, Self::Primitive { .. })
    }

    pub fn is_referrer(&self) -> bool {
        matches!(self, Self::Referring { .. })
    }

    /// 0 for primitives, one more than the deepest constituent otherwise.
    pub fn depth(&self) -> usize {
        match self {
            Self::Primitive { .. } => 0,
            Self::Conjunctive { left, right, .. } => 1 + left.depth().max(right.depth()),
            Self::Referring { referent, .. } => 1 + referent.depth(),
        }
    }

    pub fn string_identifier(&self) -> Option<&str> {
        match self {
            Self::Primitive { identifier: Identifier::Str(s), .. } => Some(s),
            _ => None,
        }
    }

    pub fn byte_identifier(&self) -> Option<&[u8]> {
        match self {
            Self::Primitive { identifier: Identifier::Bytes(b), .. } => Some(b),
            _ => None,
        }
    }

    /// Direct constituents of a compound feature, in left-to-right order.
    pub fn constituents(&self) -> Vec<&Feature> {
        match self {
            Self::Primitive { .. } => Vec::new(),
            Self::Conjunctive { left, right, .. } => vec![left, right],
            Self::Referring { referent, .. } => vec![referent],
        }
    }

    /// Ordering on the run-time shape of two features, ignoring names and payload.
    fn compare_types(&self, other: &Self) -> Ordering {
        // Discrete sorts before real, shallow before deep, referrers before
        // non-referrers and string identifiers before byte identifiers.
        other
            .is_discrete()
            .cmp(&self.is_discrete())
            .then_with(|| self.depth().cmp(&other.depth()))
            .then_with(|| other.is_referrer().cmp(&self.is_referrer()))
            .then_with(|| {
                other
                    .string_identifier()
                    .is_some()
                    .cmp(&self.string_identifier().is_some())
            })
    }
}

impl Ord for Feature {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare_types(other)
            .then_with(|| self.package().cmp(other.package()))
            .then_with(|| self.classifier().cmp(other.classifier()))
            .then_with(|| match (self, other) {
                (
                    Self::Primitive { identifier: a, value: va, .. },
                    Self::Primitive { identifier: b, value: vb, .. },
                ) => a.cmp(b).then_with(|| match (va, vb) {
                    (FeatureValue::Discrete(x), FeatureValue::Discrete(y)) => x.cmp(y),
                    _ => Ordering::Equal,
                }),
                (
                    Self::Conjunctive { left: la, right: ra, .. },
                    Self::Conjunctive { left: lb, right: rb, .. },
                ) => la.cmp(lb).then_with(|| ra.cmp(rb)),
                (Self::Referring { referent: a, .. }, Self::Referring { referent: b, .. }) => {
                    a.cmp(b)
                }
                _ => (self.kind() as u8).cmp(&(other.kind() as u8)),
            })
    }
}

impl PartialOrd for Feature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive { package, classifier, identifier, value } => {
                if !package.is_empty() {
                    write!(f, "{package}.")?;
                }
                write!(f, "{classifier}:{identifier}")?;
                if let FeatureValue::Discrete(v) = value {
                    write!(f, "({v})")?;
                }
                Ok(())
            }
            Self::Conjunctive { left, right, .. } => write!(f, "{left}&{right}"),
            Self::Referring { package, classifier, referent, .. } => {
                if !package.is_empty() {
                    write!(f, "{package}.")?;
                }
                write!(f, "{classifier}->{referent}")
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn word(w: &str) -> Feature {
        Feature::discrete("nlp", "word", "", w)
    }

    #[test]
    fn value_equality_ignores_allocation() {
        let a = Feature::conjunction("nlp", "bigram", word("a"), word("b"));
        let b = Feature::conjunction("nlp", "bigram", word("a"), word("b"));
        assert_eq!(a, b);
        assert_ne!(a, Feature::conjunction("nlp", "bigram", word("b"), word("a")));
    }

    #[test]
    fn discrete_sorts_before_real() {
        let d = word("z");
        let r = Feature::real("aaa", "aaa", "a");
        assert!(d < r);
    }

    #[test]
    fn shallow_sorts_before_deep() {
        let p = word("z");
        let c = Feature::conjunction("a", "a", word("a"), word("b"));
        assert!(p < c);
        assert_eq!(c.depth(), 1);
    }

    #[test]
    fn string_identifier_before_bytes() {
        let s = Feature::discrete("p", "c", "x", "v");
        let b = Feature::discrete("p", "c", b"x".to_vec(), "v");
        assert!(s < b);
    }

    #[test]
    fn conjunction_discreteness_follows_children() {
        let real = Feature::real("p", "len", "");
        let c = Feature::conjunction("p", "c", word("a"), real);
        assert!(!c.is_discrete());
        assert_eq!(c.kind(), FeatureKind::RealConjunctive);
        assert_eq!(c.constituents().len(), 2);
    }

    #[test]
    fn ordering_is_total_and_consistent_with_eq() {
        let mut fs = vec![
            Feature::real("p", "len", ""),
            word("b"),
            Feature::referring("p", "ref", true, word("a")),
            word("a"),
            Feature::conjunction("p", "c", word("a"), word("b")),
        ];
        fs.sort();
        for w in fs.windows(2) {
            assert_eq!(w[0].cmp(&w[1]), Ordering::Less);
        }
        assert_eq!(fs[0], word("a"));
    }

    #[test]
    fn kind_tag_roundtrips() {
        for tag in 0..6u8 {
            let kind = FeatureKind::from_u8(tag).unwrap();
            assert_eq!(kind as u8, tag);
        }
        assert!(FeatureKind::from_u8(6).is_none());
    }

    #[test]
    fn display_formats() {
        assert_eq!(word("dog").to_string(), "nlp.word:(dog)");
        let c = Feature::conjunction("", "c", word("a"), Feature::real("", "len", "n"));
        assert_eq!(c.to_string(), "nlp.word:(a)&len:n");
        let r = Feature::referring("nlp", "head", true, Feature::discrete("", "pos", "tag", "NN"));
        assert_eq!(r.to_string(), "nlp.head->pos:tag(NN)");
    }
}
