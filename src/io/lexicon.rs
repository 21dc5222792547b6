//! Binary lexicon format.
//!
//! # Payload Layout
//!
//! ```text
//! u8      has child lexicon
//!         [child records, then one i32 parent count per child key]
//! u32     number of main records
//!         main records
//! i64     prune cutoff, -1 when none
//! u8      count policy (0 none, 1 global, 2 per-class) followed by the arrays
//! ```
//!
//! Records are written in the features' natural order, each followed by its
//! u64 key. Package, classifier and identifier are stored as a length-prefixed
//! byte string, or as `u32::MAX` when equal to the previous record's. Compound
//! features store their constituents as references: a main key, or
//! `-(child key) - 1`.
//!
//! References may point forward, so loading first reads every record and
//! then resolves references recursively, rejecting cycles.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};

use super::native::{FormatFlags, FormatHeader, ModelType};
use super::wire::{ByteReader, ByteWriter};
use super::{DeserializeError, NativeCodec, SerializeError};
use crate::feature::{Feature, FeatureKind, FeatureValue, Identifier};
use crate::lexicon::{ChildLexicon, FeatureCounts, Lexicon};

// ============================================================================
// Public API
// ============================================================================

impl NativeCodec {
    /// Serialize a lexicon to bytes with header.
    pub fn serialize_lexicon(&self, lexicon: &Lexicon) -> Result<Vec<u8>, SerializeError> {
        let mut output = Vec::new();
        self.write_lexicon(&mut output, lexicon)?;
        Ok(output)
    }

    pub fn write_lexicon<W: Write>(&self, writer: &mut W, lexicon: &Lexicon) -> Result<(), SerializeError> {
        let (payload, flags) = encode_lexicon(lexicon)?;
        let num_features = u32::try_from(lexicon.len()).map_err(|_| SerializeError::TooLarge("lexicon size"))?;
        let num_classes = u32::try_from(lexicon.counts().num_classes())
            .map_err(|_| SerializeError::TooLarge("class count"))?;

        let mut header = FormatHeader::new(ModelType::Lexicon, num_features, num_classes);
        header.flags = flags;
        self.write_to(writer, &mut header, &payload)
    }

    /// Load a lexicon and reattach its child lexicon.
    pub fn deserialize_lexicon(&self, bytes: &[u8]) -> Result<Lexicon, DeserializeError> {
        self.read_lexicon(&mut std::io::Cursor::new(bytes))
    }

    pub fn read_lexicon<R: Read>(&self, reader: &mut R) -> Result<Lexicon, DeserializeError> {
        let (header, payload) = self.read_from(reader)?;
        if header.model_type != ModelType::Lexicon {
            return Err(DeserializeError::TypeMismatch {
                expected: ModelType::Lexicon,
                actual: header.model_type,
            });
        }
        let lexicon = decode_lexicon(&payload)?;
        if lexicon.len() != header.num_features as usize {
            return Err(DeserializeError::CorruptPayload(format!(
                "header declares {} features, payload holds {}",
                header.num_features,
                lexicon.len()
            )));
        }
        Ok(lexicon)
    }
}

/// Smallest possible encoded record, used to bound declared record counts.
const MIN_RECORD_SIZE: usize = 1 + 4 + 4 + 8;

// ============================================================================
// Encoding
// ============================================================================

/// Reference keys for every feature the payload mentions.
///
/// Constituents that are in neither the main nor the child lexicon (for
/// example after their main entry was discarded) are appended to the child
/// section with no parents.
struct References<'a> {
    lexicon: &'a Lexicon,
    children: Vec<(Feature, i32)>,
    child_index: HashMap<Feature, usize>,
}

impl<'a> References<'a> {
    fn new(lexicon: &'a Lexicon) -> Self {
        let mut refs = Self {
            lexicon,
            children: Vec::new(),
            child_index: HashMap::new(),
        };
        if let Some(children) = lexicon.children() {
            for (_, feature, parents) in children.iter() {
                refs.push_child(feature.clone(), parents);
            }
        }

        let mut pending: Vec<Feature> = lexicon
            .iter()
            .map(|(_, f)| f)
            .chain(refs.children.iter().map(|(f, _)| f))
            .flat_map(Feature::constituents)
            .cloned()
            .collect();
        while let Some(feature) = pending.pop() {
            if refs.get(&feature).is_none() {
                pending.extend(feature.constituents().into_iter().cloned());
                refs.push_child(feature, 0);
            }
        }
        refs
    }

    fn push_child(&mut self, feature: Feature, parents: i32) {
        self.child_index.insert(feature.clone(), self.children.len());
        self.children.push((feature, parents));
    }

    fn get(&self, feature: &Feature) -> Option<i64> {
        if let Some(key) = self.lexicon.key_of(feature) {
            return Some(key as i64);
        }
        self.child_index.get(feature).map(|&k| -(k as i64) - 1)
    }

    fn reference(&self, feature: &Feature) -> Result<i64, SerializeError> {
        self.get(feature)
            .ok_or_else(|| SerializeError::Inconsistent(format!("constituent {feature} has no key")))
    }
}

/// Delta-encoding state: the previous record's strings.
#[derive(Default)]
struct Previous {
    package: Option<Vec<u8>>,
    classifier: Option<Vec<u8>>,
    identifier: Option<Vec<u8>>,
}

fn identifier_bytes(identifier: &Identifier) -> (u8, &[u8]) {
    match identifier {
        Identifier::Str(s) => (0, s.as_bytes()),
        Identifier::Bytes(b) => (1, b.as_slice()),
    }
}

fn write_record(
    w: &mut ByteWriter,
    feature: &Feature,
    key: usize,
    prev: &mut Previous,
    refs: &References<'_>,
) -> Result<(), SerializeError> {
    w.u8(feature.kind() as u8);

    let package = feature.package().as_bytes();
    let classifier = feature.classifier().as_bytes();
    w.delta_bytes(package, prev.package.as_deref());
    w.delta_bytes(classifier, prev.classifier.as_deref());
    prev.package = Some(package.to_vec());
    prev.classifier = Some(classifier.to_vec());

    match feature {
        Feature::Primitive { identifier, value, .. } => {
            let (tag, bytes) = identifier_bytes(identifier);
            w.u8(tag);
            w.delta_bytes(bytes, prev.identifier.as_deref());
            prev.identifier = Some(bytes.to_vec());
            if let FeatureValue::Discrete(v) = value {
                w.bytes(v.as_bytes());
            }
        }
        Feature::Conjunctive { left, right, .. } => {
            w.i64(refs.reference(left)?);
            w.i64(refs.reference(right)?);
        }
        Feature::Referring { referent, .. } => {
            w.i64(refs.reference(referent)?);
        }
    }

    w.u64(key as u64);
    Ok(())
}

fn write_records<'f>(
    w: &mut ByteWriter,
    entries: impl Iterator<Item = (usize, &'f Feature)>,
    refs: &References<'_>,
) -> Result<(), SerializeError> {
    let mut sorted: Vec<(usize, &Feature)> = entries.collect();
    sorted.sort_by(|a, b| a.1.cmp(b.1));
    w.u32(u32::try_from(sorted.len()).map_err(|_| SerializeError::TooLarge("record count"))?);

    let mut prev = Previous::default();
    for (key, feature) in sorted {
        write_record(w, feature, key, &mut prev, refs)?;
    }
    Ok(())
}

fn write_count_row(w: &mut ByteWriter, row: &[u32]) {
    w.u32(row.len() as u32);
    for &c in row {
        w.u32(c);
    }
}

fn write_counts(w: &mut ByteWriter, counts: &FeatureCounts) {
    match counts {
        FeatureCounts::None => w.u8(0),
        FeatureCounts::Global(row) => {
            w.u8(1);
            write_count_row(w, row);
        }
        FeatureCounts::PerClass(rows) => {
            w.u8(2);
            w.u32(rows.len() as u32);
            for row in rows {
                write_count_row(w, row);
            }
        }
    }
}

fn encode_lexicon(lexicon: &Lexicon) -> Result<(Vec<u8>, FormatFlags), SerializeError> {
    let refs = References::new(lexicon);
    let mut flags = FormatFlags::empty();
    let mut w = ByteWriter::new();

    // Child lexicon first: main records may reference it.
    if refs.children.is_empty() {
        w.u8(0);
    } else {
        flags.set(FormatFlags::HAS_CHILDREN);
        w.u8(1);
        write_records(&mut w, refs.children.iter().map(|(f, _)| f).enumerate(), &refs)?;
        for (_, parents) in &refs.children {
            w.i32(*parents);
        }
    }

    write_records(&mut w, lexicon.iter(), &refs)?;

    match lexicon.prune_cutoff() {
        Some(cutoff) => {
            flags.set(FormatFlags::PRUNED);
            w.i64(cutoff as i64);
        }
        None => w.i64(-1),
    }

    match lexicon.counts() {
        FeatureCounts::Global(_) => flags.set(FormatFlags::GLOBAL_COUNTS),
        FeatureCounts::PerClass(_) => flags.set(FormatFlags::PER_CLASS_COUNTS),
        FeatureCounts::None => {}
    }
    write_counts(&mut w, lexicon.counts());

    Ok((w.into_bytes(), flags))
}

// ============================================================================
// Decoding
// ============================================================================

/// A record whose constituent references are not resolved yet.
#[derive(Debug)]
struct RawRecord {
    package: String,
    classifier: String,
    body: RawBody,
}

#[derive(Debug)]
enum RawBody {
    Primitive { identifier: Identifier, value: FeatureValue },
    Conjunctive { left: i64, right: i64 },
    Referring { discrete: bool, referent: i64 },
}

fn corrupt(message: impl Into<String>) -> DeserializeError {
    DeserializeError::CorruptPayload(message.into())
}

fn utf8(bytes: Vec<u8>) -> Result<String, DeserializeError> {
    String::from_utf8(bytes).map_err(|_| corrupt("string field is not valid UTF-8"))
}

fn read_record(r: &mut ByteReader<'_>, prev: &mut Previous) -> Result<(RawRecord, u64), DeserializeError> {
    let tag = r.u8()?;
    let kind = FeatureKind::from_u8(tag).ok_or_else(|| corrupt(format!("unknown feature kind {tag}")))?;

    let package = r.delta_bytes(prev.package.as_deref())?;
    let classifier = r.delta_bytes(prev.classifier.as_deref())?;
    prev.package = Some(package.clone());
    prev.classifier = Some(classifier.clone());

    let body = match kind {
        FeatureKind::DiscretePrimitive | FeatureKind::RealPrimitive => {
            let id_tag = r.u8()?;
            let bytes = r.delta_bytes(prev.identifier.as_deref())?;
            prev.identifier = Some(bytes.clone());
            let identifier = match id_tag {
                0 => Identifier::Str(utf8(bytes)?),
                1 => Identifier::Bytes(bytes),
                t => return Err(corrupt(format!("unknown identifier tag {t}"))),
            };
            let value = if kind == FeatureKind::DiscretePrimitive {
                FeatureValue::Discrete(utf8(r.bytes()?)?)
            } else {
                FeatureValue::Real
            };
            RawBody::Primitive { identifier, value }
        }
        FeatureKind::DiscreteConjunctive | FeatureKind::RealConjunctive => RawBody::Conjunctive {
            left: r.i64()?,
            right: r.i64()?,
        },
        FeatureKind::DiscreteReferring | FeatureKind::RealReferring => RawBody::Referring {
            discrete: kind.is_discrete(),
            referent: r.i64()?,
        },
    };

    let key = r.u64()?;
    Ok((
        RawRecord {
            package: utf8(package)?,
            classifier: utf8(classifier)?,
            body,
        },
        key,
    ))
}

/// Read a record section into key order.
fn read_records(r: &mut ByteReader<'_>) -> Result<Vec<Slot>, DeserializeError> {
    let n = r.count(MIN_RECORD_SIZE)?;
    let mut slots: Vec<Option<RawRecord>> = (0..n).map(|_| None).collect();
    let mut prev = Previous::default();
    for _ in 0..n {
        let (record, key) = read_record(r, &mut prev)?;
        let slot = usize::try_from(key)
            .ok()
            .and_then(|k| slots.get_mut(k))
            .ok_or_else(|| corrupt(format!("key {key} is out of range for {n} records")))?;
        if slot.is_some() {
            return Err(corrupt(format!("key {key} appears twice")));
        }
        *slot = Some(record);
    }
    // n distinct keys below n fill every slot.
    Ok(slots.into_iter().flatten().map(Slot::Raw).collect())
}

fn read_count_row(r: &mut ByteReader<'_>, size: usize) -> Result<Vec<u32>, DeserializeError> {
    let n = r.count(4)?;
    if n > size {
        return Err(corrupt(format!("count array of {n} entries for {size} features")));
    }
    (0..n).map(|_| r.u32()).collect()
}

fn read_counts(r: &mut ByteReader<'_>, size: usize) -> Result<FeatureCounts, DeserializeError> {
    match r.u8()? {
        0 => Ok(FeatureCounts::None),
        1 => Ok(FeatureCounts::Global(read_count_row(r, size)?)),
        2 => {
            let classes = r.count(4)?;
            let rows = (0..classes)
                .map(|_| read_count_row(r, size))
                .collect::<Result<_, _>>()?;
            Ok(FeatureCounts::PerClass(rows))
        }
        t => Err(corrupt(format!("unknown count policy {t}"))),
    }
}

enum Slot {
    Raw(RawRecord),
    Resolving,
    Done(Feature),
}

/// Resolves constituent references across both sections.
struct Resolver {
    main: Vec<Slot>,
    children: Vec<Slot>,
}

impl Resolver {
    fn slot(&mut self, reference: i64) -> Result<&mut Slot, DeserializeError> {
        let slot = if reference >= 0 {
            usize::try_from(reference).ok().and_then(|k| self.main.get_mut(k))
        } else {
            usize::try_from(-(reference + 1))
                .ok()
                .and_then(|k| self.children.get_mut(k))
        };
        slot.ok_or_else(|| corrupt(format!("dangling constituent reference {reference}")))
    }

    fn resolve(&mut self, reference: i64) -> Result<Feature, DeserializeError> {
        let raw = match std::mem::replace(self.slot(reference)?, Slot::Resolving) {
            Slot::Done(feature) => {
                *self.slot(reference)? = Slot::Done(feature.clone());
                return Ok(feature);
            }
            Slot::Resolving => return Err(corrupt(format!("cyclic constituent reference {reference}"))),
            Slot::Raw(raw) => raw,
        };

        let RawRecord { package, classifier, body } = raw;
        let feature = match body {
            RawBody::Primitive { identifier, value } => Feature::Primitive {
                package,
                classifier,
                identifier,
                value,
            },
            RawBody::Conjunctive { left, right } => Feature::Conjunctive {
                package,
                classifier,
                left: Box::new(self.resolve(left)?),
                right: Box::new(self.resolve(right)?),
            },
            RawBody::Referring { discrete, referent } => Feature::Referring {
                package,
                classifier,
                discrete,
                referent: Box::new(self.resolve(referent)?),
            },
        };
        *self.slot(reference)? = Slot::Done(feature.clone());
        Ok(feature)
    }

    fn resolve_all(mut self) -> Result<(Vec<Feature>, Vec<Feature>), DeserializeError> {
        let main = (0..self.main.len() as i64)
            .map(|k| self.resolve(k))
            .collect::<Result<Vec<_>, _>>()?;
        let children = (0..self.children.len() as i64)
            .map(|k| self.resolve(-k - 1))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((main, children))
    }
}

fn ensure_unique(features: &[Feature], section: &str) -> Result<(), DeserializeError> {
    let mut seen = HashSet::with_capacity(features.len());
    for feature in features {
        if !seen.insert(feature) {
            return Err(corrupt(format!("{section} lexicon holds {feature} twice")));
        }
    }
    Ok(())
}

fn decode_lexicon(payload: &[u8]) -> Result<Lexicon, DeserializeError> {
    let mut r = ByteReader::new(payload);

    let (child_slots, parents) = match r.u8()? {
        0 => (Vec::new(), Vec::new()),
        1 => {
            let slots = read_records(&mut r)?;
            let parents = (0..slots.len()).map(|_| r.i32()).collect::<Result<Vec<_>, _>>()?;
            (slots, parents)
        }
        t => return Err(corrupt(format!("invalid child flag {t}"))),
    };
    let has_children = !child_slots.is_empty();

    let main_slots = read_records(&mut r)?;
    let size = main_slots.len();

    let cutoff = match r.i64()? {
        -1 => None,
        c if (0..=size as i64).contains(&c) => Some(c as usize),
        c => return Err(corrupt(format!("cutoff {c} is out of range for {size} features"))),
    };
    let counts = read_counts(&mut r, size)?;
    if !r.is_empty() {
        return Err(corrupt("trailing bytes after lexicon"));
    }

    let (features, child_features) = Resolver {
        main: main_slots,
        children: child_slots,
    }
    .resolve_all()?;
    ensure_unique(&features, "main")?;
    ensure_unique(&child_features, "child")?;

    let children = has_children.then(|| ChildLexicon::from_parts(child_features, parents));
    let lexicon = Lexicon::from_parts(features, counts, cutoff, children);
    lexicon
        .reattach_children()
        .map_err(|e| DeserializeError::CorruptPayload(e.to_string()))?;
    Ok(lexicon)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::{CountPolicy, Mode, PruningPolicy};

    fn word(w: &str) -> Feature {
        Feature::discrete("nlp", "word", "w", w)
    }

    fn sample() -> Lexicon {
        let mut lex = Lexicon::new();
        lex.count_features(CountPolicy::Global);
        let raw = vec![
            (word("the"), 1.0),
            (Feature::real("nlp", "length", "len"), 3.0),
            (Feature::discrete("nlp", "bytes", b"\x00\x01".to_vec(), "x"), 1.0),
            (Feature::conjunction("nlp", "bigram", word("the"), word("cat")), 1.0),
            (Feature::referring("nlp", "ref", true, word("dog")), 1.0),
        ];
        lex.encode(&raw, Mode::Training, None).unwrap();
        lex.encode(&raw[..1], Mode::Training, None).unwrap();
        lex
    }

    #[test]
    fn roundtrip_preserves_keys_counts_and_children() {
        let lex = sample();
        let codec = NativeCodec::new();
        let bytes = codec.serialize_lexicon(&lex).unwrap();
        let loaded = codec.deserialize_lexicon(&bytes).unwrap();

        assert_eq!(loaded.len(), lex.len());
        for (key, feature) in lex.iter() {
            assert_eq!(loaded.key_of(feature), Some(key));
            assert_eq!(loaded.count(key), lex.count(key));
        }
        assert_eq!(loaded.prune_cutoff(), None);
        assert!(loaded.children().unwrap().contains(&word("cat")));
        assert_eq!(
            loaded.lookup_key(loaded.lookup_child(&word("dog")).unwrap()),
            Some(&word("dog"))
        );
    }

    #[test]
    fn roundtrip_after_prune() {
        let mut lex = sample();
        lex.prune(&PruningPolicy::Absolute(2)).unwrap();
        let codec = NativeCodec::new();
        let bytes = codec.serialize_lexicon(&lex).unwrap();
        let (header, _) = codec.read_from(&mut bytes.as_slice()).unwrap();
        assert!(header.flags.contains(FormatFlags::PRUNED));
        assert!(header.flags.contains(FormatFlags::GLOBAL_COUNTS));

        let loaded = codec.deserialize_lexicon(&bytes).unwrap();
        assert_eq!(loaded.prune_cutoff(), lex.prune_cutoff());
        assert_eq!(loaded.feature(0), lex.feature(0));
    }

    #[test]
    fn shared_strings_are_delta_encoded() {
        let mut lex = Lexicon::new();
        for w in ["a", "b", "c", "d"] {
            lex.lookup(&word(w), Mode::Training, None).unwrap();
        }
        let (payload, _) = encode_lexicon(&lex).unwrap();
        // Only the first record spells out "nlp", "word" and "w".
        let spelled = payload.windows(3).filter(|w| w == b"nlp").count();
        assert_eq!(spelled, 1);
    }

    #[test]
    fn per_class_counts_roundtrip() {
        let mut lex = Lexicon::new();
        lex.count_features(CountPolicy::PerClass);
        lex.lookup(&word("a"), Mode::Training, Some(0)).unwrap();
        lex.lookup(&word("a"), Mode::Training, Some(2)).unwrap();
        let codec = NativeCodec::new();
        let loaded = codec
            .deserialize_lexicon(&codec.serialize_lexicon(&lex).unwrap())
            .unwrap();
        assert_eq!(loaded.counts(), lex.counts());
    }

    #[test]
    fn learner_file_is_rejected() {
        let codec = NativeCodec::new();
        let bytes = codec.serialize(ModelType::Winnow, 0, 2, &0u8).unwrap();
        assert!(matches!(
            codec.deserialize_lexicon(&bytes),
            Err(DeserializeError::TypeMismatch { expected: ModelType::Lexicon, .. })
        ));
    }

    #[test]
    fn cyclic_reference_is_corrupt() {
        // One main conjunction whose left constituent is itself.
        let mut w = ByteWriter::new();
        w.u8(0);
        w.u32(1);
        w.u8(FeatureKind::DiscreteConjunctive as u8);
        w.bytes(b"p");
        w.bytes(b"c");
        w.i64(0);
        w.i64(0);
        w.u64(0);
        w.i64(-1);
        w.u8(0);
        let err = decode_lexicon(&w.into_bytes()).unwrap_err();
        assert!(matches!(err, DeserializeError::CorruptPayload(m) if m.contains("cyclic")));
    }

    #[test]
    fn duplicate_key_is_corrupt() {
        let mut w = ByteWriter::new();
        w.u8(0);
        w.u32(2);
        for v in ["a", "b"] {
            w.u8(FeatureKind::DiscretePrimitive as u8);
            w.bytes(b"p");
            w.bytes(b"c");
            w.u8(0);
            w.bytes(b"i");
            w.bytes(v.as_bytes());
            w.u64(0);
        }
        w.i64(-1);
        w.u8(0);
        assert!(decode_lexicon(&w.into_bytes()).is_err());
    }
}
