//! Learner payloads for the native format.
//!
//! Learners are stored whole: every learner type is serde-serializable, so
//! the payload is a closed enum with one variant per implementation, tagged
//! again in the header by [`ModelType`]. Readers never look a type up by name.

use serde::{Deserialize, Serialize};

use super::native::{DeserializeError, ModelType, NativeCodec, SerializeError};
use crate::training::rules::{
    SparseAveragedPerceptron, SparseBinaryMira, SparseConfidenceWeighted, SparsePassiveAggressive,
    SparsePerceptron, SparseWinnow,
};
use crate::training::{Learner, LearnerKind, MulticlassMira};

// ============================================================================
// Top-Level Payload
// ============================================================================

/// Version-tagged payload enum.
///
/// New format versions add new variants rather than modifying existing ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    V1(PayloadV1),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadV1 {
    pub metadata: ModelMetadata,
    pub model: ModelPayload,
}

// ============================================================================
// Metadata
// ============================================================================

/// Metadata common to all learners.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Materialized weights in the largest weight vector.
    pub num_features: u32,
    /// Label values in index order.
    pub labels: Vec<String>,
    /// Additional key-value attributes.
    pub attributes: Vec<(String, String)>,
}

// ============================================================================
// Model Payloads
// ============================================================================

/// One variant per learner implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelPayload {
    Perceptron(SparsePerceptron),
    AveragedPerceptron(SparseAveragedPerceptron),
    Winnow(SparseWinnow),
    BinaryMira(SparseBinaryMira),
    PassiveAggressive(SparsePassiveAggressive),
    ConfidenceWeighted(SparseConfidenceWeighted),
    MulticlassMira(MulticlassMira),
}

impl ModelPayload {
    pub fn kind(&self) -> LearnerKind {
        match self {
            Self::Perceptron(_) => LearnerKind::Perceptron,
            Self::AveragedPerceptron(_) => LearnerKind::AveragedPerceptron,
            Self::Winnow(_) => LearnerKind::Winnow,
            Self::BinaryMira(_) => LearnerKind::BinaryMira,
            Self::PassiveAggressive(_) => LearnerKind::PassiveAggressive,
            Self::ConfidenceWeighted(_) => LearnerKind::ConfidenceWeighted,
            Self::MulticlassMira(_) => LearnerKind::MulticlassMira,
        }
    }
}

/// A learner that has a [`ModelPayload`] variant.
pub trait PersistLearner: Learner + Sized {
    const KIND: LearnerKind;

    fn to_payload(&self) -> ModelPayload;

    /// The learner inside `payload`, or `None` for another variant.
    fn from_payload(payload: ModelPayload) -> Option<Self>;
}

macro_rules! persist_learner {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl PersistLearner for $ty {
            const KIND: LearnerKind = LearnerKind::$variant;

            fn to_payload(&self) -> ModelPayload {
                ModelPayload::$variant(self.clone())
            }

            fn from_payload(payload: ModelPayload) -> Option<Self> {
                match payload {
                    ModelPayload::$variant(learner) => Some(learner),
                    _ => None,
                }
            }
        }
    )*};
}

persist_learner! {
    SparsePerceptron => Perceptron,
    SparseAveragedPerceptron => AveragedPerceptron,
    SparseWinnow => Winnow,
    SparseBinaryMira => BinaryMira,
    SparsePassiveAggressive => PassiveAggressive,
    SparseConfidenceWeighted => ConfidenceWeighted,
    MulticlassMira => MulticlassMira,
}

// ============================================================================
// Codec
// ============================================================================

impl NativeCodec {
    pub fn serialize_learner<L: PersistLearner>(&self, learner: &L) -> Result<Vec<u8>, SerializeError> {
        let num_features = u32::try_from(learner.num_weights())
            .map_err(|_| SerializeError::TooLarge("weight vector"))?;
        let num_classes = u32::try_from(learner.labels().len())
            .map_err(|_| SerializeError::TooLarge("label set"))?;
        let payload = Payload::V1(PayloadV1 {
            metadata: ModelMetadata {
                num_features,
                labels: learner.labels().to_vec(),
                attributes: vec![("learner".to_string(), learner.kind().name().to_string())],
            },
            model: learner.to_payload(),
        });
        self.serialize(ModelType::from(L::KIND), num_features, num_classes, &payload)
    }

    /// Load a learner of a known type.
    pub fn deserialize_learner<L: PersistLearner>(&self, bytes: &[u8]) -> Result<L, DeserializeError> {
        let expected = ModelType::from(L::KIND);
        let (_, payload) = self.deserialize_payload(bytes, Some(expected))?;
        L::from_payload(payload.model).ok_or(DeserializeError::CorruptPayload(
            "payload variant does not match the header".into(),
        ))
    }

    /// Load whichever learner the file holds.
    pub fn deserialize_any_learner(&self, bytes: &[u8]) -> Result<ModelPayload, DeserializeError> {
        Ok(self.deserialize_payload(bytes, None)?.1.model)
    }

    fn deserialize_payload(
        &self,
        bytes: &[u8],
        expected: Option<ModelType>,
    ) -> Result<(ModelType, PayloadV1), DeserializeError> {
        let mut cursor = std::io::Cursor::new(bytes);
        let (header, payload_bytes) = self.read_from(&mut cursor)?;
        if let Some(expected) = expected {
            if header.model_type != expected {
                return Err(DeserializeError::TypeMismatch {
                    expected,
                    actual: header.model_type,
                });
            }
        }
        if header.model_type == ModelType::Lexicon {
            return Err(DeserializeError::CorruptPayload("file holds a lexicon, not a learner".into()));
        }

        let Payload::V1(payload) = postcard::from_bytes(&payload_bytes)?;
        if ModelType::from(payload.model.kind()) != header.model_type {
            return Err(DeserializeError::CorruptPayload(
                "payload variant does not match the header".into(),
            ));
        }
        Ok((header.model_type, payload))
    }
}
