//! Native binary container for lexicons and learners.
//!
//! Every file is a 32-byte header followed by a payload. Lexicon payloads
//! use the compact record format in [`lexicon`](super::lexicon); learner
//! payloads are Postcard-encoded [`Payload`](super::Payload)s.
//!
//! # Format Structure
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Header (32 bytes)                        │
//! ├────────────────────────────────────────────────────────────┤
//! │                    Payload (variable)                       │
//! └────────────────────────────────────────────────────────────┘
//! ```

use std::io::{Read, Write};

use thiserror::Error;

use crate::training::LearnerKind;

// ============================================================================
// Constants
// ============================================================================

/// Magic bytes identifying a perceptrons file.
pub const MAGIC: &[u8; 4] = b"PCTR";

/// Current format version (major).
pub const CURRENT_VERSION_MAJOR: u8 = 1;

/// Current format version (minor).
pub const CURRENT_VERSION_MINOR: u8 = 0;

/// Size of the format header in bytes.
pub const HEADER_SIZE: usize = 32;

// ============================================================================
// Model Type
// ============================================================================

/// Content type stored in the header.
///
/// One tag per learner implementation plus one for a bare lexicon. Readers
/// dispatch on this tag; there is no lookup by type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModelType {
    Lexicon = 0,
    Perceptron = 1,
    AveragedPerceptron = 2,
    Winnow = 3,
    BinaryMira = 4,
    PassiveAggressive = 5,
    ConfidenceWeighted = 6,
    MulticlassMira = 7,
}

impl ModelType {
    /// Convert from u8, returning None for unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Lexicon),
            1 => Some(Self::Perceptron),
            2 => Some(Self::AveragedPerceptron),
            3 => Some(Self::Winnow),
            4 => Some(Self::BinaryMira),
            5 => Some(Self::PassiveAggressive),
            6 => Some(Self::ConfidenceWeighted),
            7 => Some(Self::MulticlassMira),
            _ => None,
        }
    }
}

impl From<LearnerKind> for ModelType {
    fn from(kind: LearnerKind) -> Self {
        match kind {
            LearnerKind::Perceptron => Self::Perceptron,
            LearnerKind::AveragedPerceptron => Self::AveragedPerceptron,
            LearnerKind::Winnow => Self::Winnow,
            LearnerKind::BinaryMira => Self::BinaryMira,
            LearnerKind::PassiveAggressive => Self::PassiveAggressive,
            LearnerKind::ConfidenceWeighted => Self::ConfidenceWeighted,
            LearnerKind::MulticlassMira => Self::MulticlassMira,
        }
    }
}

// ============================================================================
// Format Flags
// ============================================================================

/// Bitfield flags describing the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatFlags(u16);

impl FormatFlags {
    /// Lexicon carries a child lexicon.
    pub const HAS_CHILDREN: u16 = 1 << 0;
    /// Lexicon has a prune cutoff.
    pub const PRUNED: u16 = 1 << 1;
    /// Lexicon carries global counts.
    pub const GLOBAL_COUNTS: u16 = 1 << 2;
    /// Lexicon carries per-class counts.
    pub const PER_CLASS_COUNTS: u16 = 1 << 3;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }

    pub fn clear(&mut self, flag: u16) {
        self.0 &= !flag;
    }
}

// ============================================================================
// Format Header
// ============================================================================

/// 32-byte header for the native format.
///
/// # Layout
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     Magic ("PCTR")
/// 4       1     Version major
/// 5       1     Version minor
/// 6       1     Model type
/// 7       1     Reserved (padding)
/// 8       2     Flags (bitfield)
/// 10      2     Reserved
/// 12      4     Payload size (bytes)
/// 16      4     CRC32 checksum of payload
/// 20      4     Number of features
/// 24      4     Number of classes
/// 28      4     Reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub model_type: ModelType,
    pub flags: FormatFlags,
    /// Size of the payload in bytes.
    pub payload_size: u32,
    /// CRC32 checksum of the payload.
    pub checksum: u32,
    /// Lexicon size, or the number of materialized weights of a learner.
    pub num_features: u32,
    /// Number of labels (or counted classes, for a lexicon).
    pub num_classes: u32,
}

impl FormatHeader {
    /// Create a new header with the current version.
    pub fn new(model_type: ModelType, num_features: u32, num_classes: u32) -> Self {
        Self {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            model_type,
            flags: FormatFlags::empty(),
            payload_size: 0,
            checksum: 0,
            num_features,
            num_classes,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version_major;
        buf[5] = self.version_minor;
        buf[6] = self.model_type as u8;
        buf[8..10].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[12..16].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf[20..24].copy_from_slice(&self.num_features.to_le_bytes());
        buf[24..28].copy_from_slice(&self.num_classes.to_le_bytes());

        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, DeserializeError> {
        if &buf[0..4] != MAGIC {
            return Err(DeserializeError::NotAModel);
        }

        let version_major = buf[4];
        let version_minor = buf[5];
        if version_major > CURRENT_VERSION_MAJOR {
            return Err(DeserializeError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }

        let model_type = ModelType::from_u8(buf[6])
            .ok_or(DeserializeError::CorruptPayload("invalid model type".into()))?;

        let le32 = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

        Ok(Self {
            version_major,
            version_minor,
            model_type,
            flags: FormatFlags::from_bits(u16::from_le_bytes([buf[8], buf[9]])),
            payload_size: le32(12),
            checksum: le32(16),
            num_features: le32(20),
            num_classes: le32(24),
        })
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during serialization.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    /// A value does not fit its on-disk field.
    #[error("{0} does not fit the native format")]
    TooLarge(&'static str),

    /// The lexicon references a feature it does not hold.
    #[error("inconsistent lexicon: {0}")]
    Inconsistent(String),
}

/// Errors that can occur during deserialization.
#[derive(Debug, Error)]
pub enum DeserializeError {
    /// Wrong magic bytes.
    #[error("not a perceptrons file")]
    NotAModel,

    #[error("file requires format {major}.{minor} or later", major = .major, minor = .minor)]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("file truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Payload is malformed, or decodes to an inconsistent lexicon.
    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoding error: {0}")]
    Decoding(#[from] postcard::Error),

    /// The file holds a different kind of model than requested.
    #[error("model type mismatch: expected {expected:?}, got {actual:?}")]
    TypeMismatch { expected: ModelType, actual: ModelType },
}

// ============================================================================
// CRC32 Helper
// ============================================================================

pub fn compute_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

// ============================================================================
// Native Codec
// ============================================================================

/// Reads and writes the native container.
#[derive(Debug, Clone, Default)]
pub struct NativeCodec;

impl NativeCodec {
    pub fn new() -> Self {
        Self
    }

    /// Write header and payload, filling in the payload size and checksum.
    pub fn write_to<W: Write>(
        &self,
        writer: &mut W,
        header: &mut FormatHeader,
        payload: &[u8],
    ) -> Result<(), SerializeError> {
        header.payload_size =
            u32::try_from(payload.len()).map_err(|_| SerializeError::TooLarge("payload"))?;
        header.checksum = compute_checksum(payload);

        writer.write_all(&header.to_bytes())?;
        writer.write_all(payload)?;
        Ok(())
    }

    /// Read header and payload, verifying the checksum.
    pub fn read_from<R: Read>(&self, reader: &mut R) -> Result<(FormatHeader, Vec<u8>), DeserializeError> {
        let mut header_buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                DeserializeError::Truncated {
                    expected: HEADER_SIZE,
                    actual: 0,
                }
            } else {
                DeserializeError::Io(e)
            }
        })?;

        let header = FormatHeader::from_bytes(&header_buf)?;

        let mut payload = Vec::with_capacity(header.payload_size as usize);
        reader
            .by_ref()
            .take(u64::from(header.payload_size))
            .read_to_end(&mut payload)?;
        if payload.len() < header.payload_size as usize {
            return Err(DeserializeError::Truncated {
                expected: header.payload_size as usize,
                actual: payload.len(),
            });
        }

        let actual_checksum = compute_checksum(&payload);
        if actual_checksum != header.checksum {
            return Err(DeserializeError::ChecksumMismatch {
                expected: header.checksum,
                actual: actual_checksum,
            });
        }

        Ok((header, payload))
    }

    /// Postcard-encode `payload` behind a fresh header.
    pub fn serialize<T: serde::Serialize>(
        &self,
        model_type: ModelType,
        num_features: u32,
        num_classes: u32,
        payload: &T,
    ) -> Result<Vec<u8>, SerializeError> {
        let payload_bytes = postcard::to_allocvec(payload)?;

        let mut header = FormatHeader::new(model_type, num_features, num_classes);
        let mut output = Vec::with_capacity(HEADER_SIZE + payload_bytes.len());
        self.write_to(&mut output, &mut header, &payload_bytes)?;
        Ok(output)
    }

    /// Read a header and a Postcard-encoded payload from bytes.
    pub fn deserialize<T: for<'de> serde::Deserialize<'de>>(
        &self,
        bytes: &[u8],
    ) -> Result<(FormatHeader, T), DeserializeError> {
        let mut cursor = std::io::Cursor::new(bytes);
        let (header, payload_bytes) = self.read_from(&mut cursor)?;
        let payload = postcard::from_bytes(&payload_bytes)?;
        Ok((header, payload))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = FormatHeader {
            version_major: 1,
            version_minor: 2,
            model_type: ModelType::Winnow,
            flags: FormatFlags::from_bits(FormatFlags::PRUNED | FormatFlags::GLOBAL_COUNTS),
            payload_size: 12345,
            checksum: 0xDEADBEEF,
            num_features: 100,
            num_classes: 2,
        };

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(FormatHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn header_wrong_magic() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"BSTR");
        assert!(matches!(FormatHeader::from_bytes(&buf), Err(DeserializeError::NotAModel)));
    }

    #[test]
    fn header_unsupported_version() {
        let mut header = FormatHeader::new(ModelType::Lexicon, 10, 0);
        header.version_major = 99;
        let result = FormatHeader::from_bytes(&header.to_bytes());
        assert!(matches!(
            result,
            Err(DeserializeError::UnsupportedVersion { major: 99, .. })
        ));
    }

    #[test]
    fn codec_write_read_roundtrip() {
        let codec = NativeCodec::new();
        let mut header = FormatHeader::new(ModelType::MulticlassMira, 10, 3);
        let payload = b"test payload data";

        let mut buffer = Vec::new();
        codec.write_to(&mut buffer, &mut header, payload).unwrap();
        let (read_header, read_payload) = codec.read_from(&mut buffer.as_slice()).unwrap();

        assert_eq!(read_header.model_type, ModelType::MulticlassMira);
        assert_eq!(read_header.num_features, 10);
        assert_eq!(read_header.num_classes, 3);
        assert_eq!(read_payload, payload);
    }

    #[test]
    fn codec_detects_corruption() {
        let codec = NativeCodec::new();
        let mut header = FormatHeader::new(ModelType::Perceptron, 5, 2);
        let mut buffer = Vec::new();
        codec.write_to(&mut buffer, &mut header, b"some model data").unwrap();

        buffer[HEADER_SIZE + 5] ^= 0xFF;
        let result = codec.read_from(&mut buffer.as_slice());
        assert!(matches!(result, Err(DeserializeError::ChecksumMismatch { .. })));
    }

    #[test]
    fn codec_detects_truncation() {
        let codec = NativeCodec::new();
        let mut header = FormatHeader::new(ModelType::Perceptron, 5, 2);
        let mut buffer = Vec::new();
        codec.write_to(&mut buffer, &mut header, b"some model data").unwrap();

        buffer.truncate(HEADER_SIZE + 3);
        let result = codec.read_from(&mut buffer.as_slice());
        assert!(matches!(
            result,
            Err(DeserializeError::Truncated { expected: 15, actual: 3 })
        ));
    }

    #[test]
    fn model_type_conversion() {
        assert_eq!(ModelType::from_u8(0), Some(ModelType::Lexicon));
        assert_eq!(ModelType::from_u8(7), Some(ModelType::MulticlassMira));
        assert_eq!(ModelType::from_u8(255), None);
        assert_eq!(ModelType::from(LearnerKind::Winnow), ModelType::Winnow);
    }

    #[test]
    fn flags_operations() {
        let mut flags = FormatFlags::empty();
        flags.set(FormatFlags::HAS_CHILDREN);
        flags.set(FormatFlags::PRUNED);
        assert!(flags.contains(FormatFlags::HAS_CHILDREN));
        flags.clear(FormatFlags::HAS_CHILDREN);
        assert!(!flags.contains(FormatFlags::HAS_CHILDREN));
        assert!(flags.contains(FormatFlags::PRUNED));
    }
}
