//! Persistence.
//!
//! Lexicons and learners share one container: a fixed header followed by a
//! checksummed payload (see [`native`]). Learner payloads are Postcard-encoded
//! serde values; lexicons use a compact record format with delta-encoded
//! strings. [`dump`] renders a lexicon as text for inspection.

pub mod dump;
mod lexicon;
pub mod native;
pub mod payload;
mod wire;

pub use dump::{lexicon_dump, write_lexicon_dump};
pub use native::{
    DeserializeError, FormatFlags, FormatHeader, ModelType, NativeCodec, SerializeError,
};
pub use payload::{ModelMetadata, ModelPayload, Payload, PayloadV1, PersistLearner};
