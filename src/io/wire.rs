//! Little-endian primitives for the lexicon record format.

use super::DeserializeError;

/// Length prefix meaning "same bytes as the previous record".
pub(crate) const SAME_AS_PREVIOUS: u32 = u32::MAX;

#[derive(Debug, Default)]
pub(crate) struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.u32(v.len() as u32);
        self.buf.extend_from_slice(v);
    }

    /// Write `v`, or only the marker when it equals `previous`.
    pub fn delta_bytes(&mut self, v: &[u8], previous: Option<&[u8]>) {
        if previous == Some(v) {
            self.u32(SAME_AS_PREVIOUS);
        } else {
            self.bytes(v);
        }
    }
}

pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DeserializeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(DeserializeError::Truncated {
                expected: self.pos.saturating_add(n),
                actual: self.buf.len(),
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DeserializeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DeserializeError> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> Result<u32, DeserializeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, DeserializeError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64, DeserializeError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, DeserializeError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Inverse of [`ByteWriter::bytes`].
    pub fn bytes(&mut self) -> Result<Vec<u8>, DeserializeError> {
        let n = self.u32()?;
        Ok(self.take(n as usize)?.to_vec())
    }

    /// Length of a collection about to be read; rejects lengths the
    /// remaining input cannot possibly hold.
    pub fn count(&mut self, min_item_size: usize) -> Result<usize, DeserializeError> {
        let n = self.u32()? as usize;
        let remaining = self.buf.len() - self.pos;
        if n.saturating_mul(min_item_size.max(1)) > remaining {
            return Err(DeserializeError::CorruptPayload(format!(
                "collection of {n} items cannot fit in {remaining} bytes"
            )));
        }
        Ok(n)
    }

    /// Inverse of [`ByteWriter::delta_bytes`].
    pub fn delta_bytes(&mut self, previous: Option<&[u8]>) -> Result<Vec<u8>, DeserializeError> {
        let n = self.u32()?;
        if n == SAME_AS_PREVIOUS {
            return previous.map(<[u8]>::to_vec).ok_or_else(|| {
                DeserializeError::CorruptPayload("first record refers to a previous one".into())
            });
        }
        Ok(self.take(n as usize)?.to_vec())
    }
}
