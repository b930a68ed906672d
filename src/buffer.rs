//! Bounded accumulation of the upstream body
//!
//! The filter buffers the complete upstream body before converting; this
//! accumulator is the only place those bytes live. It enforces the size
//! budget on every push and never truncates: a chunk that would cross the
//! limit leaves the already-buffered prefix intact and reports the overrun,
//! so the orchestrator can bypass and replay the original bytes.
//!
//! Callers own chunk lifecycle: a chunk handed to [`BodyAccumulator::push`]
//! is copied in full (or rejected in full), so the transport can recycle
//! its buffer immediately after the call returns.

use bytes::Bytes;

use crate::error::ConversionError;

/// Accumulates upstream body chunks under a byte budget.
#[derive(Debug)]
pub struct BodyAccumulator {
    data: Vec<u8>,
    limit: usize,
}

impl BodyAccumulator {
    /// Create an accumulator with the given byte budget.
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
        }
    }

    /// Append a chunk. Fails with `ResourceLimit` when the chunk would push
    /// the total past the budget; in that case nothing is appended.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), ConversionError> {
        if self.data.len() + chunk.len() > self.limit {
            return Err(ConversionError::ResourceLimit(format!(
                "buffered body would exceed {} bytes",
                self.limit
            )));
        }
        self.data.extend_from_slice(chunk);
        Ok(())
    }

    /// Bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Remaining budget in bytes.
    pub fn remaining(&self) -> usize {
        self.limit - self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the accumulator, yielding the exact byte sequence that was
    /// pushed (bit-for-bit, in order).
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }
}
