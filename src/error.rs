//! Error taxonomy for the filter and the conversion engine
//!
//! Every failure inside the crate is one of the kinds below. Components
//! return them explicitly; nothing in the pipeline unwinds. The orchestrator
//! maps a kind to either a fail-open replay of the original response or a
//! fail-closed 502, depending on the configured error strategy. Kind details
//! (messages, byte offsets) are for logs only and never reach clients.

use thiserror::Error;

/// Errors that can occur while buffering, decompressing, or converting an
/// upstream response.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Cooperative conversion deadline exceeded
    #[error("conversion timeout exceeded")]
    Timeout,
    /// Non-UTF-8 input or unsupported charset
    #[error("encoding error: {0}")]
    Encoding(String),
    /// Nesting-depth overrun or otherwise unparseable document
    #[error("structure error: {0}")]
    Structure(String),
    /// Corrupt or oversized compressed stream
    #[error("decompression error: {0}")]
    Decompress(String),
    /// Accumulated body would exceed the configured size limit
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),
    /// Unclassified failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConversionError {
    /// Stable category label used in structured log records.
    pub fn category(&self) -> &'static str {
        match self {
            ConversionError::Timeout => "timeout",
            ConversionError::Encoding(_) => "encoding",
            ConversionError::Structure(_) => "structure",
            ConversionError::Decompress(_) => "decompress",
            ConversionError::ResourceLimit(_) => "resource_limit",
            ConversionError::Internal(_) => "internal",
        }
    }
}
