//! Protocol error types.

use thiserror::Error;

/// Errors produced while encoding or decoding wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer than the 4 header bytes were available.
    #[error("short buffer: need {needed} bytes, have {available}")]
    ShortBuffer {
        /// Bytes required to make progress.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The header claims more payload than the buffer holds.
    #[error("truncated packet: header claims {expected} payload bytes, buffer holds {actual}")]
    Truncated {
        /// Payload length claimed by the header.
        expected: usize,
        /// Payload bytes actually present.
        actual: usize,
    },

    /// Payload exceeds the 16-bit length field.
    #[error("payload too large: {size} bytes exceeds maximum of {max}")]
    PayloadTooLarge {
        /// Offending payload size.
        size: usize,
        /// Maximum encodable size.
        max: usize,
    },

    /// A JSON payload failed to serialize or deserialize.
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson(err.to_string())
    }
}
