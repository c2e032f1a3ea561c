//! Errors produced while encoding or decoding wire bytes.
//!
//! Mirrors the source distinction between structural failures (truncated
//! buffer, payload larger than declared) and semantic ones (an SD entry that
//! references an out-of-range option). We avoid `std::io::Error` here for the
//! same reason the rest of the stack does: protocol failures are not I/O
//! failures, and callers need to match on the specific cause.

use thiserror::Error;

use crate::enums::ReturnCode;

/// Convenience alias for results returned by codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while serializing or deserializing SOME/IP wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes remained than the field being read requires.
    #[error("buffer underrun: needed {needed} bytes, {remaining} remaining")]
    BufferUnderrun {
        /// Bytes required to complete the read.
        needed: usize,
        /// Bytes actually left in the input.
        remaining: usize,
    },

    /// The fixed header's `length` field does not match payload size.
    #[error("header length mismatch: header claims {claimed}, frame carries {actual}")]
    LengthMismatch {
        /// Value of the header's `length` field.
        claimed: u32,
        /// `8 + payload.len()` as actually observed.
        actual: u32,
    },

    /// An SD entry's (option_index, option_count) pair falls outside the
    /// message's option array.
    #[error("entry references out-of-range options: index {index}, count {count}, have {available}")]
    OptionIndexOutOfRange {
        /// First referenced option index.
        index: u16,
        /// Number of options referenced starting at `index`.
        count: u8,
        /// Total options available in the message.
        available: usize,
    },

    /// A declared length field (entries_length, options_length, payload
    /// length) does not evenly divide into the fixed-size records it bounds,
    /// or exceeds the bytes actually available.
    #[error("malformed length field: {0}")]
    MalformedLength(String),

    /// Generic catch-all for structurally invalid input that doesn't fit a
    /// more specific variant above; used by fuzz-discovered edge cases and
    /// preserved so callers can still branch on it.
    #[error("malformed message: {0}")]
    Malformed(String),
}

impl ProtocolError {
    /// The SOME/IP `return_code` a routing manager should answer with when
    /// this error surfaces while handling an inbound request.
    #[must_use]
    pub fn return_code(&self) -> ReturnCode {
        ReturnCode::MalformedMessage
    }
}
