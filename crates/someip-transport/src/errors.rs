//! Transport-layer errors.
//!
//! Distinct from [`someip_core::RoutingError`]: these never cross the wire
//! and never reach an application's message handler — they describe why a
//! socket stopped working, which the reconnect/accept loops act on directly.

use thiserror::Error;

/// Errors raised by a TCP, UDP, or local-IPC endpoint.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The underlying socket operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame on the wire did not parse.
    #[error("protocol error: {0}")]
    Protocol(#[from] someip_proto::ProtocolError),

    /// A UDP datagram (or single local-IPC message) exceeded the
    /// configured maximum size and was dropped rather than fragmented.
    #[error("message of {size} bytes exceeds the {limit}-byte datagram limit")]
    MessageTooLarge {
        /// Actual encoded size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The peer closed the connection (or the local channel was dropped).
    #[error("connection closed")]
    Closed,

    /// A local-IPC envelope carried a command-id byte this implementation
    /// does not recognize.
    #[error("unknown local command id {0:#04x}")]
    UnknownLocalCommand(u8),
}
