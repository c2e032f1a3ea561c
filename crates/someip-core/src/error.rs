//! Routing-layer error types.
//!
//! Distinct from [`someip_proto::ProtocolError`]: that crate reports wire
//! failures (a frame couldn't be parsed), this one reports routing failures
//! (a frame parsed fine but there's nowhere to send it). Keeping them
//! separate means a caller can always match on "is this a framing bug or a
//! topology problem" without string-matching.

use someip_proto::ReturnCode;
use thiserror::Error;

/// Errors raised while routing a message between local applications and
/// remote endpoints.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// No application has offered `(service_id, instance_id)`.
    #[error("service {service_id:#06x}:{instance_id:#06x} is not offered")]
    UnknownService {
        /// The requested service.
        service_id: u16,
        /// The requested instance.
        instance_id: u16,
    },

    /// The service is known but does not expose `method_id`.
    #[error("service {service_id:#06x} has no method {method_id:#06x}")]
    UnknownMethod {
        /// The requested service.
        service_id: u16,
        /// The requested method.
        method_id: u16,
    },

    /// `client_id` has no registered connection to deliver to.
    #[error("client {client_id:#06x} is not registered")]
    UnknownClient {
        /// The client that could not be reached.
        client_id: u16,
    },

    /// A frame arrived whose wire bytes did not parse.
    #[error("malformed frame: {0}")]
    Protocol(#[from] someip_proto::ProtocolError),

    /// The underlying transport failed to deliver a frame.
    #[error("transport error: {0}")]
    Transport(String),

    /// Session-id space for a `(client_id, message_id)` pair is exhausted
    /// (practically unreachable at `u16` width, but kept as a checked error
    /// rather than a panic).
    #[error("session id space exhausted for client {client_id:#06x}")]
    SessionIdsExhausted {
        /// The client whose session-id counter wrapped without finding a
        /// free (non-zero) value.
        client_id: u16,
    },
}

impl RoutingError {
    /// The SOME/IP `return_code` that should be sent back to a requester
    /// when this error prevents delivery of a `REQUEST` (§4.5, §7).
    #[must_use]
    pub fn return_code(&self) -> ReturnCode {
        match self {
            Self::UnknownService { .. } => ReturnCode::UnknownService,
            Self::UnknownMethod { .. } => ReturnCode::UnknownMethod,
            Self::UnknownClient { .. } => ReturnCode::NotReachable,
            Self::Protocol(err) => err.return_code(),
            Self::Transport(_) => ReturnCode::NotReachable,
            Self::SessionIdsExhausted { .. } => ReturnCode::NotReady,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_service_maps_to_unknown_service_return_code() {
        let err = RoutingError::UnknownService { service_id: 1, instance_id: 1 };
        assert_eq!(err.return_code(), ReturnCode::UnknownService);
    }
}
