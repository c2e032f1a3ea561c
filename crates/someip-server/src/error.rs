//! Daemon-level error kinds and their process exit codes (§6, §7).
//!
//! Only the five kinds §6 singles out as distinct exit codes live here;
//! per-message error kinds (`UnknownService`, `WrongProtocolVersion`, …) are
//! represented on the wire as SOME/IP `return_code`s and never abort the
//! process (§7's "surface through availability handlers" policy).

use thiserror::Error;

/// Fatal daemon startup/configuration errors, each mapped to a distinct
/// non-zero exit code.
#[derive(Debug, Error)]
pub enum ServerError {
    /// No configuration was supplied at all.
    #[error("no configuration supplied")]
    ConfigurationMissing,

    /// A service is configured without any usable reliable or unreliable
    /// port.
    #[error("service {service_id:#06x} has no reliable or unreliable port configured")]
    PortConfigurationMissing {
        /// The service missing port configuration.
        service_id: u16,
    },

    /// Binding or connecting a client-side (local IPC) endpoint failed.
    #[error("failed to create client endpoint: {0}")]
    ClientEndpointCreationFailed(#[source] someip_transport::TransportError),

    /// Binding a server-side (TCP/UDP) endpoint failed.
    #[error("failed to create server endpoint: {0}")]
    ServerEndpointCreationFailed(#[source] someip_transport::TransportError),

    /// A service was offered with properties (major version, reliability)
    /// inconsistent with its configuration.
    #[error("service {service_id:#06x} offered with properties that do not match its configuration")]
    ServicePropertyMismatch {
        /// The service whose offered properties mismatched.
        service_id: u16,
    },
}

impl ServerError {
    /// The process exit code this error maps to (§6: "non-zero for
    /// configuration-missing, port-configuration-missing,
    /// client-endpoint-creation-failed, server-endpoint-creation-failed,
    /// service-property-mismatch").
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigurationMissing => 1,
            Self::PortConfigurationMissing { .. } => 2,
            Self::ClientEndpointCreationFailed(_) => 3,
            Self::ServerEndpointCreationFailed(_) => 4,
            Self::ServicePropertyMismatch { .. } => 5,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let errors = [
            ServerError::ConfigurationMissing,
            ServerError::PortConfigurationMissing { service_id: 1 },
            ServerError::ClientEndpointCreationFailed(someip_transport::TransportError::Closed),
            ServerError::ServerEndpointCreationFailed(someip_transport::TransportError::Closed),
            ServerError::ServicePropertyMismatch { service_id: 1 },
        ];
        let codes: Vec<i32> = errors.iter().map(ServerError::exit_code).collect();
        assert!(codes.iter().all(|&c| c != 0));
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
