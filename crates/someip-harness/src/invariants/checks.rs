//! Standard invariant checks for a simulated node's discovery and routing
//! state.

use super::{Invariant, InvariantResult, NodeSnapshot, Violation};

/// Every service the SD engine believes is discovered must advertise at
/// least one transport endpoint.
///
/// An `OfferService` entry with neither a reliable nor an unreliable option
/// attached is unusable and should never have produced a
/// `ServiceAvailable` event in the first place (§4.6).
pub struct DiscoveredServicesHaveEndpoint;

impl Invariant for DiscoveredServicesHaveEndpoint {
    fn name(&self) -> &'static str {
        "discovered_services_have_endpoint"
    }

    fn check(&self, snapshot: &NodeSnapshot) -> InvariantResult {
        for (key, info) in &snapshot.discovered {
            if info.endpoints.is_empty() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{key:?} discovered with no reliable or unreliable endpoint"),
                });
            }
        }
        Ok(())
    }
}

/// Every service the SD engine has discovered must also be known to the
/// routing host.
///
/// A driver is expected to call `RoutingManagerHost::learn_remote_service`
/// for every `SdEvent::ServiceAvailable` it receives (§4.5); if discovery
/// and routing ever disagree, outbound requests to a "discovered" service
/// would incorrectly fail with `UnknownService`.
pub struct DiscoveredServicesAreKnownToHost;

impl Invariant for DiscoveredServicesAreKnownToHost {
    fn name(&self) -> &'static str {
        "discovered_services_are_known_to_host"
    }

    fn check(&self, snapshot: &NodeSnapshot) -> InvariantResult {
        for (key, _info) in &snapshot.discovered {
            if !snapshot.known.iter().any(|(known_key, _)| known_key == key) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{key:?} discovered by SD but absent from the routing host's service table"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use someip_core::model::{ServiceEndpoints, ServiceInfo, ServiceKey};

    use super::*;

    fn key() -> ServiceKey {
        ServiceKey::new(0x1234, 1)
    }

    #[test]
    fn endpointless_discovery_is_flagged() {
        let info = ServiceInfo {
            major_version: 1,
            minor_version: 0,
            endpoints: ServiceEndpoints { reliable: None, unreliable: None },
        };
        let snapshot = NodeSnapshot { discovered: vec![(key(), info)], known: Vec::new() };
        assert!(DiscoveredServicesHaveEndpoint.check(&snapshot).is_err());
    }

    #[test]
    fn discovery_known_to_host_holds_when_tables_agree() {
        let info = ServiceInfo {
            major_version: 1,
            minor_version: 0,
            endpoints: ServiceEndpoints { reliable: None, unreliable: Some("127.0.0.1:30509".parse().unwrap()) },
        };
        let snapshot = NodeSnapshot { discovered: vec![(key(), info.clone())], known: vec![(key(), info)] };
        assert!(DiscoveredServicesAreKnownToHost.check(&snapshot).is_ok());
    }

    #[test]
    fn discovery_without_host_knowledge_is_flagged() {
        let info = ServiceInfo {
            major_version: 1,
            minor_version: 0,
            endpoints: ServiceEndpoints { reliable: None, unreliable: Some("127.0.0.1:30509".parse().unwrap()) },
        };
        let snapshot = NodeSnapshot { discovered: vec![(key(), info)], known: Vec::new() };
        assert!(DiscoveredServicesAreKnownToHost.check(&snapshot).is_err());
    }
}
