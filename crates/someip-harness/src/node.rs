//! A single simulated SOME/IP node: a routing host and a Service Discovery
//! engine sharing one virtual clock, wired together the same way
//! `someip-server`'s daemon wires its own `RoutingManagerHost` and
//! `SdEngine` — but driven by hand, with no sockets involved, so a test can
//! step time and inspect the result deterministically.

use std::time::Duration;

use someip_core::model::{ServiceKey, ServiceTable};
use someip_core::Environment;
use someip_routing::RoutingManagerHost;
use someip_sd::{SdAction, SdEngine, SdEvent};

use crate::sim_env::{SimEnv, VirtualInstant};

/// One simulated node: owns a routing host and an SD engine, both driven by
/// the same [`SimEnv`].
pub struct SimNode {
    /// The node's virtual-time environment.
    pub env: SimEnv,
    /// The node's routing tables.
    pub host: RoutingManagerHost,
    /// The node's Service Discovery engine.
    pub sd: SdEngine<VirtualInstant>,
}

impl SimNode {
    /// A fresh node seeded with `seed`, with SD's reboot flag set as given
    /// and the supplied initial offer/find delay.
    #[must_use]
    pub fn new(seed: u64, reboot: bool, initial_delay: Duration) -> Self {
        Self {
            env: SimEnv::with_seed(seed),
            host: RoutingManagerHost::new(),
            sd: SdEngine::new(reboot, initial_delay),
        }
    }

    /// Advance the virtual clock by `duration`, then poll the SD engine for
    /// anything due at the new time.
    pub fn advance_and_tick(&mut self, duration: Duration) -> (Vec<SdAction>, Vec<SdEvent>) {
        self.env.advance(duration);
        self.sd.tick(self.env.now())
    }

    /// Apply an [`SdEvent`] to the routing host the same way
    /// `someip-server`'s daemon does: learn or forget a discovered service.
    pub fn apply(&mut self, event: &SdEvent) {
        match event {
            SdEvent::ServiceAvailable { key, info } => self.host.learn_remote_service(*key, info.clone()),
            SdEvent::ServiceUnavailable { key } => self.host.forget_remote_service(*key),
            SdEvent::Subscribed { key, client_id, endpoint } => self.host.subscribe(*key, *client_id, *endpoint),
            SdEvent::Unsubscribed { key, client_id } => self.host.unsubscribe(*key, *client_id),
            SdEvent::SubscriptionAccepted { .. } | SdEvent::SubscriptionRejected { .. } => {},
        }
    }

    /// Snapshot of everything observable about this node right now.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            discovered: clone_table(self.sd.discovered()),
            known: clone_table(self.host.services()),
        }
    }
}

fn clone_table(table: &ServiceTable) -> Vec<(ServiceKey, someip_core::model::ServiceInfo)> {
    table.iter().map(|(key, info)| (*key, info.clone())).collect()
}

/// A point-in-time view of one node's routing and discovery state, for
/// invariant checking.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Services the SD engine currently believes are reachable.
    pub discovered: Vec<(ServiceKey, someip_core::model::ServiceInfo)>,
    /// Services the routing host currently knows about (local or remote).
    pub known: Vec<(ServiceKey, someip_core::model::ServiceInfo)>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use someip_core::model::{ServiceEndpoints, ServiceInfo};

    use super::*;

    #[test]
    fn offering_then_ticking_produces_a_multicast_offer() {
        let mut node = SimNode::new(1, false, Duration::from_millis(10));
        let key = ServiceKey::new(0x1234, 1);
        let info = ServiceInfo {
            major_version: 1,
            minor_version: 0,
            endpoints: ServiceEndpoints { reliable: None, unreliable: Some("127.0.0.1:30509".parse().unwrap()) },
        };
        node.sd.offer_service(key, info, node.env.now());

        let (actions, _events) = node.advance_and_tick(Duration::from_millis(10));
        assert_eq!(actions.len(), 1);
    }
}
