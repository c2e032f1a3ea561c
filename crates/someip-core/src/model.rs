//! Shared routing domain types: the tables a routing manager and a Service
//! Discovery engine both need a common vocabulary for (§3, §4.5, §4.6).

use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
};

use someip_proto::ids::{
    ClientId, EventgroupId, InstanceId, MajorVersion, MinorVersion, ServiceId, ANY_INSTANCE,
};

/// `(service_id, instance_id)`, the key every offer/request/subscription is
/// indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    /// Service identifier.
    pub service_id: ServiceId,
    /// Instance identifier.
    pub instance_id: InstanceId,
}

impl ServiceKey {
    /// Build a key.
    #[must_use]
    pub fn new(service_id: ServiceId, instance_id: InstanceId) -> Self {
        Self { service_id, instance_id }
    }
}

/// `(service_id, instance_id, eventgroup_id)`, the key a subscription is
/// indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventgroupKey {
    /// Owning service.
    pub service: ServiceKey,
    /// Eventgroup identifier within that service.
    pub eventgroup_id: EventgroupId,
}

/// The reachable transport endpoints for one offered service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    /// Reliable (TCP) endpoint, if the service offers one.
    pub reliable: Option<SocketAddr>,
    /// Unreliable (UDP) endpoint, if the service offers one.
    pub unreliable: Option<SocketAddr>,
}

impl ServiceEndpoints {
    /// True if neither transport is offered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reliable.is_none() && self.unreliable.is_none()
    }
}

/// Everything known about one offered service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Interface major version.
    pub major_version: MajorVersion,
    /// Interface minor version.
    pub minor_version: MinorVersion,
    /// Where the service can be reached.
    pub endpoints: ServiceEndpoints,
}

/// A table of offered (or discovered) services, keyed by `(service,
/// instance)` with wildcard-instance lookup support.
///
/// Mirrors the `ANY_INSTANCE` matching rule in §4.6: a `FindService` for
/// `(service, 0xFFFF)` must match any instance of that service.
#[derive(Debug, Clone, Default)]
pub struct ServiceTable {
    entries: HashMap<ServiceKey, ServiceInfo>,
}

impl ServiceTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: ServiceKey, info: ServiceInfo) {
        self.entries.insert(key, info);
    }

    /// Remove an entry, returning it if present.
    pub fn remove(&mut self, key: ServiceKey) -> Option<ServiceInfo> {
        self.entries.remove(&key)
    }

    /// Exact-key lookup.
    #[must_use]
    pub fn get(&self, key: ServiceKey) -> Option<&ServiceInfo> {
        self.entries.get(&key)
    }

    /// Look up `(service_id, instance_id)`, treating `instance_id ==
    /// ANY_INSTANCE` as a wildcard that matches the first known instance.
    #[must_use]
    pub fn find(&self, service_id: ServiceId, instance_id: InstanceId) -> Option<(ServiceKey, &ServiceInfo)> {
        if instance_id == ANY_INSTANCE {
            self.entries
                .iter()
                .find(|(key, _)| key.service_id == service_id)
                .map(|(key, info)| (*key, info))
        } else {
            let key = ServiceKey::new(service_id, instance_id);
            self.entries.get(&key).map(|info| (key, info))
        }
    }

    /// Iterate all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&ServiceKey, &ServiceInfo)> {
        self.entries.iter()
    }

    /// Number of offered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no instances are offered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The set of clients subscribed to one eventgroup, each remembered with the
/// endpoint notifications should be sent to.
#[derive(Debug, Clone, Default)]
pub struct EventgroupTable {
    subscribers: HashMap<EventgroupKey, HashMap<ClientId, SocketAddr>>,
}

impl EventgroupTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self { subscribers: HashMap::new() }
    }

    /// Record that `client_id` subscribed to `key`, to be notified at
    /// `endpoint`. Replaces any prior subscription from the same client.
    pub fn subscribe(&mut self, key: EventgroupKey, client_id: ClientId, endpoint: SocketAddr) {
        self.subscribers.entry(key).or_default().insert(client_id, endpoint);
    }

    /// Remove `client_id`'s subscription to `key`.
    pub fn unsubscribe(&mut self, key: EventgroupKey, client_id: ClientId) {
        if let Some(subs) = self.subscribers.get_mut(&key) {
            subs.remove(&client_id);
            if subs.is_empty() {
                self.subscribers.remove(&key);
            }
        }
    }

    /// Remove every subscription for `key` (used when the offering service
    /// withdraws, §4.6).
    pub fn clear_eventgroup(&mut self, key: EventgroupKey) {
        self.subscribers.remove(&key);
    }

    /// Remove every subscription to any eventgroup of `service` (used when
    /// the whole service withdraws or its offering application detaches).
    pub fn clear_service(&mut self, service: ServiceKey) {
        self.subscribers.retain(|key, _| key.service != service);
    }

    /// Current subscriber endpoints for `key`.
    pub fn subscribers(&self, key: EventgroupKey) -> impl Iterator<Item = SocketAddr> + '_ {
        self.subscribers.get(&key).into_iter().flat_map(|subs| subs.values().copied())
    }

    /// True if `client_id` currently subscribes to `key`.
    #[must_use]
    pub fn is_subscribed(&self, key: EventgroupKey, client_id: ClientId) -> bool {
        self.subscribers.get(&key).is_some_and(|subs| subs.contains_key(&client_id))
    }
}

/// Local applications currently attached to this routing manager, keyed by
/// their `client_id` (§4.4, §4.5).
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: HashSet<ClientId>,
}

impl ClientRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { clients: HashSet::new() }
    }

    /// Register a client as attached.
    pub fn register(&mut self, client_id: ClientId) {
        self.clients.insert(client_id);
    }

    /// Remove a client, e.g. on disconnect.
    pub fn deregister(&mut self, client_id: ClientId) {
        self.clients.remove(&client_id);
    }

    /// True if `client_id` is currently attached.
    #[must_use]
    pub fn is_registered(&self, client_id: ClientId) -> bool {
        self.clients.contains(&client_id)
    }

    /// Number of attached clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// True if no clients are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn endpoints() -> ServiceEndpoints {
        ServiceEndpoints { reliable: None, unreliable: Some("127.0.0.1:30509".parse().unwrap()) }
    }

    #[test]
    fn any_instance_matches_first_known_instance() {
        let mut table = ServiceTable::new();
        let key = ServiceKey::new(0x1234, 0x0001);
        table.insert(
            key,
            ServiceInfo { major_version: 1, minor_version: 0, endpoints: endpoints() },
        );

        let found = table.find(0x1234, ANY_INSTANCE);
        assert_eq!(found.map(|(k, _)| k), Some(key));
    }

    #[test]
    fn exact_instance_lookup_ignores_other_instances() {
        let mut table = ServiceTable::new();
        table.insert(
            ServiceKey::new(0x1234, 0x0001),
            ServiceInfo { major_version: 1, minor_version: 0, endpoints: endpoints() },
        );
        assert!(table.find(0x1234, 0x0002).is_none());
    }

    #[test]
    fn eventgroup_subscription_roundtrip() {
        let mut table = EventgroupTable::new();
        let key = EventgroupKey { service: ServiceKey::new(1, 1), eventgroup_id: 0x10 };
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        table.subscribe(key, 5, addr);
        assert!(table.is_subscribed(key, 5));
        assert_eq!(table.subscribers(key).collect::<Vec<_>>(), vec![addr]);

        table.unsubscribe(key, 5);
        assert!(!table.is_subscribed(key, 5));
        assert_eq!(table.subscribers(key).count(), 0);
    }
}
