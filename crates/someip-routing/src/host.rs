//! The routing host: the one process per machine that owns the shared
//! service/eventgroup tables and assigns client ids to attaching
//! applications (§4.5). Every other process on the host is a
//! [`proxy`](crate::proxy) that forwards through it.

use std::{collections::HashMap, net::SocketAddr};

use someip_core::{
    ClientRegistry, EventgroupKey, EventgroupTable, RoutingError, ServiceInfo, ServiceKey, ServiceTable,
};
use someip_proto::{
    ids::{ClientId, EventId, EventgroupId, ServiceId},
    message::SomeipMessage,
};

use crate::{
    dispatch::{self, LocalOwners, ReplyPath, RoutingAction},
    session::SessionAllocator,
};

/// The first client id handed out; `0` is reserved for Service Discovery
/// and routing-manager-internal traffic.
const FIRST_CLIENT_ID: ClientId = 0x0001;
/// One past the last assignable client id (§4.5: range `1..0xFFFE`).
const CLIENT_ID_LIMIT: ClientId = 0xFFFE;

/// Owns the routing tables for one host: offered services (local and
/// remote), eventgroup subscribers, attached applications, and outbound
/// session-id counters.
pub struct RoutingManagerHost {
    clients: ClientRegistry,
    next_client_id: ClientId,
    services: ServiceTable,
    local_owners: LocalOwners,
    eventgroups: EventgroupTable,
    event_routes: HashMap<(ServiceId, EventId), EventgroupId>,
    sessions: SessionAllocator,
}

impl Default for RoutingManagerHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingManagerHost {
    /// An empty host with no attached applications or offered services.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: ClientRegistry::new(),
            next_client_id: FIRST_CLIENT_ID,
            services: ServiceTable::new(),
            local_owners: LocalOwners::new(),
            eventgroups: EventgroupTable::new(),
            event_routes: HashMap::new(),
            sessions: SessionAllocator::new(),
        }
    }

    /// Attach a new application, assigning it the next free client id
    /// (monotonic, colliding ids rerolled, range `1..0xFFFE`).
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::SessionIdsExhausted`] if every id in range is
    /// already attached (a host-wide application-count ceiling, not a
    /// session-id exhaustion in the usual sense, but the same "out of ids"
    /// shape).
    pub fn register_application(&mut self) -> Result<ClientId, RoutingError> {
        let start = self.next_client_id;
        loop {
            let candidate = self.next_client_id;
            self.next_client_id =
                if self.next_client_id >= CLIENT_ID_LIMIT { FIRST_CLIENT_ID } else { self.next_client_id + 1 };
            if !self.clients.is_registered(candidate) {
                self.clients.register(candidate);
                return Ok(candidate);
            }
            if self.next_client_id == start {
                return Err(RoutingError::SessionIdsExhausted { client_id: candidate });
            }
        }
    }

    /// Detach `client_id`, withdrawing every service it offered and
    /// dropping its eventgroup subscriptions.
    pub fn deregister_application(&mut self, client_id: ClientId) {
        self.clients.deregister(client_id);
        for key in self.local_owners.remove_all_for(client_id) {
            self.services.remove(key);
            self.eventgroups.clear_service(key);
        }
    }

    /// Record that `client_id` now offers `key`.
    pub fn offer_service(&mut self, client_id: ClientId, key: ServiceKey, info: ServiceInfo) {
        self.local_owners.insert(key, client_id);
        self.services.insert(key, info);
    }

    /// Withdraw a locally offered service.
    pub fn stop_offer_service(&mut self, key: ServiceKey) {
        self.local_owners.remove(key);
        self.services.remove(key);
        self.eventgroups.clear_service(key);
    }

    /// Record that a remote peer offers `key`, discovered via Service
    /// Discovery rather than a local application.
    pub fn learn_remote_service(&mut self, key: ServiceKey, info: ServiceInfo) {
        self.services.insert(key, info);
    }

    /// Withdraw a remote service whose offer expired or was cancelled.
    pub fn forget_remote_service(&mut self, key: ServiceKey) {
        if self.local_owners.find(key.service_id, key.instance_id).is_none() {
            self.services.remove(key);
        }
    }

    /// Record that `event_id` on `service_id` belongs to `eventgroup_id`,
    /// so an inbound notification for that event fans out to the
    /// eventgroup's subscribers.
    pub fn register_event(&mut self, service_id: ServiceId, event_id: EventId, eventgroup_id: EventgroupId) {
        self.event_routes.insert((service_id, event_id), eventgroup_id);
    }

    /// Record that `client_id` subscribed to `key`, to be notified at
    /// `endpoint`.
    pub fn subscribe(&mut self, key: EventgroupKey, client_id: ClientId, endpoint: SocketAddr) {
        self.eventgroups.subscribe(key, client_id, endpoint);
    }

    /// Remove `client_id`'s subscription to `key`.
    pub fn unsubscribe(&mut self, key: EventgroupKey, client_id: ClientId) {
        self.eventgroups.unsubscribe(key, client_id);
    }

    /// Allocate the next session id for a request `client_id` is about to
    /// send to `message_id`.
    pub fn next_session(&mut self, client_id: ClientId, message_id: u32) -> someip_proto::ids::SessionId {
        self.sessions.next(client_id, message_id)
    }

    /// Route a message `from` a local application to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::UnknownService`] if `target` is neither
    /// locally offered nor known from Service Discovery, or
    /// [`RoutingError::Transport`] if the known offer advertises no usable
    /// endpoint.
    pub fn route_outbound(&self, target: ServiceKey, message: SomeipMessage) -> Result<RoutingAction, RoutingError> {
        dispatch::route_outbound(&self.services, &self.local_owners, target, message)
    }

    /// Route a message arriving from `reply_to`, per the inbound pipeline
    /// in §4.5: unknown-service error synthesis, eventgroup fan-out, or
    /// delivery to the owning local application.
    pub fn route_inbound(&self, message: SomeipMessage, reply_to: ReplyPath) -> Vec<RoutingAction> {
        dispatch::route_inbound(&self.local_owners, &self.eventgroups, &self.event_routes, message, reply_to)
    }

    /// Services currently known (local or remote).
    #[must_use]
    pub fn services(&self) -> &ServiceTable {
        &self.services
    }

    /// True if `client_id` is currently attached.
    #[must_use]
    pub fn is_registered(&self, client_id: ClientId) -> bool {
        self.clients.is_registered(client_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use someip_core::ServiceEndpoints;
    use someip_proto::enums::{MessageType, ReturnCode};

    use super::*;

    #[test]
    fn register_application_assigns_monotonic_ids() {
        let mut host = RoutingManagerHost::new();
        assert_eq!(host.register_application().unwrap(), 1);
        assert_eq!(host.register_application().unwrap(), 2);
    }

    #[test]
    fn deregister_withdraws_offered_services() {
        let mut host = RoutingManagerHost::new();
        let client_id = host.register_application().unwrap();
        let key = ServiceKey::new(0x1234, 1);
        host.offer_service(
            client_id,
            key,
            ServiceInfo { major_version: 1, minor_version: 0, endpoints: ServiceEndpoints { reliable: None, unreliable: None } },
        );
        assert!(host.services().get(key).is_some());

        host.deregister_application(client_id);
        assert!(host.services().get(key).is_none());
    }

    #[test]
    fn outbound_request_to_offered_service_delivers_locally() {
        let mut host = RoutingManagerHost::new();
        let server = host.register_application().unwrap();
        let key = ServiceKey::new(0x1234, 1);
        host.offer_service(
            server,
            key,
            ServiceInfo { major_version: 1, minor_version: 0, endpoints: ServiceEndpoints { reliable: None, unreliable: None } },
        );

        let request = SomeipMessage::new(0x1234, 1, 2, 1, 1, MessageType::Request, ReturnCode::Ok, Vec::new());
        let action = host.route_outbound(key, request).unwrap();
        assert_eq!(action, RoutingAction::Deliver { client_id: server, message: SomeipMessage::new(0x1234, 1, 2, 1, 1, MessageType::Request, ReturnCode::Ok, Vec::new()) });
    }
}
