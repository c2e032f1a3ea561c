//! Pure routing decisions: given the current tables, decide what to do with
//! one message (§4.5). [`RoutingManagerHost`](crate::host::RoutingManagerHost)
//! owns the tables and mutable state; this module holds the algorithm so it
//! can be exercised without any I/O.

use std::{collections::HashMap, net::SocketAddr};

use someip_core::{EventgroupKey, EventgroupTable, RoutingError, ServiceKey, ServiceTable};
use someip_proto::{
    enums::MessageType,
    ids::{ClientId, EventId, EventgroupId, InstanceId, ServiceId, ANY_INSTANCE},
    message::SomeipMessage,
};

/// Local applications that currently offer a service, keyed the same way
/// [`ServiceTable`] is so `ANY_INSTANCE` wildcard matching stays consistent.
#[derive(Debug, Clone, Default)]
pub struct LocalOwners {
    owners: HashMap<ServiceKey, ClientId>,
}

impl LocalOwners {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self { owners: HashMap::new() }
    }

    /// Record that `client_id` offers `key` locally.
    pub fn insert(&mut self, key: ServiceKey, client_id: ClientId) {
        self.owners.insert(key, client_id);
    }

    /// Remove a local offer.
    pub fn remove(&mut self, key: ServiceKey) -> Option<ClientId> {
        self.owners.remove(&key)
    }

    /// Drop every service owned by `client_id`, e.g. on disconnect.
    pub fn remove_all_for(&mut self, client_id: ClientId) -> Vec<ServiceKey> {
        let dropped: Vec<ServiceKey> =
            self.owners.iter().filter(|(_, owner)| **owner == client_id).map(|(key, _)| *key).collect();
        for key in &dropped {
            self.owners.remove(key);
        }
        dropped
    }

    /// Resolve `(service_id, instance_id)` to the owning client, honoring
    /// `ANY_INSTANCE`.
    #[must_use]
    pub fn find(&self, service_id: ServiceId, instance_id: InstanceId) -> Option<(ServiceKey, ClientId)> {
        if instance_id == ANY_INSTANCE {
            self.owners.iter().find(|(key, _)| key.service_id == service_id).map(|(key, id)| (*key, *id))
        } else {
            let key = ServiceKey::new(service_id, instance_id);
            self.owners.get(&key).map(|id| (key, *id))
        }
    }
}

/// Where a message came from, and therefore where an error response (or an
/// event dispatch) should be sent back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyPath {
    /// Originated from a locally attached application.
    Local(ClientId),
    /// Arrived over the network from `addr`; `reliable` says which
    /// transport to answer on.
    Remote {
        /// The peer address the message arrived from.
        addr: SocketAddr,
        /// Whether to answer over the reliable (TCP) transport.
        reliable: bool,
    },
}

/// What the driver should actually do with a routed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingAction {
    /// Hand the message to a locally attached application's queue.
    Deliver {
        /// The local application to deliver to.
        client_id: ClientId,
        /// The message to deliver.
        message: SomeipMessage,
    },
    /// Send over the reliable (TCP) transport to `endpoint`.
    SendReliable {
        /// The destination address.
        endpoint: SocketAddr,
        /// The message to send.
        message: SomeipMessage,
    },
    /// Send over the unreliable (UDP) transport to `endpoint`.
    SendUnreliable {
        /// The destination address.
        endpoint: SocketAddr,
        /// The message to send.
        message: SomeipMessage,
    },
}

fn prefers_reliable(message_type: MessageType) -> bool {
    !matches!(message_type, MessageType::Notification | MessageType::NotificationAck)
}

/// Route a message a local application is sending to `target`.
///
/// Delivers directly if `target` is owned by another local application;
/// otherwise looks up `target`'s advertised endpoints and picks TCP or UDP
/// per the message's own type (requests/responses prefer reliable,
/// notifications prefer unreliable), falling back to whichever transport
/// is actually offered.
pub fn route_outbound(
    services: &ServiceTable,
    local_owners: &LocalOwners,
    target: ServiceKey,
    message: SomeipMessage,
) -> Result<RoutingAction, RoutingError> {
    if let Some((_, client_id)) = local_owners.find(target.service_id, target.instance_id) {
        return Ok(RoutingAction::Deliver { client_id, message });
    }

    let Some((_, info)) = services.find(target.service_id, target.instance_id) else {
        return Err(RoutingError::UnknownService { service_id: target.service_id, instance_id: target.instance_id });
    };

    let reliable = prefers_reliable(message.message_type());
    let (endpoint, via_reliable) = if reliable {
        match info.endpoints.reliable.or(info.endpoints.unreliable) {
            Some(addr) => (addr, info.endpoints.reliable.is_some()),
            None => return Err(RoutingError::Transport("no endpoint advertised".into())),
        }
    } else {
        match info.endpoints.unreliable.or(info.endpoints.reliable) {
            Some(addr) => (addr, info.endpoints.unreliable.is_none()),
            None => return Err(RoutingError::Transport("no endpoint advertised".into())),
        }
    };

    Ok(if via_reliable {
        RoutingAction::SendReliable { endpoint, message }
    } else {
        RoutingAction::SendUnreliable { endpoint, message }
    })
}

/// Route an inbound message (from the network or a local `notify()`/`send()`
/// call) per §4.5's inbound pipeline: match against locally offered
/// services, synthesizing an error for an unmatched request; fan out
/// notifications to eventgroup subscribers; otherwise hand the message to
/// the owning local application.
pub fn route_inbound(
    local_owners: &LocalOwners,
    eventgroups: &EventgroupTable,
    event_routes: &HashMap<(ServiceId, EventId), EventgroupId>,
    message: SomeipMessage,
    reply_to: ReplyPath,
) -> Vec<RoutingAction> {
    if message.message_type() == MessageType::Notification {
        return route_notification(eventgroups, event_routes, message);
    }

    let Some((_, client_id)) = local_owners.find(message.service_id(), ANY_INSTANCE) else {
        return unknown_service_response(message, reply_to);
    };
    vec![RoutingAction::Deliver { client_id, message }]
}

fn unknown_service_response(message: SomeipMessage, reply_to: ReplyPath) -> Vec<RoutingAction> {
    if !matches!(
        message.message_type(),
        MessageType::Request | MessageType::RequestNoReturn
    ) {
        return Vec::new();
    }
    let response = SomeipMessage::error_response_to(&message, someip_proto::enums::ReturnCode::UnknownService);
    match reply_to {
        ReplyPath::Local(client_id) => vec![RoutingAction::Deliver { client_id, message: response }],
        ReplyPath::Remote { addr, reliable: true } => vec![RoutingAction::SendReliable { endpoint: addr, message: response }],
        ReplyPath::Remote { addr, reliable: false } => vec![RoutingAction::SendUnreliable { endpoint: addr, message: response }],
    }
}

fn route_notification(
    eventgroups: &EventgroupTable,
    event_routes: &HashMap<(ServiceId, EventId), EventgroupId>,
    message: SomeipMessage,
) -> Vec<RoutingAction> {
    let event_id = message.method_id();
    let Some(&eventgroup_id) = event_routes.get(&(message.service_id(), event_id)) else {
        return Vec::new();
    };
    let key = EventgroupKey { service: ServiceKey::new(message.service_id(), message.client_id()), eventgroup_id };
    eventgroups
        .subscribers(key)
        .map(|endpoint| RoutingAction::SendUnreliable { endpoint, message: message.clone() })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use someip_core::model::{ServiceEndpoints, ServiceInfo};
    use someip_proto::enums::ReturnCode;

    use super::*;

    fn request() -> SomeipMessage {
        SomeipMessage::new(0x1234, 0x0001, 2, 1, 1, MessageType::Request, ReturnCode::Ok, Vec::new())
    }

    #[test]
    fn outbound_to_local_owner_delivers_directly() {
        let services = ServiceTable::new();
        let mut owners = LocalOwners::new();
        let key = ServiceKey::new(0x1234, 1);
        owners.insert(key, 7);
        let action = route_outbound(&services, &owners, key, request()).unwrap();
        assert_eq!(action, RoutingAction::Deliver { client_id: 7, message: request() });
    }

    #[test]
    fn outbound_to_unknown_remote_service_errors() {
        let services = ServiceTable::new();
        let owners = LocalOwners::new();
        let key = ServiceKey::new(0x1234, 1);
        let err = route_outbound(&services, &owners, key, request()).unwrap_err();
        assert!(matches!(err, RoutingError::UnknownService { .. }));
    }

    #[test]
    fn outbound_to_remote_service_picks_reliable_for_requests() {
        let mut services = ServiceTable::new();
        let key = ServiceKey::new(0x1234, 1);
        services.insert(
            key,
            ServiceInfo {
                major_version: 1,
                minor_version: 0,
                endpoints: ServiceEndpoints {
                    reliable: Some("127.0.0.1:30501".parse().unwrap()),
                    unreliable: Some("127.0.0.1:30502".parse().unwrap()),
                },
            },
        );
        let owners = LocalOwners::new();
        let action = route_outbound(&services, &owners, key, request()).unwrap();
        assert!(matches!(action, RoutingAction::SendReliable { .. }));
    }

    #[test]
    fn inbound_request_to_unoffered_service_synthesizes_unknown_service() {
        let owners = LocalOwners::new();
        let eventgroups = EventgroupTable::new();
        let routes = HashMap::new();
        let actions = route_inbound(
            &owners,
            &eventgroups,
            &routes,
            request(),
            ReplyPath::Remote { addr: "127.0.0.1:30501".parse().unwrap(), reliable: true },
        );
        assert_eq!(actions.len(), 1);
        assert!(matches!(
            &actions[0],
            RoutingAction::SendReliable { message, .. }
                if message.message_type() == MessageType::Error
                    && message.return_code() == ReturnCode::UnknownService
        ));
    }

    #[test]
    fn inbound_request_to_offered_service_delivers_to_owner() {
        let mut owners = LocalOwners::new();
        owners.insert(ServiceKey::new(0x1234, 1), 9);
        let eventgroups = EventgroupTable::new();
        let routes = HashMap::new();
        let actions = route_inbound(
            &owners,
            &eventgroups,
            &routes,
            request(),
            ReplyPath::Remote { addr: "127.0.0.1:30501".parse().unwrap(), reliable: true },
        );
        assert_eq!(actions, vec![RoutingAction::Deliver { client_id: 9, message: request() }]);
    }
}
