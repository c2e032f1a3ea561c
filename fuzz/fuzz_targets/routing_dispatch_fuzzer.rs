//! Fuzz target exercising `RoutingManagerHost` with an arbitrary sequence
//! of registrations, offers, and in/outbound messages.
//!
//! # Invariants
//!
//! - `route_outbound`/`route_inbound` never panic for any combination of
//!   offered/never-offered services and arbitrary message fields.
//! - An `UnknownService` error response always echoes the failing
//!   request's session id (§4.5, §7).
//! - Session ids handed out for a given (client, message) pair are never
//!   zero.

#![no_main]

use std::net::SocketAddr;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use someip_core::model::{ServiceEndpoints, ServiceInfo, ServiceKey};
use someip_proto::{enums::{MessageType, ReturnCode}, message::SomeipMessage};
use someip_routing::{dispatch::ReplyPath, RoutingManagerHost};

#[derive(Debug, Arbitrary)]
enum Op {
    Register,
    OfferService { service_id: u16, instance_id: u16 },
    StopOfferService { service_id: u16, instance_id: u16 },
    RouteOutbound { service_id: u16, instance_id: u16, method_id: u16, client_id: u16 },
    RouteInboundRequest { service_id: u16, method_id: u16, client_id: u16, reliable: bool, no_return: bool },
}

fn peer() -> SocketAddr {
    "127.0.0.1:30509".parse().unwrap_or_else(|_| unreachable!())
}

fuzz_target!(|ops: Vec<Op>| {
    let mut host = RoutingManagerHost::new();

    for op in ops.into_iter().take(256) {
        match op {
            Op::Register => {
                let _ = host.register_application();
            }
            Op::OfferService { service_id, instance_id } => {
                let key = ServiceKey::new(service_id, instance_id);
                let info = ServiceInfo {
                    major_version: 1,
                    minor_version: 0,
                    endpoints: ServiceEndpoints { reliable: Some(peer()), unreliable: Some(peer()) },
                };
                host.offer_service(0, key, info);
            }
            Op::StopOfferService { service_id, instance_id } => {
                host.stop_offer_service(ServiceKey::new(service_id, instance_id));
            }
            Op::RouteOutbound { service_id, instance_id, method_id, client_id } => {
                let target = ServiceKey::new(service_id, instance_id);
                let session_id = host.next_session(client_id, u32::from(service_id) << 16 | u32::from(method_id));
                assert_ne!(session_id, 0, "a session id of zero must never be handed out");
                let message = SomeipMessage::new(
                    service_id,
                    method_id,
                    client_id,
                    session_id,
                    1,
                    MessageType::Request,
                    ReturnCode::Ok,
                    Vec::new(),
                );
                let _ = host.route_outbound(target, message);
            }
            Op::RouteInboundRequest { service_id, method_id, client_id, reliable, no_return } => {
                let message_type = if no_return { MessageType::RequestNoReturn } else { MessageType::Request };
                let message = SomeipMessage::new(service_id, method_id, client_id, 1, 1, message_type, ReturnCode::Ok, Vec::new());
                let reply_to = ReplyPath::Remote { addr: peer(), reliable };
                let actions = host.route_inbound(message.clone(), reply_to);

                for action in &actions {
                    if let someip_routing::RoutingAction::SendReliable { message: response, .. }
                    | someip_routing::RoutingAction::SendUnreliable { message: response, .. } = action
                    {
                        if response.message_type() == MessageType::Error {
                            assert_eq!(response.session_id(), message.session_id());
                        }
                    }
                }
            }
        }
    }
});
