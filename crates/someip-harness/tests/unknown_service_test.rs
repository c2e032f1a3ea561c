//! A request for a service no node has ever offered or discovered must
//! fail with `UnknownService` rather than hang or silently drop, for both
//! outbound application sends and inbound network arrivals.

use someip_core::RoutingError;
use someip_proto::{
    enums::{MessageType, ReturnCode},
    message::SomeipMessage,
};
use someip_routing::{dispatch::ReplyPath, RoutingAction, RoutingManagerHost};

fn request() -> SomeipMessage {
    SomeipMessage::new(0x1234, 0x0001, 2, 1, 1, MessageType::Request, ReturnCode::Ok, Vec::new())
}

#[test]
fn outbound_to_a_never_offered_service_is_rejected() {
    let host = RoutingManagerHost::new();
    let target = someip_core::model::ServiceKey::new(0x1234, 1);
    let err = host.route_outbound(target, request()).unwrap_err();
    assert!(matches!(err, RoutingError::UnknownService { service_id: 0x1234, instance_id: 1 }));
}

#[test]
fn inbound_request_to_a_never_offered_service_returns_an_error_response() {
    let host = RoutingManagerHost::new();
    let reply_to = ReplyPath::Remote { addr: "127.0.0.1:30501".parse().unwrap(), reliable: true };
    let actions = host.route_inbound(request(), reply_to);

    assert_eq!(actions.len(), 1);
    let RoutingAction::SendReliable { message, .. } = &actions[0] else {
        unreachable!("the request arrived over TCP, so the error response must answer over TCP")
    };
    assert_eq!(message.message_type(), MessageType::Error);
    assert_eq!(message.return_code(), ReturnCode::UnknownService);
    assert_eq!(message.session_id(), request().session_id(), "the error must echo the failing request's session id");
}

#[test]
fn inbound_notification_to_a_never_offered_service_is_dropped_silently() {
    let host = RoutingManagerHost::new();
    let notification =
        SomeipMessage::new(0x1234, 0x8001, 2, 1, 1, MessageType::Notification, ReturnCode::Ok, Vec::new());
    let reply_to = ReplyPath::Remote { addr: "127.0.0.1:30501".parse().unwrap(), reliable: false };
    let actions = host.route_inbound(notification, reply_to);
    assert!(actions.is_empty(), "notifications never get an UnknownService error back, they have no sender to answer");
}
