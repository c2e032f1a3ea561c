//! Protocol identifier types and the reserved "any" wildcards.
//!
//! SOME/IP identifiers are plain fixed-width integers; we alias them instead
//! of newtyping so callers can compose `message_id`/`request_id` with normal
//! shift-and-or arithmetic the way the AUTOSAR specification describes it.

/// 16-bit service identifier.
pub type ServiceId = u16;
/// 16-bit instance identifier (a physical occurrence of a service).
pub type InstanceId = u16;
/// 16-bit method identifier.
pub type MethodId = u16;
/// 16-bit event identifier.
pub type EventId = u16;
/// 16-bit eventgroup identifier.
pub type EventgroupId = u16;
/// 16-bit client identifier, unique per local application on a host.
pub type ClientId = u16;
/// 16-bit session identifier, scoped to a (client, message) pair.
pub type SessionId = u16;
/// 8-bit SOME/IP protocol version (always [`crate::consts::PROTOCOL_VERSION`]
/// on the wire).
pub type ProtocolVersion = u8;
/// 8-bit service interface version.
pub type InterfaceVersion = u8;
/// 8-bit major version of a service.
pub type MajorVersion = u8;
/// 32-bit minor version of a service.
pub type MinorVersion = u32;
/// 32-bit time-to-live in seconds used by Service Discovery entries.
pub type Ttl = u32;

/// Reserved value meaning "match any service".
pub const ANY_SERVICE: ServiceId = 0xFFFF;
/// Reserved value meaning "match any instance".
pub const ANY_INSTANCE: InstanceId = 0xFFFF;
/// Reserved value meaning "match any method".
pub const ANY_METHOD: MethodId = 0xFFFF;
/// Reserved value meaning "match any eventgroup".
pub const ANY_EVENTGROUP: EventgroupId = 0xFFFF;
/// Reserved value meaning "any major version is acceptable".
pub const ANY_MAJOR: MajorVersion = 0xFF;
/// Reserved value meaning "any minor version is acceptable".
pub const ANY_MINOR: MinorVersion = 0xFFFF_FFFF;

/// Service identifier reserved for the Service Discovery protocol itself.
pub const SD_SERVICE: ServiceId = 0xFFFF;
/// Method identifier reserved for Service Discovery messages.
pub const SD_METHOD: MethodId = 0x8100;
/// Client identifier used when sending Service Discovery messages.
pub const SD_CLIENT: ClientId = 0x0000;

/// Combine a service and method id into the 32-bit `message_id` used for
/// routing and session bookkeeping: `service_id << 16 | method_id`.
#[must_use]
pub fn message_id(service_id: ServiceId, method_id: MethodId) -> u32 {
    (u32::from(service_id) << 16) | u32::from(method_id)
}

/// Combine a client and session id into the 32-bit `request_id`:
/// `client_id << 16 | session_id`.
#[must_use]
pub fn request_id(client_id: ClientId, session_id: SessionId) -> u32 {
    (u32::from(client_id) << 16) | u32::from(session_id)
}

/// Split a `message_id` back into its (service, method) components.
#[must_use]
pub fn split_message_id(message_id: u32) -> (ServiceId, MethodId) {
    ((message_id >> 16) as ServiceId, (message_id & 0xFFFF) as MethodId)
}

/// Split a `request_id` back into its (client, session) components.
#[must_use]
pub fn split_request_id(request_id: u32) -> (ClientId, SessionId) {
    ((request_id >> 16) as ClientId, (request_id & 0xFFFF) as SessionId)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn message_id_round_trips() {
        let mid = message_id(0x1234, 0x8001);
        assert_eq!(split_message_id(mid), (0x1234, 0x8001));
    }

    #[test]
    fn request_id_round_trips() {
        let rid = request_id(0x0002, 0x0001);
        assert_eq!(split_request_id(rid), (0x0002, 0x0001));
    }
}
