//! Tagged enumerations for the SOME/IP header and Service Discovery bodies.
//!
//! Each enum carries its own `to_u8`/`from_u8` (or `u16`) pair rather than
//! relying on a derive macro: unknown tags must round-trip as `Unknown`
//! variants so a frame can be skipped instead of rejected outright (§4.1).

/// SOME/IP message type, occupying byte 14 of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Fire-and-forget-free method call expecting a response.
    Request,
    /// Method call that never produces a response.
    RequestNoReturn,
    /// Event/field notification.
    Notification,
    /// Request acknowledgment (request type OR'd with 0x40).
    RequestAck,
    /// Fire-and-forget acknowledgment.
    RequestNoReturnAck,
    /// Notification acknowledgment.
    NotificationAck,
    /// Successful method response.
    Response,
    /// Erroneous method response, `return_code` carries the failure.
    Error,
    /// Response acknowledgment.
    ResponseAck,
    /// Error acknowledgment.
    ErrorAck,
    /// Tag not recognized; the raw byte is preserved so the frame can still
    /// be forwarded or logged.
    Unknown(u8),
}

impl MessageType {
    const REQUEST: u8 = 0x00;
    const REQUEST_NO_RETURN: u8 = 0x01;
    const NOTIFICATION: u8 = 0x02;
    const RESPONSE: u8 = 0x80;
    const ERROR: u8 = 0x81;
    const ACK_FLAG: u8 = 0x40;

    /// Decode a raw header byte into a `MessageType`.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        let is_ack = value & Self::ACK_FLAG != 0 && value != Self::RESPONSE && value != Self::ERROR;
        let base = value & !Self::ACK_FLAG;
        match (base, is_ack) {
            (Self::REQUEST, false) => Self::Request,
            (Self::REQUEST, true) => Self::RequestAck,
            (Self::REQUEST_NO_RETURN, false) => Self::RequestNoReturn,
            (Self::REQUEST_NO_RETURN, true) => Self::RequestNoReturnAck,
            (Self::NOTIFICATION, false) => Self::Notification,
            (Self::NOTIFICATION, true) => Self::NotificationAck,
            _ if value == Self::RESPONSE => Self::Response,
            _ if value == Self::ERROR => Self::Error,
            _ if value == Self::RESPONSE | Self::ACK_FLAG => Self::ResponseAck,
            _ if value == Self::ERROR | Self::ACK_FLAG => Self::ErrorAck,
            _ => Self::Unknown(value),
        }
    }

    /// Encode back to the raw header byte.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Request => Self::REQUEST,
            Self::RequestAck => Self::REQUEST | Self::ACK_FLAG,
            Self::RequestNoReturn => Self::REQUEST_NO_RETURN,
            Self::RequestNoReturnAck => Self::REQUEST_NO_RETURN | Self::ACK_FLAG,
            Self::Notification => Self::NOTIFICATION,
            Self::NotificationAck => Self::NOTIFICATION | Self::ACK_FLAG,
            Self::Response => Self::RESPONSE,
            Self::ResponseAck => Self::RESPONSE | Self::ACK_FLAG,
            Self::Error => Self::ERROR,
            Self::ErrorAck => Self::ERROR | Self::ACK_FLAG,
            Self::Unknown(raw) => raw,
        }
    }

    /// True for message types that never expect a response
    /// (`REQUEST_NO_RETURN`, `NOTIFICATION`, and all acks).
    #[must_use]
    pub fn expects_no_response(self) -> bool {
        matches!(
            self,
            Self::RequestNoReturn
                | Self::Notification
                | Self::RequestAck
                | Self::RequestNoReturnAck
                | Self::NotificationAck
                | Self::ResponseAck
                | Self::ErrorAck
        )
    }
}

/// SOME/IP return code, occupying byte 15 of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    /// No error occurred.
    Ok,
    /// Unspecified error.
    NotOk,
    /// The addressed service is not known.
    UnknownService,
    /// The addressed method is not known on a known service.
    UnknownMethod,
    /// Service known but not yet ready to process requests.
    NotReady,
    /// Service known but currently not reachable.
    NotReachable,
    /// The request timed out.
    Timeout,
    /// Unsupported SOME/IP protocol version in request.
    WrongProtocolVersion,
    /// Unsupported interface version in request.
    WrongInterfaceVersion,
    /// Deserialization error; the message could not be parsed.
    MalformedMessage,
    /// Value not covered by the standard enumeration, raw byte preserved.
    Unknown(u8),
}

impl ReturnCode {
    const OK: u8 = 0x00;
    const NOT_OK: u8 = 0x01;
    const UNKNOWN_SERVICE: u8 = 0x02;
    const UNKNOWN_METHOD: u8 = 0x03;
    const NOT_READY: u8 = 0x04;
    const NOT_REACHABLE: u8 = 0x05;
    const TIMEOUT: u8 = 0x06;
    const WRONG_PROTOCOL_VERSION: u8 = 0x07;
    const WRONG_INTERFACE_VERSION: u8 = 0x08;
    const MALFORMED_MESSAGE: u8 = 0x09;

    /// Decode a raw header byte into a `ReturnCode`.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            Self::OK => Self::Ok,
            Self::NOT_OK => Self::NotOk,
            Self::UNKNOWN_SERVICE => Self::UnknownService,
            Self::UNKNOWN_METHOD => Self::UnknownMethod,
            Self::NOT_READY => Self::NotReady,
            Self::NOT_REACHABLE => Self::NotReachable,
            Self::TIMEOUT => Self::Timeout,
            Self::WRONG_PROTOCOL_VERSION => Self::WrongProtocolVersion,
            Self::WRONG_INTERFACE_VERSION => Self::WrongInterfaceVersion,
            Self::MALFORMED_MESSAGE => Self::MalformedMessage,
            other => Self::Unknown(other),
        }
    }

    /// Encode back to the raw header byte.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Ok => Self::OK,
            Self::NotOk => Self::NOT_OK,
            Self::UnknownService => Self::UNKNOWN_SERVICE,
            Self::UnknownMethod => Self::UNKNOWN_METHOD,
            Self::NotReady => Self::NOT_READY,
            Self::NotReachable => Self::NOT_REACHABLE,
            Self::Timeout => Self::TIMEOUT,
            Self::WrongProtocolVersion => Self::WRONG_PROTOCOL_VERSION,
            Self::WrongInterfaceVersion => Self::WRONG_INTERFACE_VERSION,
            Self::MalformedMessage => Self::MALFORMED_MESSAGE,
            Self::Unknown(raw) => raw,
        }
    }
}

/// Service Discovery option type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionType {
    /// Opaque configuration string(s).
    Configuration,
    /// Load-balancing priority/weight hint.
    LoadBalancing,
    /// Transport-layer protection/authentication descriptor.
    Protection,
    /// IPv4 unicast endpoint (address, protocol, port).
    Ip4Endpoint,
    /// IPv6 unicast endpoint.
    Ip6Endpoint,
    /// IPv4 multicast endpoint (used in SubscribeAck for multicast events).
    Ip4Multicast,
    /// IPv6 multicast endpoint.
    Ip6Multicast,
    /// Unrecognized option type; raw tag preserved.
    Unknown(u8),
}

impl OptionType {
    const CONFIGURATION: u8 = 0x01;
    const LOAD_BALANCING: u8 = 0x02;
    const PROTECTION: u8 = 0x03;
    const IP4_ENDPOINT: u8 = 0x04;
    const IP6_ENDPOINT: u8 = 0x06;
    const IP4_MULTICAST: u8 = 0x14;
    const IP6_MULTICAST: u8 = 0x16;

    /// Decode a raw option-type byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            Self::CONFIGURATION => Self::Configuration,
            Self::LOAD_BALANCING => Self::LoadBalancing,
            Self::PROTECTION => Self::Protection,
            Self::IP4_ENDPOINT => Self::Ip4Endpoint,
            Self::IP6_ENDPOINT => Self::Ip6Endpoint,
            Self::IP4_MULTICAST => Self::Ip4Multicast,
            Self::IP6_MULTICAST => Self::Ip6Multicast,
            other => Self::Unknown(other),
        }
    }

    /// Encode back to the raw option-type byte.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Configuration => Self::CONFIGURATION,
            Self::LoadBalancing => Self::LOAD_BALANCING,
            Self::Protection => Self::PROTECTION,
            Self::Ip4Endpoint => Self::IP4_ENDPOINT,
            Self::Ip6Endpoint => Self::IP6_ENDPOINT,
            Self::Ip4Multicast => Self::IP4_MULTICAST,
            Self::Ip6Multicast => Self::IP6_MULTICAST,
            Self::Unknown(raw) => raw,
        }
    }
}

/// Service Discovery entry type tag.
///
/// The standard overloads 0x01 for both `OfferService` and `StopOfferService`
/// (distinguished by `ttl == 0`), and 0x06/0x07 similarly pair
/// `Subscribe`/`SubscribeAck` with their stop/nack counterparts. We keep the
/// wire tag as a single `EntryType` and let [`crate::sd::entry::SdEntry`]
/// carry the TTL that disambiguates offer/stop and subscribe/unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Client is looking for a service.
    FindService,
    /// Server is advertising (or, with `ttl == 0`, withdrawing) a service.
    OfferService,
    /// Client wants to (or, with `ttl == 0`, no longer wants to) join an
    /// eventgroup.
    SubscribeEventgroup,
    /// Server acknowledges (or, with `ttl == 0`, rejects) a subscription.
    SubscribeEventgroupAck,
    /// Unrecognized entry type; raw tag preserved.
    Unknown(u8),
}

impl EntryType {
    const FIND_SERVICE: u8 = 0x00;
    const OFFER_SERVICE: u8 = 0x01;
    const SUBSCRIBE_EVENTGROUP: u8 = 0x06;
    const SUBSCRIBE_EVENTGROUP_ACK: u8 = 0x07;

    /// Decode a raw entry-type byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            Self::FIND_SERVICE => Self::FindService,
            Self::OFFER_SERVICE => Self::OfferService,
            Self::SUBSCRIBE_EVENTGROUP => Self::SubscribeEventgroup,
            Self::SUBSCRIBE_EVENTGROUP_ACK => Self::SubscribeEventgroupAck,
            other => Self::Unknown(other),
        }
    }

    /// Encode back to the raw entry-type byte.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::FindService => Self::FIND_SERVICE,
            Self::OfferService => Self::OFFER_SERVICE,
            Self::SubscribeEventgroup => Self::SUBSCRIBE_EVENTGROUP,
            Self::SubscribeEventgroupAck => Self::SUBSCRIBE_EVENTGROUP_ACK,
            Self::Unknown(raw) => raw,
        }
    }

    /// True for the two entry kinds whose payload is a service entry
    /// (`FindService`/`OfferService`) rather than an eventgroup entry.
    #[must_use]
    pub fn is_service_entry(self) -> bool {
        matches!(self, Self::FindService | Self::OfferService)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn message_type_round_trips_known_values() {
        for raw in [0x00, 0x01, 0x02, 0x40, 0x41, 0x42, 0x80, 0x81, 0xC0, 0xC1] {
            let decoded = MessageType::from_u8(raw);
            assert_eq!(decoded.to_u8(), raw, "raw {raw:#04x} did not round-trip");
        }
    }

    #[test]
    fn return_code_unknown_preserves_raw_byte() {
        assert_eq!(ReturnCode::from_u8(0xAB).to_u8(), 0xAB);
    }

    #[test]
    fn option_type_unknown_preserves_raw_byte() {
        assert_eq!(OptionType::from_u8(0x99).to_u8(), 0x99);
    }

    #[test]
    fn entry_type_service_vs_eventgroup() {
        assert!(EntryType::OfferService.is_service_entry());
        assert!(!EntryType::SubscribeEventgroup.is_service_entry());
    }
}
