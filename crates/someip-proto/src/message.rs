//! The SOME/IP message: 16-byte fixed header plus payload (§3, §4.2).

use bytes::Bytes;

use crate::{
    codec::{Deserializer, Serializer},
    consts,
    enums::{MessageType, ReturnCode},
    errors::{ProtocolError, Result},
    ids::{ClientId, InterfaceVersion, MethodId, ProtocolVersion, ServiceId, SessionId},
};

/// A fully-formed SOME/IP message (header + payload).
///
/// # Invariants
///
/// `header.length == 8 + payload.len()` always holds for an instance
/// produced by [`SomeipMessage::new`] or [`SomeipMessage::deserialize`];
/// [`SomeipMessage::serialize`] recomputes `length` from the payload rather
/// than trusting a stored field, so the invariant cannot be violated by
/// mutating `payload` through [`SomeipMessage::set_payload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SomeipMessage {
    service_id: ServiceId,
    method_id: MethodId,
    client_id: ClientId,
    session_id: SessionId,
    protocol_version: ProtocolVersion,
    interface_version: InterfaceVersion,
    message_type: MessageType,
    return_code: ReturnCode,
    payload: Bytes,
}

impl SomeipMessage {
    /// Build a new message. `protocol_version` is fixed at
    /// [`consts::PROTOCOL_VERSION`]; `length` is derived, never stored.
    #[must_use]
    pub fn new(
        service_id: ServiceId,
        method_id: MethodId,
        client_id: ClientId,
        session_id: SessionId,
        interface_version: InterfaceVersion,
        message_type: MessageType,
        return_code: ReturnCode,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            service_id,
            method_id,
            client_id,
            session_id,
            protocol_version: consts::PROTOCOL_VERSION,
            interface_version,
            message_type,
            return_code,
            payload: payload.into(),
        }
    }

    /// Build an ERROR response that preserves the request's ids, used when
    /// the routing manager cannot deliver a request (§4.5, §7).
    #[must_use]
    pub fn error_response_to(request: &Self, return_code: ReturnCode) -> Self {
        Self::new(
            request.service_id,
            request.method_id,
            request.client_id,
            request.session_id,
            request.interface_version,
            MessageType::Error,
            return_code,
            Bytes::new(),
        )
    }

    /// Build a RESPONSE to a request, preserving routing ids.
    #[must_use]
    pub fn response_to(request: &Self, payload: impl Into<Bytes>) -> Self {
        Self::new(
            request.service_id,
            request.method_id,
            request.client_id,
            request.session_id,
            request.interface_version,
            MessageType::Response,
            ReturnCode::Ok,
            payload,
        )
    }

    /// Service identifier.
    #[must_use]
    pub fn service_id(&self) -> ServiceId {
        self.service_id
    }

    /// Method identifier.
    #[must_use]
    pub fn method_id(&self) -> MethodId {
        self.method_id
    }

    /// Client identifier.
    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Session identifier.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Protocol version byte (always [`consts::PROTOCOL_VERSION`]).
    #[must_use]
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    /// Service interface version.
    #[must_use]
    pub fn interface_version(&self) -> InterfaceVersion {
        self.interface_version
    }

    /// Message type.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Return code.
    #[must_use]
    pub fn return_code(&self) -> ReturnCode {
        self.return_code
    }

    /// Borrow the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// `message_id = service_id << 16 | method_id`.
    #[must_use]
    pub fn message_id(&self) -> u32 {
        crate::ids::message_id(self.service_id, self.method_id)
    }

    /// `request_id = client_id << 16 | session_id`.
    #[must_use]
    pub fn request_id(&self) -> u32 {
        crate::ids::request_id(self.client_id, self.session_id)
    }

    /// Replace the payload.
    pub fn set_payload(&mut self, payload: impl Into<Bytes>) {
        self.payload = payload.into();
    }

    /// Replace the session id (used when the routing manager re-numbers a
    /// forwarded message).
    pub fn set_session_id(&mut self, session_id: SessionId) {
        self.session_id = session_id;
    }

    /// Serialize the 16-byte header followed by the payload.
    pub fn serialize(&self, ser: &mut Serializer) {
        ser.reserve(consts::HEADER_SIZE + self.payload.len());
        ser.write_u16(self.service_id);
        ser.write_u16(self.method_id);
        #[allow(clippy::cast_possible_truncation)]
        let length = 8 + self.payload.len() as u32;
        ser.write_u32(length);
        ser.write_u16(self.client_id);
        ser.write_u16(self.session_id);
        ser.write_u8(self.protocol_version);
        ser.write_u8(self.interface_version);
        ser.write_u8(self.message_type.to_u8());
        ser.write_u8(self.return_code.to_u8());
        ser.write_bytes(&self.payload);
    }

    /// Serialize into a freshly-allocated buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ser = Serializer::new();
        self.serialize(&mut ser);
        ser.finish()
    }

    /// Deserialize a header-plus-payload message. The `de` cursor must be
    /// positioned at the start of the 16-byte header; on success it is left
    /// just past the payload. On failure the cursor is left at the header
    /// start so the caller may scan for the next magic cookie.
    pub fn deserialize(de: &mut Deserializer<'_>) -> Result<Self> {
        let start = de.position();
        match Self::deserialize_inner(de) {
            Ok(msg) => Ok(msg),
            Err(err) => {
                // Rewind past whatever fields deserialize_inner managed to
                // read before failing, so callers can resync from the
                // header start rather than mid-header.
                de.seek(start);
                Err(err)
            },
        }
    }

    fn deserialize_inner(de: &mut Deserializer<'_>) -> Result<Self> {
        let service_id = de.read_u16()?;
        let method_id = de.read_u16()?;
        let length = de.read_u32()?;
        let client_id = de.read_u16()?;
        let session_id = de.read_u16()?;
        let protocol_version = de.read_u8()?;
        let interface_version = de.read_u8()?;
        let message_type = MessageType::from_u8(de.read_u8()?);
        let return_code = ReturnCode::from_u8(de.read_u8()?);

        if length < 8 {
            return Err(ProtocolError::MalformedLength(format!(
                "header length {length} is smaller than the minimum of 8"
            )));
        }
        #[allow(clippy::cast_possible_truncation)]
        let payload_len = (length - 8) as usize;
        let payload = Bytes::copy_from_slice(de.read_bytes(payload_len)?);

        Ok(Self {
            service_id,
            method_id,
            client_id,
            session_id,
            protocol_version,
            interface_version,
            message_type,
            return_code,
            payload,
        })
    }
}

/// Either an ordinary message or one of the two magic-cookie sentinels
/// (§4.2). The TCP/UDP framer treats cookies as resynchronization markers,
/// never as application data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// An ordinary SOME/IP message.
    Message(SomeipMessage),
    /// Client magic cookie: `message_id = 0xFFFF0000`, `length = 8`,
    /// `message_type = REQUEST_NO_RETURN`, `return_code = OK`.
    ClientMagicCookie,
    /// Service magic cookie: `message_id = 0xFFFF8000`, `length = 8`,
    /// `message_type = NOTIFICATION`, `return_code = OK`.
    ServiceMagicCookie,
}

impl WireFrame {
    /// Parse one frame (message or cookie) starting at the deserializer's
    /// current position. On success the cursor is advanced past the frame;
    /// on failure it is left unmoved.
    pub fn deserialize(de: &mut Deserializer<'_>) -> Result<Self> {
        let message = SomeipMessage::deserialize(de)?;
        Ok(classify(message))
    }

    /// Encode a client magic cookie frame.
    #[must_use]
    pub fn client_magic_cookie_bytes() -> [u8; consts::HEADER_SIZE] {
        magic_cookie_bytes(
            consts::MAGIC_COOKIE_CLIENT_METHOD,
            MessageType::RequestNoReturn,
        )
    }

    /// Encode a service magic cookie frame.
    #[must_use]
    pub fn service_magic_cookie_bytes() -> [u8; consts::HEADER_SIZE] {
        magic_cookie_bytes(consts::MAGIC_COOKIE_SERVICE_METHOD, MessageType::Notification)
    }
}

fn magic_cookie_bytes(method_id: MethodId, message_type: MessageType) -> [u8; consts::HEADER_SIZE] {
    let msg = SomeipMessage::new(
        consts::MAGIC_COOKIE_CLIENT_SERVICE,
        method_id,
        consts::MAGIC_COOKIE_CLIENT_ID,
        consts::MAGIC_COOKIE_SESSION_ID,
        0,
        message_type,
        ReturnCode::Ok,
        Bytes::new(),
    );
    let bytes = msg.to_bytes();
    let mut out = [0u8; consts::HEADER_SIZE];
    out.copy_from_slice(&bytes);
    out
}

fn classify(message: SomeipMessage) -> WireFrame {
    let is_client_cookie = message.service_id == consts::MAGIC_COOKIE_CLIENT_SERVICE
        && message.method_id == consts::MAGIC_COOKIE_CLIENT_METHOD
        && message.payload.is_empty()
        && message.message_type == MessageType::RequestNoReturn
        && message.return_code == ReturnCode::Ok;
    let is_service_cookie = message.service_id == consts::MAGIC_COOKIE_SERVICE_SERVICE
        && message.method_id == consts::MAGIC_COOKIE_SERVICE_METHOD
        && message.payload.is_empty()
        && message.message_type == MessageType::Notification
        && message.return_code == ReturnCode::Ok;

    if is_client_cookie {
        WireFrame::ClientMagicCookie
    } else if is_service_cookie {
        WireFrame::ServiceMagicCookie
    } else {
        WireFrame::Message(message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn serialize_ping_matches_spec_bytes() {
        let msg = SomeipMessage::new(
            0x1111,
            0x8001,
            0x0002,
            0x0001,
            0x01,
            MessageType::RequestNoReturn,
            ReturnCode::Ok,
            Bytes::new(),
        );
        let bytes = msg.to_bytes();
        assert_eq!(
            bytes,
            vec![
                0x11, 0x11, 0x80, 0x01, 0x00, 0x00, 0x00, 0x08, 0x00, 0x02, 0x00, 0x01, 0x01, 0x01,
                0x01, 0x00,
            ]
        );
    }

    #[test]
    fn header_length_matches_byte_count_after_length_field() {
        let msg = SomeipMessage::new(
            0x1234,
            0x5678,
            1,
            1,
            1,
            MessageType::Request,
            ReturnCode::Ok,
            vec![1, 2, 3, 4, 5],
        );
        let bytes = msg.to_bytes();
        let length = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(length as usize, bytes.len() - 8);
    }

    #[test]
    fn round_trip_empty_payload() {
        let msg = SomeipMessage::new(
            0x1111,
            0x8001,
            0x0002,
            0x0001,
            0x01,
            MessageType::RequestNoReturn,
            ReturnCode::Ok,
            Bytes::new(),
        );
        let bytes = msg.to_bytes();
        let mut de = Deserializer::new(&bytes);
        let parsed = SomeipMessage::deserialize(&mut de).unwrap();
        assert_eq!(parsed, msg);
        assert_eq!(de.remaining(), 0);
    }

    #[test]
    fn magic_cookie_classification() {
        let bytes = WireFrame::client_magic_cookie_bytes();
        let mut de = Deserializer::new(&bytes);
        assert_eq!(WireFrame::deserialize(&mut de).unwrap(), WireFrame::ClientMagicCookie);

        let bytes = WireFrame::service_magic_cookie_bytes();
        let mut de = Deserializer::new(&bytes);
        assert_eq!(WireFrame::deserialize(&mut de).unwrap(), WireFrame::ServiceMagicCookie);
    }

    #[test]
    fn failed_deserialize_leaves_cursor_at_frame_start() {
        let bytes = [0u8; 4];
        let mut de = Deserializer::new(&bytes);
        let before = de.position();
        assert!(SomeipMessage::deserialize(&mut de).is_err());
        assert_eq!(de.position(), before);
    }

    proptest! {
        #[test]
        fn round_trip_arbitrary_payload(
            service_id in any::<u16>(),
            method_id in any::<u16>(),
            client_id in any::<u16>(),
            session_id in any::<u16>(),
            payload in prop::collection::vec(any::<u8>(), 0..256),
        ) {
            let msg = SomeipMessage::new(
                service_id,
                method_id,
                client_id,
                session_id,
                1,
                MessageType::Request,
                ReturnCode::Ok,
                payload,
            );
            let bytes = msg.to_bytes();
            let mut de = Deserializer::new(&bytes);
            let parsed = SomeipMessage::deserialize(&mut de).unwrap();
            prop_assert_eq!(parsed, msg);
        }
    }
}
