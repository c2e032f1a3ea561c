//! The routing proxy: the connection an application process other than the
//! routing host uses to reach it over local IPC (§4.4, §4.5).

use bytes::Bytes;
use someip_core::ServiceKey;
use someip_proto::{
    codec::Serializer,
    ids::{ClientId, EventgroupId, MajorVersion, MinorVersion, Ttl},
};
use someip_transport::{LocalCommand, LocalConnection, LocalEnvelope, TransportError};

/// `(service, instance, major, minor)`, the control-payload shape shared
/// by `OfferService`/`StopOfferService`/`RequestService`/`ReleaseService`.
fn encode_service_descriptor(key: ServiceKey, major: MajorVersion, minor: MinorVersion) -> Bytes {
    let mut ser = Serializer::new();
    ser.write_u16(key.service_id);
    ser.write_u16(key.instance_id);
    ser.write_u8(major);
    ser.write_u32(minor);
    Bytes::from(ser.finish())
}

#[cfg(test)]
fn decode_service_descriptor(payload: &[u8]) -> Result<(ServiceKey, MajorVersion, MinorVersion), TransportError> {
    use someip_proto::codec::Deserializer;
    let mut de = Deserializer::new(payload);
    let service_id = de.read_u16()?;
    let instance_id = de.read_u16()?;
    let major = de.read_u8()?;
    let minor = de.read_u32()?;
    Ok((ServiceKey::new(service_id, instance_id), major, minor))
}

fn encode_eventgroup_descriptor(key: ServiceKey, eventgroup_id: EventgroupId, major: MajorVersion, ttl: Ttl) -> Bytes {
    let mut ser = Serializer::new();
    ser.write_u16(key.service_id);
    ser.write_u16(key.instance_id);
    ser.write_u16(eventgroup_id);
    ser.write_u8(major);
    ser.write_u32(ttl);
    Bytes::from(ser.finish())
}

/// A local application's connection to the routing host.
pub struct RoutingManagerProxy {
    connection: LocalConnection,
    client_id: ClientId,
}

impl RoutingManagerProxy {
    /// Connect to the routing host at `path` and complete the
    /// `RegisterApplication` handshake, learning the client id the host
    /// assigned us.
    pub async fn attach(path: &str) -> Result<Self, TransportError> {
        let mut connection = LocalConnection::connect(path).await?;
        connection
            .outbound
            .send(LocalEnvelope { command: LocalCommand::RegisterApplication, client_id: 0, payload: Bytes::new() })
            .await
            .map_err(|_| TransportError::Closed)?;
        let ack = connection.inbound.recv().await.ok_or(TransportError::Closed)?;
        Ok(Self { connection, client_id: ack.client_id })
    }

    /// The client id the routing host assigned this application.
    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Announce `key` as offered (or, with `ttl == 0`, withdraw a prior
    /// offer — callers use [`RoutingManagerProxy::stop_offer_service`]
    /// instead since the control plane uses a distinct command for that).
    pub async fn offer_service(&mut self, key: ServiceKey, major: MajorVersion, minor: MinorVersion) -> Result<(), TransportError> {
        self.send(LocalCommand::OfferService, encode_service_descriptor(key, major, minor)).await
    }

    /// Withdraw a previously announced offer.
    pub async fn stop_offer_service(&mut self, key: ServiceKey, major: MajorVersion, minor: MinorVersion) -> Result<(), TransportError> {
        self.send(LocalCommand::StopOfferService, encode_service_descriptor(key, major, minor)).await
    }

    /// Ask the routing host to resolve and route traffic to `key`.
    pub async fn request_service(&mut self, key: ServiceKey, major: MajorVersion, minor: MinorVersion) -> Result<(), TransportError> {
        self.send(LocalCommand::RequestService, encode_service_descriptor(key, major, minor)).await
    }

    /// Release a previously requested service.
    pub async fn release_service(&mut self, key: ServiceKey, major: MajorVersion, minor: MinorVersion) -> Result<(), TransportError> {
        self.send(LocalCommand::ReleaseService, encode_service_descriptor(key, major, minor)).await
    }

    /// Subscribe to an eventgroup.
    pub async fn subscribe(&mut self, key: ServiceKey, eventgroup_id: EventgroupId, major: MajorVersion, ttl: Ttl) -> Result<(), TransportError> {
        self.send(LocalCommand::SubscribeEventgroup, encode_eventgroup_descriptor(key, eventgroup_id, major, ttl)).await
    }

    /// Unsubscribe from an eventgroup.
    pub async fn unsubscribe(&mut self, key: ServiceKey, eventgroup_id: EventgroupId, major: MajorVersion) -> Result<(), TransportError> {
        self.send(LocalCommand::UnsubscribeEventgroup, encode_eventgroup_descriptor(key, eventgroup_id, major, 0)).await
    }

    /// Send a fully-formed SOME/IP frame through the routing host.
    pub async fn send_message(&mut self, frame: Bytes) -> Result<(), TransportError> {
        self.send(LocalCommand::Send, frame).await
    }

    /// Receive the next envelope the routing host sends us (a routed
    /// message, a subscription ack, or a liveness ping).
    pub async fn recv(&mut self) -> Option<LocalEnvelope> {
        self.connection.inbound.recv().await
    }

    /// Detach cleanly.
    pub async fn detach(mut self) -> Result<(), TransportError> {
        self.send(LocalCommand::DeregisterApplication, Bytes::new()).await
    }

    async fn send(&mut self, command: LocalCommand, payload: Bytes) -> Result<(), TransportError> {
        self.connection
            .outbound
            .send(LocalEnvelope { command, client_id: self.client_id, payload })
            .await
            .map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn service_descriptor_round_trips() {
        let key = ServiceKey::new(0x1234, 1);
        let encoded = encode_service_descriptor(key, 1, 42);
        let (decoded_key, major, minor) = decode_service_descriptor(&encoded).unwrap();
        assert_eq!(decoded_key, key);
        assert_eq!(major, 1);
        assert_eq!(minor, 42);
    }
}
