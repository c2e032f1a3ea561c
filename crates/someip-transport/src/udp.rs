//! UDP endpoint: unicast and multicast datagrams (§4.2, §4.6).
//!
//! Unlike TCP, a UDP datagram is always exactly one frame — there is no
//! stream to resync, so this module has no equivalent of
//! [`crate::parser::StreamFramer`]. Datagrams are also size-bounded up
//! front: [`consts::MAX_UDP_MESSAGE_SIZE`] matches the historical SOME/IP
//! default MTU budget, and anything larger is rejected before it is ever
//! sent rather than silently fragmented by the OS.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use someip_proto::{codec::Deserializer, consts, message::WireFrame};
use tokio::net::UdpSocket;

use crate::errors::TransportError;

/// A UDP socket bound for SOME/IP traffic, optionally joined to the
/// Service Discovery multicast group.
pub struct UdpEndpoint {
    socket: UdpSocket,
}

impl UdpEndpoint {
    /// Bind a UDP socket at `addr`.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    /// Bind and join the given IPv4 multicast group on the given local
    /// interface — the Service Discovery endpoint uses this to receive
    /// multicast offers/finds (§4.6).
    pub async fn bind_multicast(
        bind_addr: SocketAddrV4,
        group: Ipv4Addr,
        interface: Ipv4Addr,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(SocketAddr::V4(bind_addr)).await?;
        socket.join_multicast_v4(group, interface)?;
        Ok(Self { socket })
    }

    /// The address actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    /// Send one frame as a single datagram. Rejects frames that would
    /// exceed [`consts::MAX_UDP_MESSAGE_SIZE`] rather than letting the OS
    /// fragment them.
    pub async fn send_to(&self, frame: &WireFrame, dest: SocketAddr) -> Result<(), TransportError> {
        let bytes = encode(frame);
        if bytes.len() > consts::MAX_UDP_MESSAGE_SIZE {
            return Err(TransportError::MessageTooLarge {
                size: bytes.len(),
                limit: consts::MAX_UDP_MESSAGE_SIZE,
            });
        }
        self.socket.send_to(&bytes, dest).await?;
        Ok(())
    }

    /// Receive the next datagram and decode every frame concatenated into
    /// it. A batched offer or batched event notification packs more than
    /// one SOME/IP message into a single datagram (§4.4, §6); each is
    /// parsed in turn by consuming exactly `length + 8` bytes, and a tail
    /// that doesn't form a complete frame is dropped rather than failing
    /// the whole datagram, as long as at least one frame decoded.
    pub async fn recv(&self) -> Result<(Vec<WireFrame>, SocketAddr), TransportError> {
        let mut buf = [0u8; consts::MAX_UDP_MESSAGE_SIZE];
        let (len, peer) = self.socket.recv_from(&mut buf).await?;
        let frames = decode_datagram(&buf[..len])?;
        Ok((frames, peer))
    }
}

fn decode_datagram(bytes: &[u8]) -> Result<Vec<WireFrame>, TransportError> {
    let mut de = Deserializer::new(bytes);
    let mut frames = Vec::new();
    while !de.is_empty() {
        match WireFrame::deserialize(&mut de) {
            Ok(frame) => frames.push(frame),
            Err(err) => {
                if frames.is_empty() {
                    return Err(TransportError::Protocol(err));
                }
                tracing::warn!(%err, remaining = de.remaining(), "dropping malformed tail of UDP datagram");
                break;
            },
        }
    }
    Ok(frames)
}

fn encode(frame: &WireFrame) -> Vec<u8> {
    match frame {
        WireFrame::Message(msg) => msg.to_bytes(),
        WireFrame::ClientMagicCookie => WireFrame::client_magic_cookie_bytes().to_vec(),
        WireFrame::ServiceMagicCookie => WireFrame::service_magic_cookie_bytes().to_vec(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use someip_proto::{enums::MessageType, message::SomeipMessage, ReturnCode};

    use super::*;

    #[tokio::test]
    async fn unicast_round_trip() {
        let a = UdpEndpoint::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpEndpoint::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        let msg = SomeipMessage::new(1, 1, 1, 1, 1, MessageType::Notification, ReturnCode::Ok, vec![1, 2, 3]);
        a.send_to(&WireFrame::Message(msg.clone()), b_addr).await.unwrap();

        let (frames, _peer) = b.recv().await.unwrap();
        assert_eq!(frames, vec![WireFrame::Message(msg)]);
    }

    #[tokio::test]
    async fn batched_messages_in_one_datagram_all_decode() {
        let a = UdpEndpoint::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpEndpoint::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        let first = SomeipMessage::new(1, 1, 1, 1, 1, MessageType::Notification, ReturnCode::Ok, vec![1, 2, 3]);
        let second = SomeipMessage::new(2, 2, 2, 2, 1, MessageType::Notification, ReturnCode::Ok, vec![4, 5]);
        let mut batched = first.to_bytes();
        batched.extend_from_slice(&second.to_bytes());
        a.socket.send_to(&batched, b_addr).await.unwrap();

        let (frames, _peer) = b.recv().await.unwrap();
        assert_eq!(frames, vec![WireFrame::Message(first), WireFrame::Message(second)]);
    }

    #[tokio::test]
    async fn oversized_message_is_rejected_before_sending() {
        let a = UdpEndpoint::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpEndpoint::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        let huge_payload = vec![0u8; consts::MAX_UDP_MESSAGE_SIZE];
        let msg = SomeipMessage::new(1, 1, 1, 1, 1, MessageType::Notification, ReturnCode::Ok, huge_payload);
        let result = a.send_to(&WireFrame::Message(msg), b_addr).await;
        assert!(matches!(result, Err(TransportError::MessageTooLarge { .. })));
    }
}
