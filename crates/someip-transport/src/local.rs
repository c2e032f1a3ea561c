//! Local IPC transport: the Unix-domain-socket protocol a routing manager
//! daemon speaks to the applications attached to it on the same host
//! (§4.4).
//!
//! Distinct from TCP/UDP framing: every local message is wrapped in an
//! explicit-length envelope (`start_tag | command | client_id | length |
//! payload | end_tag`) rather than relying on the SOME/IP header's own
//! length field, because control commands like `RegisterApplication` carry
//! no SOME/IP header at all.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use someip_proto::{consts, ids::ClientId};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{UnixListener, UnixStream},
    sync::mpsc,
};

use crate::errors::TransportError;

/// Local-IPC command tags (§4.4, supplementing the base wire format with
/// the routing manager's attach/offer/subscribe control plane).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCommand {
    /// An application announces itself to the routing manager. The
    /// manager's reply carries the same command tag back with the newly
    /// assigned `client_id` in the envelope header and an empty payload.
    RegisterApplication,
    /// An application is detaching cleanly.
    DeregisterApplication,
    /// An application publishes (or withdraws, `ttl == 0`) a service.
    OfferService,
    /// An application withdraws a previously offered service.
    StopOfferService,
    /// An application requests a remote service by id.
    RequestService,
    /// An application releases a previously requested service.
    ReleaseService,
    /// An application subscribes to an eventgroup.
    SubscribeEventgroup,
    /// An application unsubscribes from an eventgroup.
    UnsubscribeEventgroup,
    /// The routing manager acknowledges or rejects a subscription.
    SubscribeEventgroupAck,
    /// An application registers interest in a specific event.
    RegisterEvent,
    /// A SOME/IP message is carried as the payload, to be routed further.
    Send,
    /// Liveness probe the routing manager sends to an attached application.
    Ping,
    /// Reply to [`LocalCommand::Ping`].
    Pong,
    /// Tag not recognized by this implementation.
    Unknown(u8),
}

impl LocalCommand {
    const REGISTER_APPLICATION: u8 = 0x10;
    const DEREGISTER_APPLICATION: u8 = 0x11;
    const OFFER_SERVICE: u8 = 0x12;
    const STOP_OFFER_SERVICE: u8 = 0x13;
    const REQUEST_SERVICE: u8 = 0x14;
    const RELEASE_SERVICE: u8 = 0x15;
    const SUBSCRIBE_EVENTGROUP: u8 = 0x16;
    const UNSUBSCRIBE_EVENTGROUP: u8 = 0x17;
    const SUBSCRIBE_EVENTGROUP_ACK: u8 = 0x18;
    const REGISTER_EVENT: u8 = 0x22;
    const SEND: u8 = 0x40;
    const PING: u8 = 0xE0;
    const PONG: u8 = 0xE1;

    #[must_use]
    fn from_u8(value: u8) -> Self {
        match value {
            Self::REGISTER_APPLICATION => Self::RegisterApplication,
            Self::DEREGISTER_APPLICATION => Self::DeregisterApplication,
            Self::OFFER_SERVICE => Self::OfferService,
            Self::STOP_OFFER_SERVICE => Self::StopOfferService,
            Self::REQUEST_SERVICE => Self::RequestService,
            Self::RELEASE_SERVICE => Self::ReleaseService,
            Self::SUBSCRIBE_EVENTGROUP => Self::SubscribeEventgroup,
            Self::UNSUBSCRIBE_EVENTGROUP => Self::UnsubscribeEventgroup,
            Self::SUBSCRIBE_EVENTGROUP_ACK => Self::SubscribeEventgroupAck,
            Self::REGISTER_EVENT => Self::RegisterEvent,
            Self::SEND => Self::Send,
            Self::PING => Self::Ping,
            Self::PONG => Self::Pong,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    fn to_u8(self) -> u8 {
        match self {
            Self::RegisterApplication => Self::REGISTER_APPLICATION,
            Self::DeregisterApplication => Self::DEREGISTER_APPLICATION,
            Self::OfferService => Self::OFFER_SERVICE,
            Self::StopOfferService => Self::STOP_OFFER_SERVICE,
            Self::RequestService => Self::REQUEST_SERVICE,
            Self::ReleaseService => Self::RELEASE_SERVICE,
            Self::SubscribeEventgroup => Self::SUBSCRIBE_EVENTGROUP,
            Self::UnsubscribeEventgroup => Self::UNSUBSCRIBE_EVENTGROUP,
            Self::SubscribeEventgroupAck => Self::SUBSCRIBE_EVENTGROUP_ACK,
            Self::RegisterEvent => Self::REGISTER_EVENT,
            Self::Send => Self::SEND,
            Self::Ping => Self::PING,
            Self::Pong => Self::PONG,
            Self::Unknown(raw) => raw,
        }
    }
}

/// One local-IPC envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEnvelope {
    /// The command this envelope carries.
    pub command: LocalCommand,
    /// The application this envelope is to/from.
    pub client_id: ClientId,
    /// Command-specific payload (e.g. a SOME/IP frame for `Send`).
    pub payload: Bytes,
}

impl LocalEnvelope {
    fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(15 + self.payload.len());
        buf.put_u32(consts::LOCAL_START_TAG);
        buf.put_u8(self.command.to_u8());
        buf.put_u16(self.client_id);
        #[allow(clippy::cast_possible_truncation)]
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        buf.put_u32(consts::LOCAL_END_TAG);
        buf.to_vec()
    }
}

const ENVELOPE_PREFIX_LEN: usize = 4 + 1 + 2 + 4; // start_tag + command + client_id + length
const ENVELOPE_SUFFIX_LEN: usize = 4; // end_tag

#[derive(Debug, Default)]
struct LocalFramer {
    buf: BytesMut,
}

impl LocalFramer {
    fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn next_envelope(&mut self) -> Result<Option<LocalEnvelope>, TransportError> {
        if self.buf.len() < ENVELOPE_PREFIX_LEN {
            return Ok(None);
        }
        let start_tag = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        if start_tag != consts::LOCAL_START_TAG {
            tracing::warn!(start_tag, "local IPC desync, dropping byte to resync");
            self.buf.advance(1);
            return Ok(None);
        }
        let command = LocalCommand::from_u8(self.buf[4]);
        let client_id = u16::from_be_bytes([self.buf[5], self.buf[6]]);
        #[allow(clippy::cast_possible_truncation)]
        let length = u32::from_be_bytes([self.buf[7], self.buf[8], self.buf[9], self.buf[10]]) as usize;
        let total = ENVELOPE_PREFIX_LEN + length + ENVELOPE_SUFFIX_LEN;
        if self.buf.len() < total {
            return Ok(None);
        }
        let payload = Bytes::copy_from_slice(&self.buf[ENVELOPE_PREFIX_LEN..ENVELOPE_PREFIX_LEN + length]);
        let end_bytes = &self.buf[ENVELOPE_PREFIX_LEN + length..total];
        let end_tag = u32::from_be_bytes([end_bytes[0], end_bytes[1], end_bytes[2], end_bytes[3]]);
        self.buf.advance(total);
        if end_tag != consts::LOCAL_END_TAG {
            tracing::warn!(end_tag, "local IPC envelope missing end tag, discarding");
            return Ok(None);
        }
        Ok(Some(LocalEnvelope { command, client_id, payload }))
    }
}

/// One local-IPC connection (either the routing manager's side of an
/// accepted socket, or an application's side of a connect).
pub struct LocalConnection {
    /// Send envelopes to the peer.
    pub outbound: mpsc::Sender<LocalEnvelope>,
    /// Receive envelopes from the peer.
    pub inbound: mpsc::Receiver<LocalEnvelope>,
    task: tokio::task::JoinHandle<()>,
}

impl LocalConnection {
    /// Stop the background I/O task.
    pub fn close(self) {
        self.task.abort();
    }

    fn spawn(stream: UnixStream) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        let task = tokio::spawn(run_connection(stream, outbound_rx, inbound_tx));
        Self { outbound: outbound_tx, inbound: inbound_rx, task }
    }

    /// Connect to the routing manager's local-IPC socket.
    pub async fn connect(path: &str) -> Result<Self, TransportError> {
        let stream = UnixStream::connect(path).await?;
        Ok(Self::spawn(stream))
    }
}

async fn run_connection(
    stream: UnixStream,
    mut outbound: mpsc::Receiver<LocalEnvelope>,
    inbound: mpsc::Sender<LocalEnvelope>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let mut framer = LocalFramer::default();
    let mut read_buf = [0u8; 4096];

    loop {
        tokio::select! {
            read_result = reader.read(&mut read_buf) => {
                match read_result {
                    Ok(0) => break,
                    Ok(n) => {
                        framer.feed(&read_buf[..n]);
                        loop {
                            match framer.next_envelope() {
                                Ok(Some(envelope)) => {
                                    if inbound.send(envelope).await.is_err() {
                                        return;
                                    }
                                },
                                Ok(None) => break,
                                Err(err) => {
                                    tracing::warn!(%err, "local IPC decode error");
                                    break;
                                },
                            }
                        }
                    },
                    Err(err) => {
                        tracing::warn!(%err, "local IPC read error");
                        break;
                    },
                }
            },
            maybe_envelope = outbound.recv() => {
                let Some(envelope) = maybe_envelope else { break };
                if let Err(err) = writer.write_all(&envelope.encode()).await {
                    tracing::warn!(%err, "local IPC write error");
                    break;
                }
            },
        }
    }
}

/// Listens on a Unix-domain socket for applications attaching to the
/// routing manager.
pub struct LocalServer {
    listener: UnixListener,
}

impl LocalServer {
    /// Bind the routing manager's local-IPC listening socket. The caller is
    /// responsible for removing a stale socket file at `path` beforehand if
    /// the previous process didn't shut down cleanly.
    pub fn bind(path: &str) -> Result<Self, TransportError> {
        let listener = UnixListener::bind(path)?;
        Ok(Self { listener })
    }

    /// Accept the next application connection.
    pub async fn accept(&self) -> Result<LocalConnection, TransportError> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(LocalConnection::spawn(stream))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_framer() {
        let envelope = LocalEnvelope {
            command: LocalCommand::Send,
            client_id: 0x0042,
            payload: Bytes::from_static(&[1, 2, 3, 4]),
        };
        let mut framer = LocalFramer::default();
        framer.feed(&envelope.encode());
        let decoded = framer.next_envelope().unwrap().unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn unknown_command_byte_round_trips() {
        let envelope = LocalCommand::from_u8(0xEE);
        assert_eq!(envelope, LocalCommand::Unknown(0xEE));
        assert_eq!(envelope.to_u8(), 0xEE);
    }
}
