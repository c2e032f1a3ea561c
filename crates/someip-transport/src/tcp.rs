//! TCP endpoints: a reconnecting client and an accepting server, both
//! framing the stream with [`StreamFramer`] and exchanging magic cookies on
//! connect (§4.2, §4.4).

use std::net::SocketAddr;

use someip_proto::{consts, message::WireFrame};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::mpsc,
};

use crate::{errors::TransportError, parser::StreamFramer};

/// A frame received on an endpoint, paired with the remote address it
/// arrived from (useful for servers juggling many connections).
#[derive(Debug, Clone)]
pub struct Inbound {
    /// The peer the frame arrived from.
    pub peer: SocketAddr,
    /// The decoded frame.
    pub frame: WireFrame,
}

/// Handle to one established TCP connection (client or accepted server
/// side). Frames are exchanged through channels; a background task owns the
/// socket.
pub struct TcpConnection {
    /// Send frames to the peer.
    pub outbound: mpsc::Sender<WireFrame>,
    /// Receive frames from the peer.
    pub inbound: mpsc::Receiver<Inbound>,
    /// Remote address of this connection.
    pub peer: SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

impl TcpConnection {
    /// Stop the background I/O task, closing the socket.
    pub fn close(self) {
        self.task.abort();
    }

    fn spawn(stream: TcpStream, peer: SocketAddr) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        let task = tokio::spawn(run_connection(stream, peer, outbound_rx, inbound_tx));
        Self { outbound: outbound_tx, inbound: inbound_rx, peer, task }
    }
}

async fn run_connection(
    stream: TcpStream,
    peer: SocketAddr,
    mut outbound: mpsc::Receiver<WireFrame>,
    inbound: mpsc::Sender<Inbound>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let mut framer = StreamFramer::new();
    let mut read_buf = [0u8; 4096];

    loop {
        tokio::select! {
            read_result = reader.read(&mut read_buf) => {
                match read_result {
                    Ok(0) => {
                        tracing::debug!(%peer, "peer closed TCP connection");
                        break;
                    },
                    Ok(n) => {
                        framer.feed(&read_buf[..n]);
                        loop {
                            match framer.next_frame() {
                                Ok(Some(frame)) => {
                                    if inbound.send(Inbound { peer, frame }).await.is_err() {
                                        return;
                                    }
                                },
                                Ok(None) => break,
                                Err(err) => {
                                    tracing::warn!(%peer, %err, "TCP frame decode error");
                                    break;
                                },
                            }
                        }
                    },
                    Err(err) => {
                        tracing::warn!(%peer, %err, "TCP read error");
                        break;
                    },
                }
            },
            maybe_frame = outbound.recv() => {
                let Some(frame) = maybe_frame else { break };
                let bytes = encode(&frame);
                if let Err(err) = writer.write_all(&bytes).await {
                    tracing::warn!(%peer, %err, "TCP write error");
                    break;
                }
            },
        }
    }
}

fn encode(frame: &WireFrame) -> Vec<u8> {
    match frame {
        WireFrame::Message(msg) => msg.to_bytes(),
        WireFrame::ClientMagicCookie => WireFrame::client_magic_cookie_bytes().to_vec(),
        WireFrame::ServiceMagicCookie => WireFrame::service_magic_cookie_bytes().to_vec(),
    }
}

/// Listens for inbound TCP connections, handing each accepted socket off to
/// its own [`TcpConnection`] task. A SOME/IP server endpoint sends a service
/// magic cookie immediately after accepting, per §4.2.
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    /// Bind a listening socket.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// The address actually bound to (useful when `addr.port() == 0`).
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept the next connection and send it the service magic cookie.
    pub async fn accept(&self) -> Result<TcpConnection, TransportError> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true).ok();
        let connection = TcpConnection::spawn(stream, peer);
        let _ = connection.outbound.send(WireFrame::ServiceMagicCookie).await;
        Ok(connection)
    }
}

/// Connects to a remote TCP service, retrying with exponential backoff
/// (bounded by [`consts::RECONNECT_BACKOFF_INITIAL`] and
/// [`consts::RECONNECT_BACKOFF_MAX`]) until the connection succeeds or the
/// caller drops the returned future.
pub async fn connect_with_backoff(addr: SocketAddr) -> TcpConnection {
    let mut backoff = consts::RECONNECT_BACKOFF_INITIAL;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                stream.set_nodelay(true).ok();
                let connection = TcpConnection::spawn(stream, addr);
                let _ = connection.outbound.send(WireFrame::ClientMagicCookie).await;
                return connection;
            },
            Err(err) => {
                tracing::debug!(%addr, %err, ?backoff, "TCP connect failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(consts::RECONNECT_BACKOFF_MAX);
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use someip_proto::{enums::MessageType, message::SomeipMessage, ReturnCode};

    use super::*;

    #[tokio::test]
    async fn client_and_server_exchange_a_frame() {
        let server = TcpServer::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = server.local_addr().unwrap();

        let accept_task = tokio::spawn(async move { server.accept().await.unwrap() });
        let mut client = connect_with_backoff(addr).await;
        let mut server_conn = accept_task.await.unwrap();

        // both sides see the other's magic cookie first.
        assert!(matches!(
            client.inbound.recv().await.unwrap().frame,
            WireFrame::ServiceMagicCookie
        ));
        assert!(matches!(
            server_conn.inbound.recv().await.unwrap().frame,
            WireFrame::ClientMagicCookie
        ));

        let msg = SomeipMessage::new(1, 1, 1, 1, 1, MessageType::RequestNoReturn, ReturnCode::Ok, vec![9, 9]);
        client.outbound.send(WireFrame::Message(msg.clone())).await.unwrap();

        let received = server_conn.inbound.recv().await.unwrap();
        assert_eq!(received.frame, WireFrame::Message(msg));
    }
}
