//! The daemon reactor: binds the TCP, UDP, SD-multicast, and local-IPC
//! endpoints, owns the routing tables and the Service Discovery engine, and
//! fans every source of I/O into one event loop (§4.5, §4.6, §5).
//!
//! `tokio::select!` cannot multiplex a dynamically growing set of
//! per-connection channels, so each accepted connection gets a small
//! forwarder task that drains its own `inbound` receiver into one
//! long-lived aggregator channel the reactor actually selects on.

use std::{
    collections::HashMap,
    net::{SocketAddr, SocketAddrV4},
    sync::Arc,
    time::Instant,
};

use bytes::Bytes;
use someip_core::{env::Environment, EventgroupKey, ServiceEndpoints, ServiceInfo, ServiceKey};
use someip_proto::{
    codec::Deserializer,
    ids::{self, ClientId, EventgroupId, MajorVersion, MinorVersion, Ttl},
    message::{SomeipMessage, WireFrame},
    sd::SdMessage,
};
use someip_routing::{dispatch::ReplyPath, RoutingAction, RoutingManagerHost};
use someip_sd::{SdAction, SdEngine, SdEvent};
use someip_transport::{
    Inbound as TcpInbound, LocalCommand, LocalConnection, LocalEnvelope, LocalServer, TcpConnection, TcpServer,
    TransportError, UdpEndpoint,
};
use tokio::sync::mpsc;

use crate::{config::ServerConfig, env::SystemEnv, error::ServerError};

/// Identifies one accepted local-IPC connection before it completes
/// `RegisterApplication` and becomes known by its `client_id`.
type LocalSlot = u64;

enum DaemonEvent {
    LocalAccepted { slot: LocalSlot, outbound: mpsc::Sender<LocalEnvelope> },
    LocalEnvelope { slot: LocalSlot, envelope: LocalEnvelope },
    LocalClosed { slot: LocalSlot },
    TcpAccepted { peer: SocketAddr, outbound: mpsc::Sender<WireFrame> },
    TcpFrame(TcpInbound),
    TcpClosed { peer: SocketAddr },
    UdpFrame { frame: WireFrame, peer: SocketAddr },
    SdDatagram { message: SdMessage, peer: SocketAddr },
    SdTick,
}

const EVENT_CHANNEL_DEPTH: usize = 1024;
/// `(service_id, method_id)` for the well-known SD service, used to key the
/// daemon's own outbound session counter.
const SD_MESSAGE_ID: u32 = ((ids::SD_SERVICE as u32) << 16) | (ids::SD_METHOD as u32);

/// The running daemon: routing tables, Service Discovery engine, and every
/// bound endpoint.
pub struct Daemon {
    config: ServerConfig,
    env: SystemEnv,
    host: RoutingManagerHost,
    sd: SdEngine<Instant>,
    tcp_server: Option<TcpServer>,
    local_server: Option<LocalServer>,
    udp_unicast: Arc<UdpEndpoint>,
    udp_sd: Arc<UdpEndpoint>,
    events_tx: mpsc::Sender<DaemonEvent>,
    events_rx: mpsc::Receiver<DaemonEvent>,
    local_outbound: HashMap<ClientId, mpsc::Sender<LocalEnvelope>>,
    pending_local: HashMap<LocalSlot, mpsc::Sender<LocalEnvelope>>,
    local_clients: HashMap<LocalSlot, ClientId>,
    tcp_outbound: HashMap<SocketAddr, mpsc::Sender<WireFrame>>,
    requesters: HashMap<ServiceKey, Vec<ClientId>>,
}

impl Daemon {
    /// Bind every configured endpoint and construct an idle daemon. Does
    /// not start serving traffic until [`Daemon::run`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ServerEndpointCreationFailed`] if the TCP,
    /// UDP, or SD-multicast socket fails to bind, or
    /// [`ServerError::ClientEndpointCreationFailed`] if the local-IPC
    /// rendezvous socket fails to bind.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let tcp_server =
            TcpServer::bind(config.tcp_bind).await.map_err(ServerError::ServerEndpointCreationFailed)?;
        let udp_unicast =
            UdpEndpoint::bind(config.udp_bind).await.map_err(ServerError::ServerEndpointCreationFailed)?;
        let udp_sd = if config.sd_enabled {
            let bind_addr = SocketAddrV4::new(std::net::Ipv4Addr::UNSPECIFIED, config.sd_multicast_port);
            UdpEndpoint::bind_multicast(bind_addr, config.sd_multicast_group, config.sd_interface)
                .await
                .map_err(ServerError::ServerEndpointCreationFailed)?
        } else {
            UdpEndpoint::bind("0.0.0.0:0".parse().unwrap_or_else(|_| unreachable!()))
                .await
                .map_err(ServerError::ServerEndpointCreationFailed)?
        };
        let local_server =
            LocalServer::bind(&config.local_endpoint_path).map_err(ServerError::ClientEndpointCreationFailed)?;

        let env = SystemEnv::new();
        let initial_delay = env.random_duration(config.sd_initial_delay_min, config.sd_initial_delay_max);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);

        Ok(Self {
            config,
            env,
            host: RoutingManagerHost::new(),
            sd: SdEngine::new(true, initial_delay),
            tcp_server: Some(tcp_server),
            local_server: Some(local_server),
            udp_unicast: Arc::new(udp_unicast),
            udp_sd: Arc::new(udp_sd),
            events_tx,
            events_rx,
            local_outbound: HashMap::new(),
            pending_local: HashMap::new(),
            local_clients: HashMap::new(),
            tcp_outbound: HashMap::new(),
            requesters: HashMap::new(),
        })
    }

    /// Run the reactor until the process is asked to stop. Currently runs
    /// until an accept loop exits or the event channel closes, matching the
    /// teacher's long-running server convention; graceful shutdown signals
    /// are out of scope for this layer.
    pub async fn run(mut self) -> Result<(), ServerError> {
        self.spawn_accept_loops();
        self.spawn_udp_loops();
        self.spawn_sd_ticker();

        while let Some(event) = self.events_rx.recv().await {
            self.handle_event(event);
        }
        Ok(())
    }

    fn spawn_accept_loops(&mut self) {
        if let Some(server) = self.local_server.take() {
            tokio::spawn(local_accept_loop(server, self.events_tx.clone()));
        }
        if let Some(server) = self.tcp_server.take() {
            tokio::spawn(tcp_accept_loop(server, self.events_tx.clone()));
        }
    }

    fn spawn_udp_loops(&self) {
        let udp_unicast = Arc::clone(&self.udp_unicast);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            loop {
                match udp_unicast.recv().await {
                    Ok((frames, peer)) => {
                        for frame in frames {
                            if events.send(DaemonEvent::UdpFrame { frame, peer }).await.is_err() {
                                return;
                            }
                        }
                    },
                    Err(err) => tracing::warn!(%err, "UDP unicast receive error"),
                }
            }
        });

        if self.config.sd_enabled {
            let udp_sd = Arc::clone(&self.udp_sd);
            let events = self.events_tx.clone();
            tokio::spawn(async move {
                loop {
                    match udp_sd.recv().await {
                        Ok((frames, peer)) => {
                            for frame in frames {
                                match frame {
                                    WireFrame::Message(message) => match SdMessage::from_someip_message(&message) {
                                        Ok(sd_message) => {
                                            if events
                                                .send(DaemonEvent::SdDatagram { message: sd_message, peer })
                                                .await
                                                .is_err()
                                            {
                                                return;
                                            }
                                        },
                                        Err(err) => tracing::warn!(%err, %peer, "malformed SD payload, dropping"),
                                    },
                                    _ => tracing::debug!(%peer, "ignoring non-message frame on SD socket"),
                                }
                            }
                        },
                        Err(err) => tracing::warn!(%err, "SD multicast receive error"),
                    }
                }
            });
        }
    }

    fn spawn_sd_ticker(&self) {
        if !self.config.sd_enabled {
            return;
        }
        let events = self.events_tx.clone();
        let period = self.config.watchdog_cycle;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if events.send(DaemonEvent::SdTick).await.is_err() {
                    return;
                }
            }
        });
    }

    fn handle_event(&mut self, event: DaemonEvent) {
        match event {
            DaemonEvent::LocalAccepted { slot, outbound } => {
                self.pending_local.insert(slot, outbound);
            },
            DaemonEvent::LocalEnvelope { slot, envelope } => self.handle_local_envelope(slot, envelope),
            DaemonEvent::LocalClosed { slot } => self.handle_local_closed(slot),
            DaemonEvent::TcpAccepted { peer, outbound } => {
                self.tcp_outbound.insert(peer, outbound);
            },
            DaemonEvent::TcpFrame(inbound) => self.handle_tcp_frame(inbound),
            DaemonEvent::TcpClosed { peer } => {
                self.tcp_outbound.remove(&peer);
            },
            DaemonEvent::UdpFrame { frame, peer } => self.handle_udp_frame(frame, peer),
            DaemonEvent::SdDatagram { message, peer } => self.handle_sd_datagram(message, peer),
            DaemonEvent::SdTick => self.handle_sd_tick(),
        }
    }

    fn handle_local_envelope(&mut self, slot: LocalSlot, envelope: LocalEnvelope) {
        match envelope.command {
            LocalCommand::RegisterApplication => self.handle_register(slot),
            LocalCommand::DeregisterApplication => self.handle_deregister(envelope.client_id),
            LocalCommand::OfferService => self.handle_offer(envelope),
            LocalCommand::StopOfferService => self.handle_stop_offer(envelope),
            LocalCommand::RequestService => self.handle_request_service(envelope),
            LocalCommand::ReleaseService => self.handle_release_service(envelope),
            LocalCommand::SubscribeEventgroup => self.handle_subscribe(envelope),
            LocalCommand::UnsubscribeEventgroup => self.handle_unsubscribe(envelope),
            LocalCommand::Send => self.handle_send(envelope),
            LocalCommand::Pong => {},
            other => tracing::debug!(?other, "unhandled local command"),
        }
    }

    fn handle_register(&mut self, slot: LocalSlot) {
        let Some(outbound) = self.pending_local.remove(&slot) else { return };
        match self.host.register_application() {
            Ok(client_id) => {
                self.local_clients.insert(slot, client_id);
                let ack = LocalEnvelope { command: LocalCommand::RegisterApplication, client_id, payload: Bytes::new() };
                let sender = outbound.clone();
                tokio::spawn(async move {
                    let _ = sender.send(ack).await;
                });
                self.local_outbound.insert(client_id, outbound);
            },
            Err(err) => tracing::warn!(%err, "failed to register application"),
        }
    }

    fn handle_deregister(&mut self, client_id: ClientId) {
        self.host.deregister_application(client_id);
        self.local_outbound.remove(&client_id);
    }

    fn handle_local_closed(&mut self, slot: LocalSlot) {
        self.pending_local.remove(&slot);
        if let Some(client_id) = self.local_clients.remove(&slot) {
            self.handle_deregister(client_id);
        }
    }

    fn handle_offer(&mut self, envelope: LocalEnvelope) {
        let Ok((key, major, minor)) = decode_service_descriptor(&envelope.payload) else { return };
        let info = ServiceInfo {
            major_version: major,
            minor_version: minor,
            endpoints: ServiceEndpoints {
                reliable: self.tcp_server_addr(),
                unreliable: self.udp_unicast.local_addr().ok(),
            },
        };
        self.host.offer_service(envelope.client_id, key, info.clone());
        if self.config.sd_enabled {
            self.sd.offer_service(key, info, self.env.now());
        }
    }

    fn tcp_server_addr(&self) -> Option<SocketAddr> {
        Some(self.config.tcp_bind)
    }

    fn handle_stop_offer(&mut self, envelope: LocalEnvelope) {
        let Ok((key, _major, _minor)) = decode_service_descriptor(&envelope.payload) else { return };
        self.host.stop_offer_service(key);
        if let Some((action, _events)) = self.sd.stop_offer_service(key) {
            self.dispatch_sd_action(action);
        }
    }

    fn handle_request_service(&mut self, envelope: LocalEnvelope) {
        let Ok((key, _major, _minor)) = decode_service_descriptor(&envelope.payload) else { return };
        self.requesters.entry(key).or_default().push(envelope.client_id);
        if self.host.services().find(key.service_id, key.instance_id).is_some() {
            self.push_availability(envelope.client_id, key, true);
        } else if self.config.sd_enabled {
            self.sd.find_service(key, self.env.now());
        }
    }

    fn handle_release_service(&mut self, envelope: LocalEnvelope) {
        let Ok((key, _major, _minor)) = decode_service_descriptor(&envelope.payload) else { return };
        if let Some(clients) = self.requesters.get_mut(&key) {
            clients.retain(|id| *id != envelope.client_id);
        }
        if self.config.sd_enabled {
            self.sd.stop_find_service(key);
        }
    }

    /// Push an `OfferService`/`StopOfferService` envelope to `client_id`,
    /// reused bidirectionally as the availability-change signal the
    /// application façade's handlers react to (no dedicated local-IPC
    /// command exists for it).
    fn push_availability(&self, client_id: ClientId, key: ServiceKey, available: bool) {
        let Some(sender) = self.local_outbound.get(&client_id).cloned() else { return };
        let command = if available { LocalCommand::OfferService } else { LocalCommand::StopOfferService };
        let payload = encode_availability(key);
        tokio::spawn(async move {
            let _ = sender.send(LocalEnvelope { command, client_id, payload }).await;
        });
    }

    fn handle_subscribe(&mut self, envelope: LocalEnvelope) {
        let Ok((key, eventgroup_id, major, ttl)) = decode_eventgroup_descriptor(&envelope.payload) else { return };
        let Some(endpoint) = self.udp_unicast.local_addr().ok() else { return };
        let eventgroup_key = EventgroupKey { service: key, eventgroup_id };
        self.host.subscribe(eventgroup_key, envelope.client_id, endpoint);
        if self.config.sd_enabled {
            if let Some(action) = self.sd.subscribe(eventgroup_key, major, ttl, endpoint, self.env.now()) {
                self.dispatch_sd_action(action);
            }
        }
    }

    fn handle_unsubscribe(&mut self, envelope: LocalEnvelope) {
        let Ok((key, eventgroup_id, major, _ttl)) = decode_eventgroup_descriptor(&envelope.payload) else { return };
        let eventgroup_key = EventgroupKey { service: key, eventgroup_id };
        self.host.unsubscribe(eventgroup_key, envelope.client_id);
        if self.config.sd_enabled {
            if let Some(action) = self.sd.unsubscribe(eventgroup_key, major, self.env.now()) {
                self.dispatch_sd_action(action);
            }
        }
    }

    fn handle_send(&mut self, envelope: LocalEnvelope) {
        let mut de = Deserializer::new(&envelope.payload);
        let Ok(message) = SomeipMessage::deserialize(&mut de) else { return };
        let target = ServiceKey::new(message.service_id(), ids::ANY_INSTANCE);
        match self.host.route_outbound(target, message) {
            Ok(action) => self.apply_routing_action(action),
            Err(err) => tracing::debug!(%err, client_id = envelope.client_id, "outbound routing failed"),
        }
    }

    fn handle_tcp_frame(&mut self, inbound: TcpInbound) {
        let WireFrame::Message(message) = inbound.frame else { return };
        for action in self.host.route_inbound(message, ReplyPath::Remote { addr: inbound.peer, reliable: true }) {
            self.apply_routing_action(action);
        }
    }

    fn handle_udp_frame(&mut self, frame: WireFrame, peer: SocketAddr) {
        let WireFrame::Message(message) = frame else { return };
        for action in self.host.route_inbound(message, ReplyPath::Remote { addr: peer, reliable: false }) {
            self.apply_routing_action(action);
        }
    }

    fn handle_sd_datagram(&mut self, message: SdMessage, peer: SocketAddr) {
        let (actions, events) = self.sd.on_message(&message, peer, self.env.now());
        for action in actions {
            self.dispatch_sd_action(action);
        }
        for event in events {
            self.apply_sd_event(event);
        }
    }

    fn handle_sd_tick(&mut self) {
        let (actions, events) = self.sd.tick(self.env.now());
        for action in actions {
            self.dispatch_sd_action(action);
        }
        for event in events {
            self.apply_sd_event(event);
        }
    }

    fn apply_sd_event(&mut self, event: SdEvent) {
        match event {
            SdEvent::ServiceAvailable { key, info } => {
                self.host.learn_remote_service(key, info);
                for client_id in self.requesters.get(&key).cloned().unwrap_or_default() {
                    self.push_availability(client_id, key, true);
                }
            },
            SdEvent::ServiceUnavailable { key } => {
                self.host.forget_remote_service(key);
                for client_id in self.requesters.get(&key).cloned().unwrap_or_default() {
                    self.push_availability(client_id, key, false);
                }
            },
            SdEvent::Subscribed { key, client_id, endpoint } => self.host.subscribe(key, client_id, endpoint),
            SdEvent::Unsubscribed { key, client_id } => self.host.unsubscribe(key, client_id),
            SdEvent::SubscriptionAccepted { .. } | SdEvent::SubscriptionRejected { .. } => {},
        }
    }

    fn dispatch_sd_action(&mut self, action: SdAction) {
        let session = self.host.next_session(ids::SD_CLIENT, SD_MESSAGE_ID);
        let udp_sd = Arc::clone(&self.udp_sd);
        let destination = SocketAddr::new(self.config.sd_multicast_group.into(), self.config.sd_multicast_port);
        tokio::spawn(async move {
            let (message, dest) = match action {
                SdAction::Multicast(sd_message) => (sd_message.into_someip_message(session), destination),
                SdAction::Unicast(sd_message, dest) => (sd_message.into_someip_message(session), dest),
            };
            if let Err(err) = udp_sd.send_to(&WireFrame::Message(message), dest).await {
                tracing::warn!(%err, %dest, "failed to send SD datagram");
            }
        });
    }

    fn apply_routing_action(&mut self, action: RoutingAction) {
        match action {
            RoutingAction::Deliver { client_id, message } => {
                if let Some(sender) = self.local_outbound.get(&client_id).cloned() {
                    let payload = Bytes::from(message.to_bytes());
                    let envelope = LocalEnvelope { command: LocalCommand::Send, client_id, payload };
                    tokio::spawn(async move {
                        let _ = sender.send(envelope).await;
                    });
                }
            },
            RoutingAction::SendReliable { endpoint, message } => {
                if let Some(sender) = self.tcp_outbound.get(&endpoint).cloned() {
                    tokio::spawn(async move {
                        let _ = sender.send(WireFrame::Message(message)).await;
                    });
                }
            },
            RoutingAction::SendUnreliable { endpoint, message } => {
                let udp_unicast = Arc::clone(&self.udp_unicast);
                tokio::spawn(async move {
                    let _ = udp_unicast.send_to(&WireFrame::Message(message), endpoint).await;
                });
            },
        }
    }
}

async fn local_accept_loop(server: LocalServer, events: mpsc::Sender<DaemonEvent>) {
    let mut next_slot: LocalSlot = 0;
    loop {
        match server.accept().await {
            Ok(connection) => {
                let slot = next_slot;
                next_slot += 1;
                let LocalConnection { outbound, mut inbound, .. } = connection;
                if events.send(DaemonEvent::LocalAccepted { slot, outbound }).await.is_err() {
                    return;
                }
                let forward = events.clone();
                tokio::spawn(async move {
                    while let Some(envelope) = inbound.recv().await {
                        if forward.send(DaemonEvent::LocalEnvelope { slot, envelope }).await.is_err() {
                            return;
                        }
                    }
                    let _ = forward.send(DaemonEvent::LocalClosed { slot }).await;
                });
            },
            Err(err) => {
                tracing::warn!(%err, "local IPC accept failed");
                return;
            },
        }
    }
}

async fn tcp_accept_loop(server: TcpServer, events: mpsc::Sender<DaemonEvent>) {
    loop {
        match server.accept().await {
            Ok(connection) => {
                let peer = connection.peer;
                let TcpConnection { outbound, mut inbound, .. } = connection;
                if events.send(DaemonEvent::TcpAccepted { peer, outbound }).await.is_err() {
                    return;
                }
                let forward = events.clone();
                tokio::spawn(async move {
                    while let Some(frame) = inbound.recv().await {
                        if forward.send(DaemonEvent::TcpFrame(frame)).await.is_err() {
                            return;
                        }
                    }
                    let _ = forward.send(DaemonEvent::TcpClosed { peer }).await;
                });
            },
            Err(err) => {
                tracing::warn!(%err, "TCP accept failed");
                return;
            },
        }
    }
}

fn encode_availability(key: ServiceKey) -> Bytes {
    let mut ser = someip_proto::codec::Serializer::new();
    ser.write_u16(key.service_id);
    ser.write_u16(key.instance_id);
    Bytes::from(ser.finish())
}

fn decode_service_descriptor(payload: &[u8]) -> Result<(ServiceKey, MajorVersion, MinorVersion), TransportError> {
    let mut de = Deserializer::new(payload);
    let service_id = de.read_u16()?;
    let instance_id = de.read_u16()?;
    let major = de.read_u8()?;
    let minor = de.read_u32()?;
    Ok((ServiceKey::new(service_id, instance_id), major, minor))
}

fn decode_eventgroup_descriptor(
    payload: &[u8],
) -> Result<(ServiceKey, EventgroupId, MajorVersion, Ttl), TransportError> {
    let mut de = Deserializer::new(payload);
    let service_id = de.read_u16()?;
    let instance_id = de.read_u16()?;
    let eventgroup_id = de.read_u16()?;
    let major = de.read_u8()?;
    let ttl = de.read_u32()?;
    Ok((ServiceKey::new(service_id, instance_id), eventgroup_id, major, ttl))
}
