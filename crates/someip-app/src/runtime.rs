//! The reactor: a single task owning the local-IPC connection, the handler
//! registry, and outbound session-id bookkeeping for one attached
//! application (§5).
//!
//! All state above the transport is confined to this task; the
//! [`crate::Application`] handle only ever reaches it by sending
//! [`AppCommand`]s, never by touching the registry or the connection
//! directly — the "lock-protected send queue" §5 describes.

use bytes::Bytes;
use someip_core::ServiceKey;
use someip_proto::{
    codec::Deserializer,
    enums::MessageType,
    ids::ANY_INSTANCE,
    message::SomeipMessage,
};
use someip_routing::SessionAllocator;
use someip_transport::{LocalCommand, LocalEnvelope};
use tokio::sync::mpsc;

use crate::{command::AppCommand, event::AppEvent, handlers::HandlerRegistry};

/// Owns the proxy connection and handler tables for one attached
/// application.
pub struct Runtime {
    proxy: someip_routing::RoutingManagerProxy,
    registry: HandlerRegistry,
    commands: mpsc::Receiver<AppCommand>,
    sessions: SessionAllocator,
}

impl Runtime {
    pub(crate) fn new(
        proxy: someip_routing::RoutingManagerProxy,
        commands: mpsc::Receiver<AppCommand>,
    ) -> Self {
        Self { proxy, registry: HandlerRegistry::new(), commands, sessions: SessionAllocator::new() }
    }

    /// Drive the reactor until a [`AppCommand::Stop`] arrives or the
    /// command channel closes.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(AppCommand::Stop { reply }) => {
                            let _ = reply.send(());
                            break;
                        }
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }
                envelope = self.proxy.recv() => {
                    match envelope {
                        Some(envelope) => self.handle_envelope(envelope),
                        None => break,
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, command: AppCommand) {
        match command {
            AppCommand::OfferService { key, major, minor } => {
                if let Err(err) = self.proxy.offer_service(key, major, minor).await {
                    tracing::warn!(%err, "offer_service failed");
                }
            },
            AppCommand::StopOfferService { key, major, minor } => {
                if let Err(err) = self.proxy.stop_offer_service(key, major, minor).await {
                    tracing::warn!(%err, "stop_offer_service failed");
                }
            },
            AppCommand::RequestService { key, major, minor } => {
                if let Err(err) = self.proxy.request_service(key, major, minor).await {
                    tracing::warn!(%err, "request_service failed");
                }
            },
            AppCommand::ReleaseService { key, major, minor } => {
                if let Err(err) = self.proxy.release_service(key, major, minor).await {
                    tracing::warn!(%err, "release_service failed");
                }
            },
            AppCommand::Subscribe { key, eventgroup_id, major, ttl } => {
                if let Err(err) = self.proxy.subscribe(key, eventgroup_id, major, ttl).await {
                    tracing::warn!(%err, "subscribe failed");
                }
            },
            AppCommand::Unsubscribe { key, eventgroup_id, major } => {
                if let Err(err) = self.proxy.unsubscribe(key, eventgroup_id, major).await {
                    tracing::warn!(%err, "unsubscribe failed");
                }
            },
            AppCommand::Send { target, method_id, fire_and_forget, payload } => {
                self.send(target, method_id, fire_and_forget, payload).await;
            },
            AppCommand::Notify { key, event_id, payload } => {
                self.notify(key, event_id, payload).await;
            },
            AppCommand::RegisterMessageHandler { key, handler } => {
                self.registry.register_message_handler(key, handler);
            },
            AppCommand::RegisterAvailabilityHandler { key, handler } => {
                self.registry.register_availability_handler(key, handler);
            },
            AppCommand::Stop { .. } => unreachable!("handled in run()"),
        }
    }

    async fn send(&mut self, target: ServiceKey, method_id: u16, fire_and_forget: bool, payload: Bytes) {
        let client_id = self.proxy.client_id();
        let message_id = someip_proto::ids::message_id(target.service_id, method_id);
        let session_id = self.sessions.next(client_id, message_id);
        let message_type = if fire_and_forget { MessageType::RequestNoReturn } else { MessageType::Request };
        let message = SomeipMessage::new(
            target.service_id,
            method_id,
            client_id,
            session_id,
            1,
            message_type,
            someip_proto::enums::ReturnCode::Ok,
            payload,
        );
        if let Err(err) = self.proxy.send_message(Bytes::from(message.to_bytes())).await {
            tracing::warn!(%err, "send failed");
        }
    }

    async fn notify(&mut self, key: ServiceKey, event_id: u16, payload: Bytes) {
        let message = SomeipMessage::new(
            key.service_id,
            event_id,
            0,
            0,
            1,
            MessageType::Notification,
            someip_proto::enums::ReturnCode::Ok,
            payload,
        );
        if let Err(err) = self.proxy.send_message(Bytes::from(message.to_bytes())).await {
            tracing::warn!(%err, "notify failed");
        }
    }

    fn handle_envelope(&self, envelope: LocalEnvelope) {
        let event = match envelope.command {
            LocalCommand::Send => {
                let mut de = Deserializer::new(&envelope.payload);
                match SomeipMessage::deserialize(&mut de) {
                    Ok(message) => AppEvent::Message(message),
                    Err(err) => {
                        tracing::warn!(%err, "dropping malformed inbound frame");
                        return;
                    },
                }
            },
            LocalCommand::OfferService | LocalCommand::StopOfferService => {
                let available = envelope.command == LocalCommand::OfferService;
                let mut de = Deserializer::new(&envelope.payload);
                let (Ok(service_id), Ok(instance_id)) = (de.read_u16(), de.read_u16()) else {
                    tracing::warn!("malformed availability envelope");
                    return;
                };
                AppEvent::Availability { key: ServiceKey::new(service_id, instance_id), available }
            },
            LocalCommand::SubscribeEventgroupAck | LocalCommand::Ping | LocalCommand::Pong => return,
            other => {
                tracing::debug!(?other, "unhandled envelope command");
                return;
            },
        };
        self.dispatch(event);
    }

    fn dispatch(&self, event: AppEvent) {
        match event {
            AppEvent::Message(message) => {
                if let Some(handler) =
                    self.registry.find_message_handler(message.service_id(), ANY_INSTANCE, message.method_id())
                {
                    handler(message);
                }
            },
            AppEvent::Availability { key, available } => {
                if let Some(handler) = self.registry.find_availability_handler(key) {
                    handler(key, available);
                }
            },
        }
    }
}
