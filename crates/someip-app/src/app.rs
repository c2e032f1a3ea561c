//! [`Application`]: the object each client process uses (§4.7).

use bytes::Bytes;
use someip_core::ServiceKey;
use someip_proto::ids::{ClientId, EventId, EventgroupId, MajorVersion, MethodId, MinorVersion, Ttl};
use tokio::sync::{mpsc, oneshot};

use crate::{
    command::AppCommand,
    errors::ApplicationError,
    handlers::{AvailabilityHandler, MessageHandler, MethodKey},
    runtime::Runtime,
};

const COMMAND_CHANNEL_DEPTH: usize = 256;

/// The application façade: `init` attaches to the routing manager, `start`
/// spawns the reactor, and every other method issues one [`AppCommand`].
pub struct Application {
    commands: mpsc::Sender<AppCommand>,
    client_id: ClientId,
    stopped: bool,
}

impl Application {
    /// Attach to the routing manager's local-IPC rendezvous socket at
    /// `path` and spawn the reactor task. `name` is accepted for parity
    /// with the façade's documented signature; this implementation does
    /// not yet forward an application name over the wire (the envelope
    /// format carries only `client_id`, assigned by the routing manager).
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::Transport`] if the connection or the
    /// `RegisterApplication` handshake fails.
    pub async fn init(_name: &str, path: &str) -> Result<Self, ApplicationError> {
        let proxy = someip_routing::RoutingManagerProxy::attach(path).await?;
        let client_id = proxy.client_id();
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_DEPTH);
        let runtime = Runtime::new(proxy, rx);
        tokio::spawn(runtime.run());
        Ok(Self { commands: tx, client_id, stopped: false })
    }

    /// The client id the routing manager assigned this application.
    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Start is implicit in [`Application::init`]; kept as a distinct call
    /// so callers can separate "attached" from "serving traffic" the way
    /// the façade's documented lifecycle expects. Currently a no-op beyond
    /// that separation since the reactor is already running after `init`.
    pub fn start(&self) {}

    /// Stop serving traffic: cancel pending timers, close the connection,
    /// and flush send buffers within a bounded grace period. Idempotent.
    pub async fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(AppCommand::Stop { reply: reply_tx }).await.is_ok() {
            let _ = tokio::time::timeout(someip_proto::consts::DEFAULT_FLUSH_TIMEOUT, reply_rx).await;
        }
    }

    /// Offer `(service, instance)` at the given interface version.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotReachable`] if called after `stop`.
    pub async fn offer_service(&self, service: u16, instance: u16, major: MajorVersion, minor: MinorVersion) -> Result<(), ApplicationError> {
        self.send_command(AppCommand::OfferService { key: ServiceKey::new(service, instance), major, minor }).await
    }

    /// Withdraw a previously offered service instance.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotReachable`] if called after `stop`.
    pub async fn stop_offer_service(&self, service: u16, instance: u16, major: MajorVersion, minor: MinorVersion) -> Result<(), ApplicationError> {
        self.send_command(AppCommand::StopOfferService { key: ServiceKey::new(service, instance), major, minor }).await
    }

    /// Request a remote service instance; its availability handler (if any)
    /// fires once Service Discovery locates it.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotReachable`] if called after `stop`.
    pub async fn request_service(&self, service: u16, instance: u16, major: MajorVersion, minor: MinorVersion) -> Result<(), ApplicationError> {
        self.send_command(AppCommand::RequestService { key: ServiceKey::new(service, instance), major, minor }).await
    }

    /// Release a previously requested service instance.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotReachable`] if called after `stop`.
    pub async fn release_service(&self, service: u16, instance: u16, major: MajorVersion, minor: MinorVersion) -> Result<(), ApplicationError> {
        self.send_command(AppCommand::ReleaseService { key: ServiceKey::new(service, instance), major, minor }).await
    }

    /// Subscribe to an eventgroup, defaulting to the standard 3-second TTL
    /// (renewed automatically by the routing manager's Service Discovery
    /// engine; see [`someip_sd`]).
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotReachable`] if called after `stop`.
    pub async fn subscribe(&self, service: u16, instance: u16, eventgroup_id: EventgroupId, major: MajorVersion) -> Result<(), ApplicationError> {
        self.subscribe_with_ttl(service, instance, eventgroup_id, major, someip_proto::consts::SD_DEFAULT_TTL_SECS).await
    }

    /// As [`Application::subscribe`] but with an explicit TTL in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotReachable`] if called after `stop`.
    pub async fn subscribe_with_ttl(&self, service: u16, instance: u16, eventgroup_id: EventgroupId, major: MajorVersion, ttl: Ttl) -> Result<(), ApplicationError> {
        self.send_command(AppCommand::Subscribe { key: ServiceKey::new(service, instance), eventgroup_id, major, ttl }).await
    }

    /// Unsubscribe from an eventgroup.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotReachable`] if called after `stop`.
    pub async fn unsubscribe(&self, service: u16, instance: u16, eventgroup_id: EventgroupId, major: MajorVersion) -> Result<(), ApplicationError> {
        self.send_command(AppCommand::Unsubscribe { key: ServiceKey::new(service, instance), eventgroup_id, major }).await
    }

    /// Send a request (or, with `fire_and_forget`, a REQUEST_NO_RETURN) to
    /// `(service, instance)`'s `method_id`. The routing manager assigns the
    /// transport and this façade assigns the session id.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotReachable`] if called after `stop`.
    pub async fn send(&self, service: u16, instance: u16, method_id: MethodId, fire_and_forget: bool, payload: impl Into<Bytes>) -> Result<(), ApplicationError> {
        self.send_command(AppCommand::Send {
            target: ServiceKey::new(service, instance),
            method_id,
            fire_and_forget,
            payload: payload.into(),
        })
        .await
    }

    /// Publish an event to every current subscriber of the eventgroup it
    /// belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotReachable`] if called after `stop`.
    pub async fn notify(&self, service: u16, instance: u16, event_id: EventId, payload: impl Into<Bytes>) -> Result<(), ApplicationError> {
        self.send_command(AppCommand::Notify { key: ServiceKey::new(service, instance), event_id, payload: payload.into() }).await
    }

    /// Register a handler for messages matching `(service, instance,
    /// method)`. Any field may be one of the `ANY_*` wildcards in
    /// [`someip_proto::ids`] to register a catch-all.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotReachable`] if called after `stop`.
    pub async fn register_message_handler(&self, service: u16, instance: u16, method_id: MethodId, handler: MessageHandler) -> Result<(), ApplicationError> {
        self.send_command(AppCommand::RegisterMessageHandler {
            key: MethodKey { service_id: service, instance_id: instance, method_id },
            handler,
        })
        .await
    }

    /// Register a handler that fires whenever `(service, instance)`'s
    /// availability changes. `service == ANY_SERVICE` registers a
    /// catch-all.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::NotReachable`] if called after `stop`.
    pub async fn register_availability_handler(&self, service: u16, instance: u16, handler: AvailabilityHandler) -> Result<(), ApplicationError> {
        self.send_command(AppCommand::RegisterAvailabilityHandler { key: ServiceKey::new(service, instance), handler }).await
    }

    async fn send_command(&self, command: AppCommand) -> Result<(), ApplicationError> {
        if self.stopped {
            return Err(ApplicationError::NotReachable);
        }
        self.commands.send(command).await.map_err(|_| ApplicationError::ReactorGone)
    }
}
