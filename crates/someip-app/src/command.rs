//! Commands the [`crate::Application`] handle sends to the reactor task
//! (§4.7, §5). Mirrors the façade's own method surface one-to-one so the
//! reactor loop is a single match over this enum.

use bytes::Bytes;
use someip_core::ServiceKey;
use someip_proto::ids::{EventId, EventgroupId, MajorVersion, MethodId, MinorVersion, Ttl};
use tokio::sync::oneshot;

use crate::handlers::{AvailabilityHandler, MessageHandler, MethodKey};

/// One instruction for the reactor, paired with a reply channel where the
/// caller needs to observe completion.
pub enum AppCommand {
    /// Offer a service instance.
    OfferService { key: ServiceKey, major: MajorVersion, minor: MinorVersion },
    /// Withdraw a previously offered service instance.
    StopOfferService { key: ServiceKey, major: MajorVersion, minor: MinorVersion },
    /// Request a remote service instance.
    RequestService { key: ServiceKey, major: MajorVersion, minor: MinorVersion },
    /// Release a previously requested service instance.
    ReleaseService { key: ServiceKey, major: MajorVersion, minor: MinorVersion },
    /// Subscribe to an eventgroup.
    Subscribe { key: ServiceKey, eventgroup_id: EventgroupId, major: MajorVersion, ttl: Ttl },
    /// Unsubscribe from an eventgroup.
    Unsubscribe { key: ServiceKey, eventgroup_id: EventgroupId, major: MajorVersion },
    /// Send a request/fire-and-forget message to `target`.
    Send { target: ServiceKey, method_id: MethodId, fire_and_forget: bool, payload: Bytes },
    /// Publish an event to every subscriber of the eventgroup it belongs to.
    Notify { key: ServiceKey, event_id: EventId, payload: Bytes },
    /// Register (or replace) a message handler.
    RegisterMessageHandler { key: MethodKey, handler: MessageHandler },
    /// Register (or replace) an availability handler.
    RegisterAvailabilityHandler { key: ServiceKey, handler: AvailabilityHandler },
    /// Stop the reactor, flushing pending sends within the grace period.
    Stop { reply: oneshot::Sender<()> },
}
