//! Events the reactor delivers to registered handlers (§4.7).

use someip_core::ServiceKey;
use someip_proto::message::SomeipMessage;

/// What the reactor tells a registered handler about.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A message matching a registered [`crate::handlers::MethodKey`]
    /// arrived.
    Message(SomeipMessage),
    /// `key`'s availability changed, as observed by the routing manager's
    /// Service Discovery engine.
    Availability {
        /// The service whose availability changed.
        key: ServiceKey,
        /// `true` if now available, `false` if it just went away.
        available: bool,
    },
}
