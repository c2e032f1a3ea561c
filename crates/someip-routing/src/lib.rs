//! The routing manager: the shared service/eventgroup tables, session-id
//! allocation, and inbound/outbound dispatch that sit between applications
//! and the SOME/IP transports (§4.5).
//!
//! [`host`] owns the one-per-machine [`RoutingManagerHost`]; [`proxy`] is
//! the [`RoutingManagerProxy`] every other application process uses to
//! reach it over local IPC; [`dispatch`] holds the pure routing decisions
//! both are built on.

pub mod dispatch;
pub mod host;
pub mod proxy;
pub mod session;

pub use dispatch::{LocalOwners, ReplyPath, RoutingAction};
pub use host::RoutingManagerHost;
pub use proxy::RoutingManagerProxy;
pub use session::SessionAllocator;
