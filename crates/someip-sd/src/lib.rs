//! Service Discovery: per-service offer/find timing state machines,
//! eventgroup subscription bookkeeping, and the [`SdEngine`] that drives
//! both from wall-clock or simulated time (§4.6).

pub mod engine;
pub mod find;
pub mod message_builder;
pub mod offer;
pub mod subscription;

pub use engine::{SdAction, SdEngine, SdEvent};
pub use find::FindQuery;
pub use offer::OfferSchedule;
pub use subscription::{SubscriberGrant, SubscriberLease};
