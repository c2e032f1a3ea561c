//! Service Discovery message model (§3, §4.3).
//!
//! An [`SdMessage`] is a SOME/IP [`crate::message::SomeipMessage`] whose
//! payload is itself structured: flags, an entry array, and an option array.
//! Entries reference options by `(index, count)` pairs rather than by
//! pointer — each `SdMessage` owns its options outright, eliminating the
//! cyclic entry/option/message graph the source expresses via shared
//! pointers (see `DESIGN.md` and §9 of the specification).

pub mod entry;
pub mod message;
pub mod option;

pub use entry::{EventgroupEntry, SdEntry, ServiceEntry};
pub use message::{SdFlags, SdMessage};
pub use option::{L4Protocol, SdOption};
