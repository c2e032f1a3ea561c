//! SOME/IP wire codec: the 16-byte message header, magic-cookie framing, and
//! Service Discovery entries/options (§3, §4.1–§4.3).
//!
//! This crate is pure: no sockets, no clocks, no allocator beyond the
//! buffers callers hand it. Everything above it (`someip-transport`,
//! `someip-sd`, `someip-routing`) builds on these types to decide what bytes
//! to send and when; this crate only knows how to turn structured values
//! into bytes and back.

pub mod codec;
pub mod consts;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod message;
pub mod sd;

pub use enums::{EntryType, MessageType, OptionType, ReturnCode};
pub use errors::{ProtocolError, Result};
pub use message::{SomeipMessage, WireFrame};
pub use sd::{SdEntry, SdMessage, SdOption};
