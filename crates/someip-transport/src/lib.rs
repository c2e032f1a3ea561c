//! Endpoints that move SOME/IP frames over TCP, UDP, and local IPC (§4.4).
//!
//! Each endpoint type owns its socket and framing; callers exchange frames
//! through channels rather than touching the socket directly, which is what
//! lets `someip-routing` and `someip-sd` stay transport-agnostic.

pub mod errors;
pub mod local;
pub mod parser;
pub mod tcp;
pub mod udp;

pub use errors::TransportError;
pub use local::{LocalCommand, LocalConnection, LocalEnvelope, LocalServer};
pub use tcp::{Inbound, TcpConnection, TcpServer};
pub use udp::UdpEndpoint;
