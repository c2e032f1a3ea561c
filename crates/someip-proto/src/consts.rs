//! Wire-format constants: header geometry, magic cookies, and network
//! defaults used when the out-of-scope configuration loader has nothing to
//! say about a given value.

use crate::ids::{ClientId, MethodId, ServiceId};

/// Size in bytes of the fixed SOME/IP header (everything before payload).
pub const HEADER_SIZE: usize = 16;

/// Current SOME/IP protocol version, written into every header.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// `service_id`/`method_id` pair identifying a client magic cookie.
pub const MAGIC_COOKIE_CLIENT_SERVICE: ServiceId = 0xFFFF;
/// Method id half of the client magic cookie message id (0xFFFF0000).
pub const MAGIC_COOKIE_CLIENT_METHOD: MethodId = 0x0000;
/// `service_id`/`method_id` pair identifying a service magic cookie.
pub const MAGIC_COOKIE_SERVICE_SERVICE: ServiceId = 0xFFFF;
/// Method id half of the service magic cookie message id (0xFFFF8000).
pub const MAGIC_COOKIE_SERVICE_METHOD: MethodId = 0x8000;
/// Client id carried by every magic cookie frame.
pub const MAGIC_COOKIE_CLIENT_ID: ClientId = 0x0000;
/// Session id carried by every magic cookie frame.
pub const MAGIC_COOKIE_SESSION_ID: u16 = 0x0000;
/// `length` field of a magic cookie frame (8 = header tail with no payload).
pub const MAGIC_COOKIE_LENGTH: u32 = 8;

/// Default UDP/TCP port SOME/IP service discovery listens on.
pub const DEFAULT_SD_PORT: u16 = 30490;
/// Default SOME/IP-SD multicast group address.
pub const DEFAULT_SD_MULTICAST_ADDR: std::net::Ipv4Addr = std::net::Ipv4Addr::new(224, 244, 224, 245);

/// Maximum payload bytes carried in a single UDP datagram
/// (`VSOMEIP_MAX_UDP_MESSAGE_SIZE`). Additional messages spill into a new
/// datagram rather than fragmenting.
pub const MAX_UDP_MESSAGE_SIZE: usize = 1446;

/// Default flush timer for coalesced endpoint sends.
pub const DEFAULT_FLUSH_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(1000);

/// Default TCP watchdog ping interval (`VSOMEIP_WATCHDOG_CYCLE`).
pub const DEFAULT_WATCHDOG_CYCLE: std::time::Duration = std::time::Duration::from_millis(2000);

/// Default number of missing pong replies before a TCP client endpoint
/// closes the connection (`VSOMEIP_MAX_MISSING_PONGS`).
pub const DEFAULT_MAX_MISSING_PONGS: u32 = 5;

/// Initial TCP reconnect backoff.
pub const RECONNECT_BACKOFF_INITIAL: std::time::Duration = std::time::Duration::from_millis(200);
/// Reconnect backoff ceiling.
pub const RECONNECT_BACKOFF_MAX: std::time::Duration = std::time::Duration::from_secs(10);

/// Service Discovery default initial-delay lower bound.
pub const SD_DEFAULT_INITIAL_DELAY_MIN: std::time::Duration = std::time::Duration::from_millis(10);
/// Service Discovery default initial-delay upper bound.
pub const SD_DEFAULT_INITIAL_DELAY_MAX: std::time::Duration = std::time::Duration::from_millis(100);
/// Service Discovery default repetition base delay.
pub const SD_DEFAULT_REPETITION_BASE_DELAY: std::time::Duration =
    std::time::Duration::from_millis(200);
/// Service Discovery default maximum number of repetitions.
pub const SD_DEFAULT_REPETITION_MAX: u32 = 3;
/// Service Discovery default cyclic offer/find interval.
pub const SD_DEFAULT_CYCLIC_OFFER_DELAY: std::time::Duration = std::time::Duration::from_secs(1);
/// Service Discovery default entry TTL, derived as `3 * cyclic_offer_delay`.
pub const SD_DEFAULT_TTL_SECS: u32 = 3;

/// Local IPC rendezvous socket path used when the configuration does not
/// override it.
pub const DEFAULT_LOCAL_ENDPOINT_PATH: &str = "/tmp/vsomeipd";

/// Start-tag preceding every local IPC envelope.
pub const LOCAL_START_TAG: u32 = 0x6737_6D07;
/// End-tag following every local IPC envelope.
pub const LOCAL_END_TAG: u32 = 0x076D_3767;
