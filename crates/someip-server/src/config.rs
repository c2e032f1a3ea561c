//! The configuration surface the daemon honors (§6). Parsing an actual
//! config file format is out of scope; this struct is what out-of-scope
//! loader code is expected to populate before calling [`crate::Daemon::bind`].

use std::{net::Ipv4Addr, time::Duration};

use someip_proto::consts;

/// Per-service port and reliability configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// The service this entry configures.
    pub service_id: u16,
    /// TCP port offered for reliable method calls, if any.
    pub reliable_port: Option<u16>,
    /// UDP port offered for unreliable method calls/events, if any.
    pub unreliable_port: Option<u16>,
    /// Seconds an SD offer for this service remains valid before it must be
    /// renewed.
    pub ttl_secs: u32,
}

/// Everything the daemon needs to bind its endpoints and drive Service
/// Discovery (§6's "Configuration surface").
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Local address the TCP server endpoint binds to.
    pub tcp_bind: std::net::SocketAddr,
    /// Local address the UDP unicast (application data) endpoint binds to.
    pub udp_bind: std::net::SocketAddr,
    /// Whether Service Discovery is enabled at all.
    pub sd_enabled: bool,
    /// Local interface address SD multicast traffic is sent/received on.
    pub sd_interface: Ipv4Addr,
    /// Service Discovery multicast group.
    pub sd_multicast_group: Ipv4Addr,
    /// Service Discovery multicast port.
    pub sd_multicast_port: u16,
    /// Minimum of the SD initial-delay jitter window.
    pub sd_initial_delay_min: Duration,
    /// Maximum of the SD initial-delay jitter window.
    pub sd_initial_delay_max: Duration,
    /// Steady-state interval between cyclic offers.
    pub sd_cyclic_offer_delay: Duration,
    /// Path of the local-IPC rendezvous socket applications attach to.
    pub local_endpoint_path: String,
    /// Per-service overrides; services not listed use the defaults above.
    pub services: Vec<ServiceConfig>,
    /// Liveness-probe interval for attached applications and peers.
    pub watchdog_cycle: Duration,
    /// Grace period `stop()` gives in-flight sends to flush.
    pub flush_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tcp_bind: "0.0.0.0:30501".parse().unwrap_or_else(|_| unreachable!()),
            udp_bind: "0.0.0.0:30501".parse().unwrap_or_else(|_| unreachable!()),
            sd_enabled: true,
            sd_interface: Ipv4Addr::UNSPECIFIED,
            sd_multicast_group: consts::DEFAULT_SD_MULTICAST_ADDR,
            sd_multicast_port: consts::DEFAULT_SD_PORT,
            sd_initial_delay_min: consts::SD_DEFAULT_INITIAL_DELAY_MIN,
            sd_initial_delay_max: consts::SD_DEFAULT_INITIAL_DELAY_MAX,
            sd_cyclic_offer_delay: consts::SD_DEFAULT_CYCLIC_OFFER_DELAY,
            local_endpoint_path: consts::DEFAULT_LOCAL_ENDPOINT_PATH.to_string(),
            services: Vec::new(),
            watchdog_cycle: consts::DEFAULT_WATCHDOG_CYCLE,
            flush_timeout: consts::DEFAULT_FLUSH_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// The configured TTL for `service_id`, falling back to the protocol
    /// default when no per-service override exists.
    #[must_use]
    pub fn ttl_for(&self, service_id: u16) -> u32 {
        self.services
            .iter()
            .find(|service| service.service_id == service_id)
            .map_or(consts::SD_DEFAULT_TTL_SECS, |service| service.ttl_secs)
    }
}
