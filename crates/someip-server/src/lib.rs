//! The routing manager daemon: the one process per host that binds the
//! TCP/UDP/local-IPC endpoints, owns the shared routing tables, and drives
//! Service Discovery (§4.5, §4.6, §6).

mod config;
mod daemon;
mod env;
mod error;

pub use config::{ServerConfig, ServiceConfig};
pub use daemon::Daemon;
pub use env::SystemEnv;
pub use error::ServerError;
