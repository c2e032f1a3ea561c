//! Routing manager daemon binary.
//!
//! # Usage
//!
//! ```bash
//! someip-server --tcp-bind 0.0.0.0:30501 --udp-bind 0.0.0.0:30501
//! ```

use std::process::ExitCode;

use clap::Parser;
use someip_server::{Daemon, ServerConfig, ServerError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// SOME/IP routing manager daemon
#[derive(Parser, Debug)]
#[command(name = "someip-server")]
#[command(about = "SOME/IP routing manager: endpoints, routing tables, and Service Discovery")]
#[command(version)]
struct Args {
    /// Address the reliable (TCP) endpoint binds to.
    #[arg(long, default_value = "0.0.0.0:30501")]
    tcp_bind: String,

    /// Address the unreliable (UDP) endpoint binds to.
    #[arg(long, default_value = "0.0.0.0:30501")]
    udp_bind: String,

    /// Disable Service Discovery.
    #[arg(long)]
    no_sd: bool,

    /// Service Discovery multicast group.
    #[arg(long, default_value = "224.244.224.245")]
    sd_multicast_group: std::net::Ipv4Addr,

    /// Service Discovery multicast port.
    #[arg(long, default_value_t = someip_proto::consts::DEFAULT_SD_PORT)]
    sd_multicast_port: u16,

    /// Local-IPC rendezvous socket path.
    #[arg(long, default_value_t = someip_proto::consts::DEFAULT_LOCAL_ENDPOINT_PATH.to_string())]
    local_endpoint_path: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = ServerConfig {
        tcp_bind: match args.tcp_bind.parse() {
            Ok(addr) => addr,
            Err(err) => {
                tracing::error!(%err, "invalid --tcp-bind address");
                return ExitCode::from(ServerError::ConfigurationMissing.exit_code() as u8);
            },
        },
        udp_bind: match args.udp_bind.parse() {
            Ok(addr) => addr,
            Err(err) => {
                tracing::error!(%err, "invalid --udp-bind address");
                return ExitCode::from(ServerError::ConfigurationMissing.exit_code() as u8);
            },
        },
        sd_enabled: !args.no_sd,
        sd_multicast_group: args.sd_multicast_group,
        sd_multicast_port: args.sd_multicast_port,
        local_endpoint_path: args.local_endpoint_path,
        ..ServerConfig::default()
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "daemon exited");
            ExitCode::from(err.exit_code() as u8)
        },
    }
}

async fn run(config: ServerConfig) -> Result<(), ServerError> {
    tracing::info!(tcp = %config.tcp_bind, udp = %config.udp_bind, "routing manager starting");
    let daemon = Daemon::bind(config).await?;
    daemon.run().await
}
