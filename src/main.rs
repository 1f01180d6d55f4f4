//! Tunnel relay (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                 TUNNEL RELAY                  │
//!   Rich client        │  ┌────────────┐    ┌─────────┐               │
//!   ───────────────────┼─▶│ dispatcher │───▶│ session │◀──┐           │
//!   (endpoint port)    │  └─────┬──────┘    └────┬────┘   │           │
//!                      │        │ policy?        │        │ next conn │
//!                      │        ▼                ▼        │           │
//!                      │   flex policy     translator   ┌─┴──┐        │
//!                      │                   frame        │lane│◀───────┼── HTTP peer
//!                      │                   responder ───┼────┼────────┼─▶ (http port)
//!                      │                                └────┘        │
//!                      │  ┌──────────────────────────────────────┐    │
//!   Plugins ───────────┼─▶│ policy servers (843 flex, 943 sl)    │    │
//!                      │  └──────────────────────────────────────┘    │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use tunnel_relay::config::loader::read_config;
use tunnel_relay::lifecycle::signals;
use tunnel_relay::observability::{logging, metrics};
use tunnel_relay::{RelayConfig, RelayServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "tunnel-relay", version)]
#[command(about = "Tunnels HTTP requests over a rich client's socket connection", long_about = None)]
struct Cli {
    /// Hostname from which the rich client is served
    hostname: String,

    /// Port number the rich client connects back to
    port: u16,

    /// Port number the HTTP peer connects to [default: 8080]
    http_port: Option<u16>,

    /// TOML configuration file; command-line values take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind every listener to
    #[arg(long)]
    bind: Option<String>,

    /// Do not start the standalone policy servers
    #[arg(long)]
    no_policy: bool,

    /// Expose Prometheus metrics on this address
    #[arg(long)]
    metrics: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut RelayConfig) {
        config.listener.hostname = self.hostname.clone();
        config.listener.endpoint_port = self.port;
        if let Some(http_port) = self.http_port {
            config.listener.http_port = http_port;
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if self.no_policy {
            config.policy.enabled = false;
        }
        if let Some(metrics) = &self.metrics {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = metrics.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => RelayConfig::default(),
    };
    cli.apply(&mut config);

    logging::init(&config.observability.log_level);

    tracing::info!("tunnel-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        hostname = %config.listener.hostname,
        port = config.listener.endpoint_port,
        "Starting endpoint listener"
    );
    tracing::info!(http_port = config.listener.http_port, "Starting HTTP listener");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = RelayServer::bind(config).await?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::shutdown_signal().await;
        trigger.trigger();
    });

    server.run(shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_arguments() {
        let cli = Cli::try_parse_from(["tunnel-relay", "ria.example.com", "4502"]).unwrap();
        let mut config = RelayConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.listener.hostname, "ria.example.com");
        assert_eq!(config.listener.endpoint_port, 4502);
        assert_eq!(config.listener.http_port, 8080);
        assert!(config.policy.enabled);
    }

    #[test]
    fn optional_http_port_and_flags() {
        let cli = Cli::try_parse_from([
            "tunnel-relay",
            "h",
            "4502",
            "9000",
            "--bind",
            "127.0.0.1",
            "--no-policy",
        ])
        .unwrap();
        let mut config = RelayConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.listener.http_port, 9000);
        assert_eq!(config.listener.bind_address, "127.0.0.1");
        assert!(!config.policy.enabled);
    }

    #[test]
    fn missing_port_is_usage_error() {
        assert!(Cli::try_parse_from(["tunnel-relay", "h"]).is_err());
        assert!(Cli::try_parse_from(["tunnel-relay", "h", "not-a-port"]).is_err());
    }
}
