//! Relay server setup.
//!
//! # Responsibilities
//! - Bind the endpoint, HTTP-side and policy listeners from configuration
//! - Start the policy servers and the request lane
//! - Run the dispatcher until shutdown, then drain sessions

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::loader::ConfigError;
use crate::config::validation::validate_config;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::lifecycle::Shutdown;
use crate::net::{listener, Listener, SessionTracker};
use crate::policy::{PolicyKind, PolicyServer};
use crate::relay::dispatcher::Dispatcher;
use crate::relay::lane::RequestLane;

/// Every listener of the relay, bound and ready to run.
pub struct RelayServer {
    config: Arc<RelayConfig>,
    endpoint: Listener,
    http: TcpListener,
    policy: Vec<(PolicyKind, TcpListener)>,
    tracker: SessionTracker,
}

impl RelayServer {
    /// Validate `config` and bind all listeners. Fails fast on the first
    /// bind error.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let bind_address = config.listener.bind_address.as_str();

        let endpoint = listener::bind(bind_address, config.listener.endpoint_port, "endpoint").await?;
        let http = listener::bind(bind_address, config.listener.http_port, "http").await?;

        let mut policy = Vec::new();
        if config.policy.enabled {
            for (kind, port) in [
                (PolicyKind::Flex, config.policy.flex_port),
                (PolicyKind::Silverlight, config.policy.silverlight_port),
            ] {
                policy.push((kind, listener::bind(bind_address, port, kind.as_str()).await?));
            }
        }

        Ok(Self {
            endpoint: Listener::new(endpoint, config.listener.max_sessions),
            http,
            policy,
            tracker: SessionTracker::new(),
            config: Arc::new(config),
        })
    }

    pub fn endpoint_addr(&self) -> std::io::Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http.local_addr()
    }

    /// Address of the standalone policy server for `kind`, if enabled.
    pub fn policy_addr(&self, kind: PolicyKind) -> Option<SocketAddr> {
        self.policy
            .iter()
            .find(|(k, _)| *k == kind)
            .and_then(|(_, listener)| listener.local_addr().ok())
    }

    /// Handle to the live session count.
    pub fn sessions(&self) -> SessionTracker {
        self.tracker.clone()
    }

    /// Run until `shutdown` is triggered, then wait up to the drain timeout
    /// for sessions to finish.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), RelayError> {
        let listener_config = &self.config.listener;
        let advertised_port = match listener_config.endpoint_port {
            0 => self.endpoint.local_addr()?.port(),
            port => port,
        };
        let read_buffer_size = self.config.framing.read_buffer_size;

        for (kind, policy_listener) in self.policy {
            let server = PolicyServer::new(kind, &listener_config.hostname, advertised_port, read_buffer_size);
            tokio::spawn(server.run(policy_listener, shutdown.subscribe()));
        }

        let (lane, lane_task) = RequestLane::spawn(self.http, shutdown.subscribe());

        let dispatcher = Dispatcher::new(
            listener_config.hostname.clone(),
            advertised_port,
            self.config.framing,
            lane,
            self.tracker.clone(),
        );
        dispatcher.run(self.endpoint, shutdown).await?;

        let drain = Duration::from_secs(self.config.shutdown.drain_timeout_secs);
        if tokio::time::timeout(drain, self.tracker.wait_for_shutdown())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain timeout elapsed with sessions still open"
            );
        }

        if let Err(e) = lane_task.await {
            tracing::warn!(error = %e, "Request lane task failed");
        }

        tracing::info!("Relay server stopped");
        Ok(())
    }
}
