//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::policy::PolicyKind;

/// Root configuration for the tunnel relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Endpoint and HTTP-side listeners.
    pub listener: ListenerConfig,

    /// Fixed policy-document servers.
    pub policy: PolicyConfig,

    /// Endpoint reply framing.
    pub framing: FramingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Hostname the rich client is served from. Written into policy documents.
    pub hostname: String,

    /// Address every listener binds to (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Port the rich client connects back to. 0 picks an ephemeral port.
    pub endpoint_port: u16,

    /// Port the HTTP peer connects to. 0 picks an ephemeral port.
    pub http_port: u16,

    /// Maximum endpoint connections held at once (backpressure).
    pub max_sessions: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            bind_address: "0.0.0.0".to_string(),
            endpoint_port: 4502,
            http_port: 8080,
            max_sessions: 1024,
        }
    }
}

/// Policy server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Start the standalone policy servers.
    pub enabled: bool,

    /// Port of the Flash cross-domain policy server.
    pub flex_port: u16,

    /// Port of the Silverlight access policy server.
    pub silverlight_port: u16,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flex_port: PolicyKind::Flex.default_port(),
            silverlight_port: PolicyKind::Silverlight.default_port(),
        }
    }
}

/// Framing of replies read from the endpoint.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Size of the buffer used for every read.
    pub read_buffer_size: usize,

    /// Require the payload to be exactly the declared length.
    ///
    /// When false the declared length is only a completion threshold and
    /// any extra bytes in the final read are forwarded too.
    pub strict_length: bool,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 4096,
            strict_length: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Seconds to wait for sessions to finish after a shutdown signal.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 5,
        }
    }
}
