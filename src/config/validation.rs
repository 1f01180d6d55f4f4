//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buffer size > 0, addresses parse)
//! - Detect conflicting listener ports
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::config::schema::RelayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.hostname must not be empty")]
    EmptyHostname,

    #[error("listener.bind_address {0:?} is not an IP address")]
    InvalidBindAddress(String),

    #[error("{first} and {second} both use port {port}")]
    PortConflict {
        first: &'static str,
        second: &'static str,
        port: u16,
    },

    #[error("listener.max_sessions must be greater than zero")]
    ZeroMaxSessions,

    #[error("framing.read_buffer_size must be greater than zero")]
    ZeroReadBuffer,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.hostname.trim().is_empty() {
        errors.push(ValidationError::EmptyHostname);
    }

    if config.listener.bind_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.listener.max_sessions == 0 {
        errors.push(ValidationError::ZeroMaxSessions);
    }

    if config.framing.read_buffer_size == 0 {
        errors.push(ValidationError::ZeroReadBuffer);
    }

    // Port 0 means "ephemeral" and never conflicts.
    let mut ports = vec![
        ("listener.endpoint_port", config.listener.endpoint_port),
        ("listener.http_port", config.listener.http_port),
    ];
    if config.policy.enabled {
        ports.push(("policy.flex_port", config.policy.flex_port));
        ports.push(("policy.silverlight_port", config.policy.silverlight_port));
    }
    for (i, (first, a)) in ports.iter().enumerate() {
        for (second, b) in &ports[i + 1..] {
            if *a != 0 && a == b {
                errors.push(ValidationError::PortConflict {
                    first: *first,
                    second: *second,
                    port: *a,
                });
            }
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
