//! Crate-wide error type.

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::relay::frame::FrameError;

/// Errors that end a relay task.
///
/// Only the parse-failure and sentinel paths are recovered inside a session;
/// everything else surfaces as one of these variants.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Failed to bind a listening socket.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to accept an HTTP-side connection.
    #[error("failed to accept HTTP-side connection: {0}")]
    Accept(#[source] std::io::Error),

    /// Transport failure on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The endpoint sent a reply that is neither a frame nor the sentinel.
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),

    /// The request lane arbiter is gone.
    #[error("request lane closed")]
    LaneClosed,

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
