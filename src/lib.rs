//! Cross-protocol tunnel relay.
//!
//! Carries requests from an HTTP-only peer over the socket connection of a
//! sandboxed rich client, and turns the client's length-prefixed replies
//! back into HTTP responses.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod policy;
pub mod relay;

pub use config::RelayConfig;
pub use error::RelayError;
pub use lifecycle::Shutdown;
pub use relay::RelayServer;
