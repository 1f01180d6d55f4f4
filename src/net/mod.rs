//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming endpoint connection
//!     → listener.rs (accept loop, session limits)
//!     → message.rs (read handshake to quiescence)
//!     → connection.rs (session id, lifecycle tracking)
//!     → Hand off to relay layer
//!
//! Session States:
//!     Active → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each session tracked for graceful shutdown

pub mod connection;
pub mod listener;
pub mod message;

pub use connection::{SessionGuard, SessionId, SessionState, SessionTracker};
pub use listener::Listener;
pub use message::read_message;
