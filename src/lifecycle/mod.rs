//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Trigger → Dispatcher stops accepting → Sessions unwind → Drain → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Every blocking wait in a long-lived task also waits on the shutdown receiver
//! - Shutdown has timeout: forced exit after the drain deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
