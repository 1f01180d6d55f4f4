//! Relay subsystem: the tunnel between the endpoint and the HTTP peer.
//!
//! # Data Flow
//! ```text
//! Endpoint connection
//!     → dispatcher.rs (handshake: policy request or session)
//!     → session.rs (one loop per endpoint connection)
//!         ← lane.rs (next HTTP-side connection)
//!         → translator.rs (HTTP request → one line)
//!         → frame.rs (endpoint reply → payload | sentinel | disconnected)
//!         → responder.rs (synthetic HTTP response)
//!
//! server.rs binds the listeners and wires all of the above.
//! ```

pub mod dispatcher;
pub mod frame;
pub mod lane;
pub mod responder;
pub mod server;
pub mod session;
pub mod translator;

pub use dispatcher::Dispatcher;
pub use lane::RequestLane;
pub use server::RelayServer;
pub use session::Session;
pub use translator::TunneledRequest;
