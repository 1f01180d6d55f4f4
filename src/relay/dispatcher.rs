//! Endpoint acceptor.
//!
//! Reads the handshake of every new endpoint connection and either answers
//! an in-band policy request or starts a [`Session`] in its own task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::config::FramingConfig;
use crate::error::RelayError;
use crate::lifecycle::Shutdown;
use crate::net::listener::ConnectionPermit;
use crate::net::{read_message, Listener, SessionTracker};
use crate::policy::{self, PolicyKind};
use crate::relay::lane::RequestLane;
use crate::relay::session::Session;

/// Pause after a failed endpoint accept, so a persistent error does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

struct Context {
    hostname: String,
    advertised_port: u16,
    framing: FramingConfig,
    lane: RequestLane,
    tracker: SessionTracker,
}

/// Top-level acceptor for endpoint connections.
pub struct Dispatcher {
    context: Arc<Context>,
}

impl Dispatcher {
    /// `advertised_port` is the endpoint port written into in-band policy
    /// documents.
    pub fn new(
        hostname: impl Into<String>,
        advertised_port: u16,
        framing: FramingConfig,
        lane: RequestLane,
        tracker: SessionTracker,
    ) -> Self {
        Self {
            context: Arc::new(Context {
                hostname: hostname.into(),
                advertised_port,
                framing,
                lane,
                tracker,
            }),
        }
    }

    /// Accept endpoint connections until shutdown. Never waits on a session.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), RelayError> {
        tracing::info!(address = ?listener.local_addr().ok(), "Waiting for endpoint connections");
        let mut stop = shutdown.subscribe();

        loop {
            // Subscribed before accepting so a trigger racing the accept is still seen.
            let session_shutdown = shutdown.subscribe();
            let (stream, peer, permit) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept endpoint connection");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                },
                _ = stop.recv() => break,
            };

            let context = Arc::clone(&self.context);
            tokio::spawn(handle_endpoint(context, stream, peer, permit, session_shutdown));
        }

        tracing::info!("Dispatcher stopped");
        Ok(())
    }
}

async fn handle_endpoint(
    context: Arc<Context>,
    mut stream: TcpStream,
    peer: SocketAddr,
    _permit: ConnectionPermit,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!(peer_addr = %peer, "Endpoint connected");

    let handshake = tokio::select! {
        read = read_message(&mut stream, context.framing.read_buffer_size) => match read {
            Ok(handshake) => handshake,
            Err(e) => {
                tracing::warn!(peer_addr = %peer, error = %e, "Failed to read handshake");
                return;
            }
        },
        _ = shutdown.recv() => return,
    };

    if handshake.is_empty() {
        tracing::info!(peer_addr = %peer, "Endpoint closed before handshake");
        return;
    }
    tracing::debug!(peer_addr = %peer, "<- {}", String::from_utf8_lossy(&handshake));

    if policy::is_policy_request(&handshake) {
        match policy::write_policy(
            &mut stream,
            PolicyKind::Flex,
            &context.hostname,
            context.advertised_port,
        )
        .await
        {
            Ok(()) => tracing::info!(peer_addr = %peer, "Served flex policy on endpoint connection"),
            Err(e) => tracing::warn!(peer_addr = %peer, error = %e, "Failed to serve flex policy"),
        }
        return;
    }

    let guard = context.tracker.track();
    let session = Session::new(guard.id(), stream, context.lane.clone(), context.framing);
    tracing::info!(peer_addr = %peer, session_id = %session.id(), "Starting session");
    session.run(shutdown).await;
}
