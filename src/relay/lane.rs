//! Request lane: the single owner of the HTTP-side listening socket.
//!
//! Sessions never call `accept` on the HTTP-side listener themselves. Each
//! session asks its [`RequestLane`] handle for the next connection; the
//! arbiter task queues those asks in FIFO order and accepts exactly one
//! connection per ask, handing it over through a one-shot channel.
//!
//! ```text
//! Session A ─┐ ask                     ┌─ accept() ◀── HTTP peer
//! Session B ─┼──────▶ arbiter (FIFO) ──┤
//! Session C ─┘ ◀─── oneshot(stream) ───┘
//! ```
//!
//! A session that stops waiting (shutdown, task dropped) never swallows a
//! connection: the arbiter notices the closed one-shot and moves on, and a
//! connection that could not be delivered goes to the next waiter.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::RelayError;

type Accepted = std::io::Result<(TcpStream, SocketAddr)>;

/// Handle sessions use to obtain HTTP-side connections.
#[derive(Debug, Clone)]
pub struct RequestLane {
    waiters: mpsc::UnboundedSender<oneshot::Sender<Accepted>>,
}

impl RequestLane {
    /// Start the arbiter on `listener`. It runs until shutdown or until every
    /// handle has been dropped.
    pub fn spawn(listener: TcpListener, shutdown: broadcast::Receiver<()>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(arbitrate(listener, rx, shutdown));
        (Self { waiters: tx }, task)
    }

    /// Wait for the next HTTP-side connection assigned to the caller.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), RelayError> {
        let (tx, rx) = oneshot::channel();
        self.waiters.send(tx).map_err(|_| RelayError::LaneClosed)?;
        match rx.await {
            Ok(accepted) => accepted.map_err(RelayError::Accept),
            Err(_) => Err(RelayError::LaneClosed),
        }
    }
}

async fn arbitrate(
    listener: TcpListener,
    mut waiters: mpsc::UnboundedReceiver<oneshot::Sender<Accepted>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let local_addr = listener.local_addr().ok();
    tracing::info!(address = ?local_addr, "Request lane started");

    // A connection whose waiter vanished between accept and hand-off.
    let mut pending: Option<(TcpStream, SocketAddr)> = None;

    loop {
        let mut waiter = tokio::select! {
            waiter = waiters.recv() => match waiter {
                Some(waiter) => waiter,
                None => break,
            },
            _ = shutdown.recv() => break,
        };
        if waiter.is_closed() {
            continue;
        }

        let accepted = match pending.take() {
            Some(connection) => Ok(connection),
            None => tokio::select! {
                accepted = listener.accept() => accepted,
                _ = waiter.closed() => continue,
                _ = shutdown.recv() => break,
            },
        };

        match accepted {
            Ok((stream, peer)) => {
                tracing::debug!(peer_addr = %peer, "HTTP-side connection accepted");
                if let Err(Ok(connection)) = waiter.send(Ok((stream, peer))) {
                    tracing::debug!(peer_addr = %peer, "Waiting session gone, handing connection to the next one");
                    pending = Some(connection);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to accept HTTP-side connection");
                let _ = waiter.send(Err(e));
            }
        }
    }

    tracing::info!("Request lane stopped");
}
