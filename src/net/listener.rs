//! TCP listeners with backpressure.
//!
//! # Responsibilities
//! - Bind to configured address and port
//! - Accept endpoint connections
//! - Enforce max_sessions limit via semaphore

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::RelayError;

/// Bind a plain TCP listener on `bind_address:port`.
pub async fn bind(bind_address: &str, port: u16, role: &'static str) -> Result<TcpListener, RelayError> {
    let address = format!("{}:{}", bind_address, port);
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| RelayError::Bind {
            address: address.clone(),
            source,
        })?;

    let local_addr = listener
        .local_addr()
        .map_err(|source| RelayError::Bind { address, source })?;

    tracing::info!(address = %local_addr, role, "Listener bound");
    Ok(listener)
}

/// A bounded TCP listener that limits concurrent endpoint connections.
///
/// Uses a semaphore to enforce `max_sessions`. When the limit is reached,
/// new connections will wait until a slot becomes available.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
}

impl Listener {
    /// Wrap an already bound listener.
    pub fn new(inner: TcpListener, max_sessions: usize) -> Self {
        Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(max_sessions)),
        }
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), RelayError> {
        // Acquire permit first (backpressure). The semaphore is never closed.
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| std::io::Error::other("session limit semaphore closed"))?;

        let (stream, addr) = self.inner.accept().await?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Endpoint connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}
