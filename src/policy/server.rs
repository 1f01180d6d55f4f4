//! Standalone policy servers.
//!
//! Each plugin first asks a well-known port for its policy; these listeners
//! answer every connection with the rendered document and close it.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::policy::document::PolicyKind;
use crate::policy::write_document;

/// Serves one policy document on its own listener.
pub struct PolicyServer {
    kind: PolicyKind,
    document: Arc<str>,
    read_buffer_size: usize,
}

impl PolicyServer {
    pub fn new(kind: PolicyKind, hostname: &str, port: u16, read_buffer_size: usize) -> Self {
        Self {
            kind,
            document: kind.render(hostname, port).into(),
            read_buffer_size,
        }
    }

    /// Accept connections until shutdown.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) {
        let kind = self.kind.as_str();
        tracing::info!(kind, address = ?listener.local_addr().ok(), "Policy server started");

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(kind, peer_addr = %peer, "Policy request");
                        let document = Arc::clone(&self.document);
                        let read_buffer_size = self.read_buffer_size;
                        let kind = self.kind;
                        tokio::spawn(async move {
                            if let Err(e) = serve(stream, kind, &document, read_buffer_size).await {
                                tracing::warn!(kind = kind.as_str(), peer_addr = %peer, error = %e, "Failed to serve policy");
                            }
                        });
                    }
                    Err(e) => tracing::warn!(kind, error = %e, "Failed to accept policy connection"),
                },
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!(kind, "Policy server stopped");
    }
}

async fn serve(
    mut stream: TcpStream,
    kind: PolicyKind,
    document: &str,
    read_buffer_size: usize,
) -> std::io::Result<()> {
    // Drain the request so closing does not reset the connection.
    let request = crate::net::read_message(&mut stream, read_buffer_size).await?;
    tracing::trace!(bytes = request.len(), "Policy request read");
    write_document(&mut stream, kind, document).await
}
