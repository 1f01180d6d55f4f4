//! Cross-domain policy documents.
//!
//! # Data Flow
//! ```text
//! Plugin asks port 843/943 → server.rs → document.rs → write, close
//! Plugin asks in-band on the endpoint port → relay dispatcher → write_policy
//! ```

pub mod document;
pub mod server;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::observability::metrics;

pub use document::PolicyKind;
pub use server::PolicyServer;

/// Substring that marks a handshake as a policy request.
pub const POLICY_REQUEST_MARKER: &str = "<policy-file-request/>";

/// Whether a handshake asks for the policy document.
pub fn is_policy_request(handshake: &[u8]) -> bool {
    String::from_utf8_lossy(handshake).contains(POLICY_REQUEST_MARKER)
}

/// Write the `kind` document for `hostname`/`port` to `conn`, then flush
/// and shut down the write half.
pub async fn write_policy<W>(conn: &mut W, kind: PolicyKind, hostname: &str, port: u16) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_document(conn, kind, &kind.render(hostname, port)).await
}

pub(crate) async fn write_document<W>(conn: &mut W, kind: PolicyKind, document: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    conn.write_all(document.as_bytes()).await?;
    conn.flush().await?;
    conn.shutdown().await?;
    metrics::record_policy_served(kind.as_str());
    Ok(())
}
