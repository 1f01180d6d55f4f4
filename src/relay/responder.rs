//! Synthetic HTTP responses written to the HTTP-side connection.
//!
//! Every response is followed by flush and shutdown: one response per
//! HTTP-side connection.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::relay::frame::Frame;

pub const PARSE_FAILURE: &[u8] = b"HTTP/1.1 500 OK\n";
pub const DISCONNECTED: &[u8] = b"HTTP/1.1 503 Client disconnected, retry later\n";

#[derive(Debug, Clone, Copy)]
pub enum RelayResponse<'a> {
    /// 200 with the frame's chunks as body.
    Payload(&'a Frame),
    /// The endpoint's sentinel, byte for byte.
    Sentinel(&'a [u8]),
    /// The request did not match the tunneled request shape.
    ParseFailure,
    /// The endpoint connection is gone.
    Disconnected,
}

impl RelayResponse<'_> {
    /// Write, flush and shut down the write half.
    pub async fn send<W>(self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match self {
            RelayResponse::Payload(frame) => {
                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n",
                    frame.payload_len()
                );
                writer.write_all(header.as_bytes()).await?;
                for chunk in frame.chunks() {
                    writer.write_all(chunk).await?;
                }
            }
            RelayResponse::Sentinel(bytes) => writer.write_all(bytes).await?,
            RelayResponse::ParseFailure => writer.write_all(PARSE_FAILURE).await?,
            RelayResponse::Disconnected => writer.write_all(DISCONNECTED).await?,
        }
        writer.flush().await?;
        writer.shutdown().await
    }
}
