//! Endpoint session: tunnels HTTP-side connections over one endpoint
//! connection, one at a time.
//!
//! # Loop (while Active)
//! ```text
//! lane.accept() → read request → translate ─┬─ no match → 500, next
//!                                           └─ line → endpoint
//!                                                 → read reply ─┬─ Complete     → 200 + payload, next
//!                                                               ├─ Sentinel     → verbatim, next
//!                                                               └─ Disconnected → 503, Closed
//! ```
//!
//! Any other error closes the session. The endpoint connection outlives
//! every HTTP-side connection it serves.

use std::net::SocketAddr;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::FramingConfig;
use crate::error::RelayError;
use crate::net::{read_message, SessionId, SessionState};
use crate::observability::metrics::{self, Outcome};
use crate::relay::frame::{FrameDecoder, Reply};
use crate::relay::lane::RequestLane;
use crate::relay::responder::RelayResponse;
use crate::relay::translator::TunneledRequest;

/// One endpoint connection and the loop that serves it.
pub struct Session<S> {
    id: SessionId,
    endpoint: S,
    lane: RequestLane,
    decoder: FrameDecoder,
    read_buffer_size: usize,
    state: SessionState,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(id: SessionId, endpoint: S, lane: RequestLane, framing: FramingConfig) -> Self {
        Self {
            id,
            endpoint,
            lane,
            decoder: FrameDecoder::new(framing),
            read_buffer_size: framing.read_buffer_size,
            state: SessionState::Active,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Serve HTTP-side connections until the endpoint goes away, an error
    /// occurs, or shutdown is signalled. Returns how many HTTP-side
    /// connections were answered; one that failed with an error is not
    /// counted.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> u64 {
        let span = tracing::info_span!("session", session_id = %self.id);
        async move {
            tracing::info!("Session started");
            let mut served = 0u64;

            while self.state == SessionState::Active {
                let accepted = tokio::select! {
                    accepted = self.lane.accept() => accepted,
                    _ = shutdown.recv() => {
                        tracing::info!("Session received shutdown signal");
                        break;
                    }
                };

                let result = match accepted {
                    Ok((http, peer)) => self.serve(http, peer, &mut shutdown).await,
                    Err(e) => Err(e),
                };

                match result {
                    Ok(next) => {
                        served += 1;
                        self.state = next;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Error in communication, abandoning session");
                        break;
                    }
                }
            }

            self.state = SessionState::Closed;
            tracing::info!(served, "Session closed");
            served
        }
        .instrument(span)
        .await
    }

    /// Handle one HTTP-side connection. Returns the state to continue in.
    async fn serve(
        &mut self,
        mut http: TcpStream,
        peer: SocketAddr,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<SessionState, RelayError> {
        let span = tracing::info_span!("request", request_id = %Uuid::new_v4(), peer_addr = %peer);
        async move {
            let start = Instant::now();
            let raw = read_message(&mut http, self.read_buffer_size).await?;
            let raw = String::from_utf8_lossy(&raw);

            let Some(request) = TunneledRequest::parse(&raw) else {
                tracing::warn!(bytes = raw.len(), "Request did not match, answering 500");
                RelayResponse::ParseFailure.send(&mut http).await?;
                metrics::record_request(Outcome::ParseFailure, start);
                return Ok(SessionState::Active);
            };

            let mut line = request.to_line();
            tracing::debug!(method = %request.method, target = %request.target, "-> {}", line);
            line.push('\n');
            self.endpoint.write_all(line.as_bytes()).await?;
            self.endpoint.flush().await?;

            let reply = tokio::select! {
                reply = self.decoder.read_reply(&mut self.endpoint) => reply?,
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown while waiting for the endpoint");
                    Reply::Disconnected
                }
            };

            match reply {
                Reply::Complete(frame) => {
                    tracing::debug!(bytes = frame.payload_len(), "<- Sending payload to HTTP side");
                    RelayResponse::Payload(&frame).send(&mut http).await?;
                    metrics::record_bytes_forwarded(frame.payload_len());
                    metrics::record_request(Outcome::Complete, start);
                    Ok(SessionState::Active)
                }
                Reply::Sentinel(bytes) => {
                    tracing::info!("Endpoint reported target not accessible");
                    RelayResponse::Sentinel(&bytes).send(&mut http).await?;
                    metrics::record_request(Outcome::Sentinel, start);
                    Ok(SessionState::Active)
                }
                Reply::Disconnected => {
                    RelayResponse::Disconnected.send(&mut http).await?;
                    metrics::record_request(Outcome::Disconnected, start);
                    Ok(SessionState::Closed)
                }
            }
        }
        .instrument(span)
        .await
    }
}
