//! Endpoint reply framing.
//!
//! A reply is either the sentinel text, relayed verbatim, or a frame:
//!
//! ```text
//! <decimal length>:<payload bytes...>
//! ```
//!
//! The payload may arrive over any number of reads. Completion is decided
//! by the number of payload bytes received (the prefix and separator do not
//! count). Unless strict length checking is enabled, the declared length is
//! a threshold rather than an exact size: whatever the final read brought
//! is forwarded.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::FramingConfig;

/// Sent by the endpoint instead of a frame when it could not fetch the target.
pub const SENTINEL_PREFIX: &[u8] = b"HTTP/1.1 502 Not accessible";

/// Longest accepted length prefix, in digits.
pub const MAX_PREFIX_DIGITS: usize = 20;

/// Malformed frame errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid length prefix {0:?}")]
    InvalidLength(String),

    #[error("length prefix exceeds {} digits", MAX_PREFIX_DIGITS)]
    PrefixTooLong,

    #[error("received {received} payload bytes, declared {declared}")]
    Overrun { declared: usize, received: usize },
}

/// A fully received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    declared: usize,
    chunks: Vec<Vec<u8>>,
}

impl Frame {
    /// Length announced in the prefix.
    pub fn declared_len(&self) -> usize {
        self.declared
    }

    /// Bytes actually received, which is what gets forwarded.
    pub fn payload_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Payload chunks in receipt order.
    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }
}

/// Result of feeding one chunk to the accumulator.
#[derive(Debug, PartialEq, Eq)]
pub enum Progress {
    /// More reads are needed.
    Incomplete,
    /// The first chunk was the sentinel; relay it as-is.
    Sentinel(Vec<u8>),
    /// The declared length has been reached; call [`FrameAccumulator::finish`].
    Complete,
}

/// Pure reassembly state for one reply.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    declared: Option<usize>,
    /// Prefix bytes seen before the separator arrived.
    prefix: Vec<u8>,
    chunks: Vec<Vec<u8>>,
    received: usize,
    strict: bool,
}

impl FrameAccumulator {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            ..Self::default()
        }
    }

    /// Length announced by the prefix, once it has been read.
    pub fn declared_len(&self) -> Option<usize> {
        self.declared
    }

    /// Payload bytes received so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Feed the bytes of one read.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Progress, FrameError> {
        let declared = match self.declared {
            Some(declared) => {
                self.store(chunk.to_vec());
                declared
            }
            None => {
                if self.prefix.is_empty() && chunk.starts_with(SENTINEL_PREFIX) {
                    return Ok(Progress::Sentinel(chunk.to_vec()));
                }
                self.prefix.extend_from_slice(chunk);
                match self.split_prefix()? {
                    Some(declared) => declared,
                    None => return Ok(Progress::Incomplete),
                }
            }
        };

        if self.strict && self.received > declared {
            return Err(FrameError::Overrun {
                declared,
                received: self.received,
            });
        }

        if self.received >= declared {
            Ok(Progress::Complete)
        } else {
            Ok(Progress::Incomplete)
        }
    }

    /// Consume the accumulator once [`Progress::Complete`] was returned.
    pub fn finish(self) -> Frame {
        Frame {
            declared: self.declared.unwrap_or(0),
            chunks: self.chunks,
        }
    }

    /// Parse `<digits>:` out of the buffered prefix. Returns `None` while
    /// the separator has not arrived yet.
    fn split_prefix(&mut self) -> Result<Option<usize>, FrameError> {
        let Some(separator) = self.prefix.iter().position(|&b| b == b':') else {
            if !self.prefix.iter().all(u8::is_ascii_digit) {
                return Err(FrameError::InvalidLength(
                    String::from_utf8_lossy(&self.prefix).into_owned(),
                ));
            }
            if self.prefix.len() > MAX_PREFIX_DIGITS {
                return Err(FrameError::PrefixTooLong);
            }
            return Ok(None);
        };

        let digits = &self.prefix[..separator];
        if digits.len() > MAX_PREFIX_DIGITS {
            return Err(FrameError::PrefixTooLong);
        }
        let declared = std::str::from_utf8(digits)
            .ok()
            .filter(|text| !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|text| text.parse::<usize>().ok())
            .ok_or_else(|| FrameError::InvalidLength(String::from_utf8_lossy(digits).into_owned()))?;

        let payload = self.prefix.split_off(separator + 1);
        self.prefix.clear();
        self.declared = Some(declared);
        if !payload.is_empty() {
            self.store(payload);
        }
        tracing::debug!(declared, "Frame length declared");
        Ok(Some(declared))
    }

    fn store(&mut self, chunk: Vec<u8>) {
        self.received += chunk.len();
        self.chunks.push(chunk);
    }
}

/// What the endpoint answered for one tunneled request.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Complete(Frame),
    Sentinel(Vec<u8>),
    /// The endpoint connection failed or reached end-of-stream.
    Disconnected,
}

/// Reads one reply from the endpoint connection.
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    buffer_size: usize,
    strict: bool,
}

impl FrameDecoder {
    pub fn new(config: FramingConfig) -> Self {
        Self {
            buffer_size: config.read_buffer_size,
            strict: config.strict_length,
        }
    }

    /// Read until the reply is complete. Transport errors become
    /// [`Reply::Disconnected`]; only malformed frames are errors.
    pub async fn read_reply<R>(&self, reader: &mut R) -> Result<Reply, FrameError>
    where
        R: AsyncRead + Unpin,
    {
        let mut accumulator = FrameAccumulator::new(self.strict);
        let mut buffer = vec![0u8; self.buffer_size];
        loop {
            let n = match reader.read(&mut buffer).await {
                Ok(0) => {
                    tracing::info!("Endpoint closed the connection");
                    return Ok(Reply::Disconnected);
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "Error reading from endpoint, endpoint probably disconnected");
                    return Ok(Reply::Disconnected);
                }
            };

            match accumulator.push(&buffer[..n])? {
                Progress::Incomplete => {}
                Progress::Sentinel(bytes) => return Ok(Reply::Sentinel(bytes)),
                Progress::Complete => {
                    let frame = accumulator.finish();
                    tracing::debug!(
                        declared = frame.declared_len(),
                        received = frame.payload_len(),
                        "Frame complete"
                    );
                    return Ok(Reply::Complete(frame));
                }
            }
            tracing::trace!(
                read = n,
                received = accumulator.received(),
                declared = ?accumulator.declared_len(),
                "Frame progress"
            );
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(FramingConfig::default())
    }
}
