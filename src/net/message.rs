//! Read-to-quiescence message reads.
//!
//! Neither the handshake nor the HTTP-side request carries a length, so a
//! message ends at the first read that does not fill the buffer.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Read one message: keep reading until a read returns fewer than
/// `buffer_size` bytes. End-of-stream ends the message as well.
pub async fn read_message<R>(reader: &mut R, buffer_size: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut message = Vec::new();
    let mut buffer = vec![0u8; buffer_size];
    loop {
        let n = reader.read(&mut buffer).await?;
        message.extend_from_slice(&buffer[..n]);
        tracing::trace!(bytes = n, total = message.len(), "Read");
        if n == 0 || n < buffer.len() {
            return Ok(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn short_read_ends_message() {
        let mut input: &[u8] = b"GET / HTTP/1.1\r\n\r\n";
        let message = read_message(&mut input, 4096).await.unwrap();
        assert_eq!(message, b"GET / HTTP/1.1\r\n\r\n");
    }

    #[tokio::test]
    async fn full_reads_continue() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(b"abcdefgh").await.unwrap();

        // Two full 4-byte reads, then a short read at end-of-stream.
        drop(client);
        let message = read_message(&mut server, 4).await.unwrap();
        assert_eq!(message, b"abcdefgh");
    }

    #[tokio::test]
    async fn closed_peer_yields_empty_message() {
        let mut input: &[u8] = b"";
        let message = read_message(&mut input, 4096).await.unwrap();
        assert!(message.is_empty());
    }

    #[tokio::test]
    async fn zero_sized_buffer_returns_instead_of_spinning() {
        let mut input: &[u8] = b"GET / HTTP/1.1\r\n\r\n";
        let message = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            read_message(&mut input, 0),
        )
        .await
        .expect("read_message must return with an empty buffer");
        assert!(message.unwrap().is_empty());
    }
}
