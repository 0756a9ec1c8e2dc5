//! Frame-stream exchange over TCP.
//!
//! One connection carries one request message and one response message.
//! A message ends at a `commit` frame or when the peer closes its side.

use crawlkit_core::codec::{Frame, FrameDecoder};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use crate::error::FetchError;

/// Read buffer size.
const READ_CHUNK: usize = 16 * 1024;

/// Reads frames until `commit` or EOF. The commit frame is not returned.
///
/// # Errors
///
/// Returns [`FetchError::Timeout`] if the message is not complete within
/// `timeout`, or [`FetchError::Socket`] on read errors.
pub async fn read_message<R>(reader: &mut R, timeout: Duration) -> Result<Vec<Frame>, FetchError>
where
    R: AsyncRead + Unpin,
{
    let read = async {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        let mut buf = vec![0u8; READ_CHUNK];

        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| FetchError::Socket(e.to_string()))?;
            if n == 0 {
                frames.extend(decoder.finish());
                debug!(frames = frames.len(), "Peer closed stream");
                return Ok(frames);
            }
            for frame in decoder.push(&buf[..n]) {
                if frame.is_commit() {
                    return Ok(frames);
                }
                frames.push(frame);
            }
        }
    };

    tokio::time::timeout(timeout, read)
        .await
        .map_err(|_| FetchError::Timeout(timeout))?
}

/// Writes an encoded message and flushes it.
///
/// # Errors
///
/// Returns [`FetchError::Socket`] on write errors.
pub async fn write_message<W>(writer: &mut W, message: &[u8]) -> Result<(), FetchError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(message)
        .await
        .map_err(|e| FetchError::Socket(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| FetchError::Socket(e.to_string()))
}

/// Connects, sends one message and reads the reply.
///
/// The connect and read phases have independent timeouts.
///
/// # Errors
///
/// Returns [`FetchError::Timeout`] if either phase times out, or
/// [`FetchError::Socket`] on connection and I/O errors.
#[instrument(skip(message), fields(addr = %addr))]
pub async fn exchange(
    addr: &str,
    message: &[u8],
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Vec<Frame>, FetchError> {
    let mut stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| FetchError::Timeout(connect_timeout))?
        .map_err(|e| FetchError::Socket(format!("connect to {addr}: {e}")))?;
    debug!("Connected");

    write_message(&mut stream, message).await?;
    read_message(&mut stream, read_timeout).await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crawlkit_core::codec::encode_frames;

    #[tokio::test]
    async fn test_read_stops_at_commit() {
        let frames = [Frame::new("url", "u"), Frame::commit(), Frame::new("extra", "x")];
        let data = encode_frames(&frames);
        let mut reader = data.as_slice();
        let read = read_message(&mut reader, Duration::from_secs(1)).await.unwrap();
        assert_eq!(read, vec![Frame::new("url", "u")]);
    }

    #[tokio::test]
    async fn test_read_until_eof_without_commit() {
        let mut reader: &[u8] = b"url:u\0status_code:200";
        let read = read_message(&mut reader, Duration::from_secs(1)).await.unwrap();
        assert_eq!(read.len(), 2);
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let (_client, mut server) = tokio::io::duplex(64);
        let result = read_message(&mut server, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(FetchError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = exchange(&addr, b"", Duration::from_secs(1), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(FetchError::Socket(_))));
    }
}
