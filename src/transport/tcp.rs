//! TCP transport for DNS queries.
//!
//! TCP DNS messages are prefixed with a 2-byte big-endian length. The same
//! framing is used over proxied streams.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use super::with_timeout;

/// Connect to `endpoint`, giving up after `timeout`.
pub(crate) async fn connect(endpoint: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let stream = with_timeout(timeout, "TCP connect", TcpStream::connect(endpoint)).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Send one framed query and read one framed response.
pub(crate) async fn exchange<S>(
    stream: &mut S,
    query: &[u8],
    send_timeout: Duration,
    recv_timeout: Duration,
) -> io::Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    with_timeout(send_timeout, "TCP send", send_with_length_prefix(stream, query)).await?;
    let response =
        with_timeout(recv_timeout, "TCP receive", read_with_length_prefix(stream)).await?;
    trace!(query_len = query.len(), response_len = response.len(), "TCP exchange complete");
    Ok(response)
}

pub(crate) async fn send_with_length_prefix<S>(stream: &mut S, message: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let len = u16::try_from(message.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("message of {} bytes does not fit a TCP frame", message.len()),
        )
    })?;

    let mut framed = Vec::with_capacity(2 + message.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(message);

    stream.write_all(&framed).await?;
    stream.flush().await
}

/// Read a length-prefixed message, accumulating partial reads.
pub(crate) async fn read_with_length_prefix<S>(stream: &mut S) -> io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;

    let mut message = vec![0u8; u16::from_be_bytes(len_buf) as usize];
    stream.read_exact(&mut message).await?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_is_length_prefixed() {
        let (mut client, mut server) = tokio::io::duplex(64);
        send_with_length_prefix(&mut client, b"hello").await.unwrap();

        let mut raw = [0u8; 7];
        server.read_exact(&mut raw).await.unwrap();
        assert_eq!(&raw, b"\x00\x05hello");
    }

    #[tokio::test]
    async fn test_partial_reads_are_accumulated() {
        let (mut client, mut server) = tokio::io::duplex(64);

        let writer = tokio::spawn(async move {
            for chunk in [&b"\x00"[..], b"\x06ab", b"cd", b"ef"] {
                server.write_all(chunk).await.unwrap();
                server.flush().await.unwrap();
                tokio::task::yield_now().await;
            }
            server
        });

        let message = read_with_length_prefix(&mut client).await.unwrap();
        assert_eq!(message, b"abcdef");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_short_stream_is_an_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        server.write_all(b"\x00\x08abc").await.unwrap();
        drop(server);

        let err = read_with_length_prefix(&mut client).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_receive_timeout() {
        let (mut client, _server) = tokio::io::duplex(64);
        let err = exchange(
            &mut client,
            b"query",
            Duration::from_millis(50),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
