//! UDP transport for DNS queries.
//!
//! One unframed datagram each way. Datagrams from any address other than
//! the queried server are dropped while waiting.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::warn;

use super::with_timeout;
use crate::proxy::UdpAssociation;

/// Bind an ephemeral socket of the same family as `endpoint`.
pub(crate) async fn bind_for(endpoint: SocketAddr) -> io::Result<UdpSocket> {
    let local = if endpoint.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    UdpSocket::bind(local).await
}

pub(crate) async fn exchange(
    socket: &UdpSocket,
    endpoint: SocketAddr,
    query: &[u8],
    buf_len: usize,
    send_timeout: Duration,
    recv_timeout: Duration,
) -> io::Result<Vec<u8>> {
    with_timeout(send_timeout, "UDP send", socket.send_to(query, endpoint)).await?;

    let mut buf = vec![0u8; buf_len];
    let len = with_timeout(recv_timeout, "UDP receive", async {
        loop {
            let (len, from) = socket.recv_from(&mut buf).await?;
            if from == endpoint {
                return Ok::<usize, io::Error>(len);
            }
            warn!(
                expected = %endpoint,
                received_from = %from,
                "UDP response from unexpected source"
            );
        }
    })
    .await?;

    buf.truncate(len);
    Ok(buf)
}

/// Same as [`exchange`] but relayed through a SOCKS5 UDP association.
pub(crate) async fn exchange_associated(
    association: &dyn UdpAssociation,
    endpoint: SocketAddr,
    query: &[u8],
    buf_len: usize,
    send_timeout: Duration,
    recv_timeout: Duration,
) -> io::Result<Vec<u8>> {
    with_timeout(send_timeout, "UDP send", association.send_to(query, endpoint)).await?;

    let mut buf = vec![0u8; buf_len];
    let len = with_timeout(recv_timeout, "UDP receive", async {
        loop {
            let (len, from) = association.recv_from(&mut buf).await?;
            if from == endpoint {
                return Ok::<usize, io::Error>(len);
            }
            warn!(
                expected = %endpoint,
                received_from = %from,
                "relayed datagram from unexpected source"
            );
        }
    })
    .await?;

    buf.truncate(len);
    Ok(buf)
}
