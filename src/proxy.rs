//! Proxy capability consumed by the transport.
//!
//! Proxy clients live outside this crate; the transport only needs a
//! connected stream or a UDP association from them.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    Http,
    Socks5,
    Socks4,
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProxyKind::Http => "HTTP",
            ProxyKind::Socks5 => "SOCKS5",
            ProxyKind::Socks4 => "SOCKS4",
        })
    }
}

/// A byte stream tunnelled through a proxy.
pub trait ProxyStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ProxyStream for T {}

/// A SOCKS5 UDP ASSOCIATE relay.
#[async_trait]
pub trait UdpAssociation: Send + Sync {
    fn set_receive_timeout(&mut self, timeout: Duration);

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Receive one datagram and the address it was relayed from.
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

#[async_trait]
pub trait NetProxy: Send + Sync {
    fn kind(&self) -> ProxyKind;

    /// HTTP CONNECT or SOCKS5 CONNECT to `endpoint`.
    async fn connect(
        &self,
        endpoint: SocketAddr,
        timeout: Duration,
    ) -> io::Result<Box<dyn ProxyStream>>;

    async fn udp_associate(&self, timeout: Duration) -> io::Result<Box<dyn UdpAssociation>>;
}

impl fmt::Debug for dyn NetProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetProxy({})", self.kind())
    }
}
