//! Request/response exchange with name servers.
//!
//! A [`Transport`] owns a list of servers and performs one logical exchange
//! with retries, round-robining across the list over UDP, TCP or a proxy.

pub mod tcp;
pub mod udp;

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpStream, UdpSocket};
use tracing::debug;

use crate::cache::{DnsCache, SimpleCache};
use crate::dns::{Message, Origin};
use crate::error::{Error, Result};
use crate::nameserver::NameServerAddress;
use crate::proxy::{NetProxy, ProxyKind, ProxyStream, UdpAssociation};
use crate::stats::Stats;

/// Initial UDP receive buffer.
pub const UDP_BUFFER_LEN: usize = 512;

/// Largest DNS message a TCP frame can carry.
pub const MAX_MESSAGE_LEN: usize = 65535;

/// Transport protocol identifier for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by every exchange a client or resolver performs.
#[derive(Clone)]
pub struct ClientOptions {
    pub proxy: Option<Arc<dyn NetProxy>>,
    pub prefer_ipv6: bool,
    /// Always use TCP instead of UDP.
    pub tcp: bool,
    pub retries: u32,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
    pub recv_timeout: Duration,
    pub stats: Arc<Stats>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            proxy: None,
            prefer_ipv6: false,
            tcp: false,
            retries: 2,
            connect_timeout: Duration::from_millis(2000),
            send_timeout: Duration::from_millis(2000),
            recv_timeout: Duration::from_millis(2000),
            stats: Arc::new(Stats::new()),
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("proxy", &self.proxy.as_ref().map(|proxy| proxy.kind()))
            .field("prefer_ipv6", &self.prefer_ipv6)
            .field("tcp", &self.tcp)
            .field("retries", &self.retries)
            .field("connect_timeout", &self.connect_timeout)
            .field("send_timeout", &self.send_timeout)
            .field("recv_timeout", &self.recv_timeout)
            .finish()
    }
}

enum Channel {
    Tcp(TcpStream),
    Proxied(Box<dyn ProxyStream>),
    Udp(UdpSocket),
    Associated(Box<dyn UdpAssociation>),
}

pub struct Transport {
    servers: Vec<NameServerAddress>,
    options: ClientOptions,
}

impl Transport {
    pub fn new(servers: Vec<NameServerAddress>, options: ClientOptions) -> Self {
        Self { servers, options }
    }

    pub fn single(server: NameServerAddress, options: ClientOptions) -> Self {
        Self::new(vec![server], options)
    }

    pub fn servers(&self) -> &[NameServerAddress] {
        &self.servers
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Exchange `request` with the configured servers.
    ///
    /// Makes `retries` attempts per server starting from a random one. A
    /// truncated UDP response is retried over TCP against the same server.
    /// Only a response whose ID matches the request is returned.
    pub async fn exchange(&self, request: &Message) -> Result<Message> {
        if self.servers.is_empty() {
            return Err(Error::NoResponse);
        }

        let query = request.to_bytes()?;
        let mut servers = self.servers.clone();
        let count = servers.len();
        let retries = self.options.retries.max(1) as usize;
        let attempts = if count > 1 { retries * count } else { retries };
        let start = rand::random_range(0..count);
        let mut udp_buf_len = UDP_BUFFER_LEN;

        for attempt in 0..attempts {
            let server = &mut servers[(start + attempt) % count];

            if server.endpoint().is_none() {
                let cache: Arc<dyn DnsCache> = Arc::new(SimpleCache::new());
                server.resolve_endpoint(cache, &self.options).await;
            }
            let Some(endpoint) = server.endpoint() else {
                debug!(attempt, server = %server, "name server address unresolved");
                self.options.stats.record_failed_attempt();
                continue;
            };
            let server = &*server;

            let result = match self
                .attempt(&query, request.id(), server, endpoint, self.options.tcp, udp_buf_len)
                .await
            {
                Ok(response) if response.is_truncated() && !self.options.tcp => {
                    debug!(server = %server, "truncated UDP response, retrying over TCP");
                    self.options.stats.record_tcp_upgrade();
                    udp_buf_len = MAX_MESSAGE_LEN;
                    self.attempt(&query, request.id(), server, endpoint, true, udp_buf_len)
                        .await
                }
                other => other,
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e @ Error::ProxyUnsupported(_)) => return Err(e),
                Err(e) => {
                    debug!(attempt, server = %server, error = %e, "exchange attempt failed");
                    self.options.stats.record_failed_attempt();
                }
            }
        }

        Err(Error::NoResponse)
    }

    async fn attempt(
        &self,
        query: &[u8],
        id: u16,
        server: &NameServerAddress,
        endpoint: SocketAddr,
        tcp: bool,
        udp_buf_len: usize,
    ) -> Result<Message> {
        let started = Instant::now();
        let send_timeout = self.options.send_timeout;
        let recv_timeout = self.options.recv_timeout;

        let (bytes, protocol) = match self.open_channel(endpoint, tcp).await? {
            Channel::Tcp(mut stream) => (
                tcp::exchange(&mut stream, query, send_timeout, recv_timeout).await?,
                Protocol::Tcp,
            ),
            Channel::Proxied(mut stream) => (
                tcp::exchange(&mut stream, query, send_timeout, recv_timeout).await?,
                Protocol::Tcp,
            ),
            Channel::Udp(socket) => (
                udp::exchange(&socket, endpoint, query, udp_buf_len, send_timeout, recv_timeout)
                    .await?,
                Protocol::Udp,
            ),
            Channel::Associated(mut association) => {
                association.set_receive_timeout(recv_timeout);
                let bytes = udp::exchange_associated(
                    &*association,
                    endpoint,
                    query,
                    udp_buf_len,
                    send_timeout,
                    recv_timeout,
                )
                .await?;
                (bytes, Protocol::Udp)
            }
        };
        let rtt = started.elapsed();

        let mut response = Message::from_bytes(&bytes)?;
        if response.id() != id {
            debug!(
                server = %server,
                expected = id,
                received = response.id(),
                "response ID mismatch"
            );
            self.options.stats.record_id_mismatch();
            return Err(Error::NoResponse);
        }

        self.options.stats.record_exchange(rtt);
        response.origin = Some(Origin {
            server: server.clone(),
            protocol,
            rtt,
        });
        Ok(response)
    }

    async fn open_channel(&self, endpoint: SocketAddr, tcp: bool) -> Result<Channel> {
        let connect_timeout = self.options.connect_timeout;

        let Some(proxy) = &self.options.proxy else {
            return Ok(if tcp {
                Channel::Tcp(tcp::connect(endpoint, connect_timeout).await?)
            } else {
                Channel::Udp(udp::bind_for(endpoint).await?)
            });
        };

        match proxy.kind() {
            ProxyKind::Http => Ok(Channel::Proxied(
                proxy.connect(endpoint, connect_timeout).await?,
            )),
            ProxyKind::Socks5 if !tcp => match proxy.udp_associate(connect_timeout).await {
                Ok(association) => Ok(Channel::Associated(association)),
                Err(e) => {
                    debug!(error = %e, "SOCKS5 UDP associate failed, falling back to CONNECT");
                    Ok(Channel::Proxied(proxy.connect(endpoint, connect_timeout).await?))
                }
            },
            ProxyKind::Socks5 => Ok(Channel::Proxied(
                proxy.connect(endpoint, connect_timeout).await?,
            )),
            kind @ ProxyKind::Socks4 => Err(Error::ProxyUnsupported(kind)),
        }
    }
}

/// Run an I/O future with a deadline, mapping expiry to `TimedOut`.
pub(crate) async fn with_timeout<T, F>(duration: Duration, what: &str, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    tokio::time::timeout(duration, fut).await.map_err(|_| {
        io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{} timed out after {:?}", what, duration),
        )
    })?
}
