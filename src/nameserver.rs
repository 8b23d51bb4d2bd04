//! Name server addresses, the root server set and referral extraction.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use rand::seq::SliceRandom;
use tracing::debug;

use crate::cache::DnsCache;
use crate::dns::{Message, Question, RData, RecordClass, RecordType};
use crate::resolver::{self, ResolverConfig};
use crate::transport::ClientOptions;

pub const DNS_PORT: u16 = 53;

const RESOLV_CONF: &str = "/etc/resolv.conf";

/// A resolver target: a hostname, a known endpoint, or both.
///
/// Without an endpoint the server cannot be queried until its hostname
/// has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameServerAddress {
    host: String,
    port: u16,
    endpoint: Option<SocketAddr>,
}

impl NameServerAddress {
    pub fn from_host(host: impl Into<String>) -> Self {
        Self::from_host_port(host, DNS_PORT)
    }

    pub fn from_host_port(host: impl Into<String>, port: u16) -> Self {
        let mut host = host.into();
        if host.ends_with('.') {
            host.pop();
        }
        Self {
            host,
            port,
            endpoint: None,
        }
    }

    pub fn from_ip(ip: IpAddr) -> Self {
        Self::from_endpoint(SocketAddr::new(ip, DNS_PORT))
    }

    pub fn from_endpoint(endpoint: SocketAddr) -> Self {
        Self {
            host: String::new(),
            port: endpoint.port(),
            endpoint: Some(endpoint),
        }
    }

    pub fn new(host: impl Into<String>, ip: IpAddr) -> Self {
        let mut server = Self::from_host(host);
        server.set_address(ip);
        server
    }

    /// Hostname, empty when the server was given by address only.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn endpoint(&self) -> Option<SocketAddr> {
        self.endpoint
    }

    /// The same server on another port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        if let Some(endpoint) = &mut self.endpoint {
            endpoint.set_port(port);
        }
        self
    }

    pub fn set_address(&mut self, ip: IpAddr) {
        self.endpoint = Some(SocketAddr::new(ip, self.port));
    }

    /// Resolve the hostname to an endpoint if none is known yet.
    ///
    /// Failures are not reported: callers check [`endpoint`](Self::endpoint)
    /// afterwards.
    pub fn resolve_endpoint<'a>(
        &'a mut self,
        cache: Arc<dyn DnsCache>,
        options: &'a ClientOptions,
    ) -> BoxFuture<'a, ()> {
        async move {
            if self.endpoint.is_some() || self.host.is_empty() {
                return;
            }

            let types: &[RecordType] = if options.prefer_ipv6 {
                &[RecordType::Aaaa, RecordType::A]
            } else {
                &[RecordType::A]
            };
            let config = ResolverConfig {
                options: options.clone(),
                cache: Some(cache),
                ..ResolverConfig::default()
            };

            for &qtype in types {
                let question = Question::new(self.host.clone(), qtype, RecordClass::In);
                match resolver::resolve_via_root_name_servers(question, &config).await {
                    Ok(response) => {
                        let ip = response
                            .answer
                            .iter()
                            .filter(|record| record.rtype == qtype)
                            .find_map(|record| record.rdata.ip_addr());
                        if let Some(ip) = ip {
                            debug!(host = %self.host, %ip, "name server address resolved");
                            self.set_address(ip);
                            return;
                        }
                    }
                    Err(e) => {
                        debug!(
                            host = %self.host,
                            %qtype,
                            error = %e,
                            "name server address lookup failed"
                        );
                    }
                }
            }
        }
        .boxed()
    }

    /// Name servers named by the NS records of a referral.
    ///
    /// Glue from the additional section is installed where present (AAAA
    /// when `prefer_ipv6`, otherwise A). With `glue_only`, servers without
    /// glue are left out.
    pub fn from_response(response: &Message, prefer_ipv6: bool, glue_only: bool) -> Vec<Self> {
        let glue_type = if prefer_ipv6 {
            RecordType::Aaaa
        } else {
            RecordType::A
        };

        response
            .authority
            .iter()
            .filter_map(|record| match &record.rdata {
                RData::Ns(host) => Some(host),
                _ => None,
            })
            .filter_map(|host| {
                let mut server = Self::from_host(host.clone());
                let glue = response
                    .additional
                    .iter()
                    .filter(|extra| extra.rtype == glue_type)
                    .filter(|extra| extra.name.eq_ignore_ascii_case(host))
                    .find_map(|extra| extra.rdata.ip_addr());

                match glue {
                    Some(ip) => {
                        server.set_address(ip);
                        Some(server)
                    }
                    None if glue_only => None,
                    None => Some(server),
                }
            })
            .collect()
    }
}

impl fmt::Display for NameServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.host, self.endpoint) {
            (host, Some(endpoint)) if !host.is_empty() => write!(f, "{} ({})", host, endpoint),
            (_, Some(endpoint)) => write!(f, "{}", endpoint),
            (host, None) => write!(f, "{}", host),
        }
    }
}

impl FromStr for NameServerAddress {
    type Err = String;

    /// Accepts `1.2.3.4`, `1.2.3.4:5353`, `[::1]:53`, `::1` or a hostname
    /// with an optional `:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty name server address".to_string());
        }
        if let Ok(endpoint) = s.parse::<SocketAddr>() {
            return Ok(Self::from_endpoint(endpoint));
        }
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::from_ip(ip));
        }

        match s.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port in name server address: {}", s))?;
                Ok(Self::from_host_port(host, port))
            }
            Some(_) => Err(format!("invalid name server address: {}", s)),
            None => Ok(Self::from_host(s)),
        }
    }
}

/// Randomly permute servers in place.
pub fn shuffle(servers: &mut [NameServerAddress]) {
    servers.shuffle(&mut rand::rng());
}

struct RootServer {
    host: &'static str,
    ipv4: Ipv4Addr,
    ipv6: Ipv6Addr,
}

static ROOT_SERVERS: [RootServer; 13] = [
    RootServer {
        host: "a.root-servers.net",
        ipv4: Ipv4Addr::new(198, 41, 0, 4),
        ipv6: Ipv6Addr::new(0x2001, 0x503, 0xba3e, 0, 0, 0, 0x2, 0x30),
    },
    RootServer {
        host: "b.root-servers.net",
        ipv4: Ipv4Addr::new(170, 247, 170, 2),
        ipv6: Ipv6Addr::new(0x2801, 0x1b8, 0x10, 0, 0, 0, 0, 0xb),
    },
    RootServer {
        host: "c.root-servers.net",
        ipv4: Ipv4Addr::new(192, 33, 4, 12),
        ipv6: Ipv6Addr::new(0x2001, 0x500, 0x2, 0, 0, 0, 0, 0xc),
    },
    RootServer {
        host: "d.root-servers.net",
        ipv4: Ipv4Addr::new(199, 7, 91, 13),
        ipv6: Ipv6Addr::new(0x2001, 0x500, 0x2d, 0, 0, 0, 0, 0xd),
    },
    RootServer {
        host: "e.root-servers.net",
        ipv4: Ipv4Addr::new(192, 203, 230, 10),
        ipv6: Ipv6Addr::new(0x2001, 0x500, 0xa8, 0, 0, 0, 0, 0xe),
    },
    RootServer {
        host: "f.root-servers.net",
        ipv4: Ipv4Addr::new(192, 5, 5, 241),
        ipv6: Ipv6Addr::new(0x2001, 0x500, 0x2f, 0, 0, 0, 0, 0xf),
    },
    RootServer {
        host: "g.root-servers.net",
        ipv4: Ipv4Addr::new(192, 112, 36, 4),
        ipv6: Ipv6Addr::new(0x2001, 0x500, 0x12, 0, 0, 0, 0, 0xd0d),
    },
    RootServer {
        host: "h.root-servers.net",
        ipv4: Ipv4Addr::new(198, 97, 190, 53),
        ipv6: Ipv6Addr::new(0x2001, 0x500, 0x1, 0, 0, 0, 0, 0x53),
    },
    RootServer {
        host: "i.root-servers.net",
        ipv4: Ipv4Addr::new(192, 36, 148, 17),
        ipv6: Ipv6Addr::new(0x2001, 0x7fe, 0, 0, 0, 0, 0, 0x53),
    },
    RootServer {
        host: "j.root-servers.net",
        ipv4: Ipv4Addr::new(192, 58, 128, 30),
        ipv6: Ipv6Addr::new(0x2001, 0x503, 0xc27, 0, 0, 0, 0x2, 0x30),
    },
    RootServer {
        host: "k.root-servers.net",
        ipv4: Ipv4Addr::new(193, 0, 14, 129),
        ipv6: Ipv6Addr::new(0x2001, 0x7fd, 0, 0, 0, 0, 0, 0x1),
    },
    RootServer {
        host: "l.root-servers.net",
        ipv4: Ipv4Addr::new(199, 7, 83, 42),
        ipv6: Ipv6Addr::new(0x2001, 0x500, 0x9f, 0, 0, 0, 0, 0x42),
    },
    RootServer {
        host: "m.root-servers.net",
        ipv4: Ipv4Addr::new(202, 12, 27, 33),
        ipv6: Ipv6Addr::new(0x2001, 0xdc3, 0, 0, 0, 0, 0, 0x35),
    },
];

/// A fresh copy of the root server set, in fixed a..m order.
pub fn root_name_servers(ipv6: bool) -> Vec<NameServerAddress> {
    ROOT_SERVERS
        .iter()
        .map(|root| {
            let ip = if ipv6 {
                IpAddr::V6(root.ipv6)
            } else {
                IpAddr::V4(root.ipv4)
            };
            NameServerAddress::new(root.host, ip)
        })
        .collect()
}

/// Name servers configured in `/etc/resolv.conf`.
pub fn system_name_servers() -> io::Result<Vec<NameServerAddress>> {
    let contents = std::fs::read_to_string(RESOLV_CONF)?;
    Ok(parse_resolv_conf(&contents))
}

pub fn parse_resolv_conf(contents: &str) -> Vec<NameServerAddress> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match fields.next() {
                Some("nameserver") => fields.next(),
                _ => None,
            }
        })
        // Drop IPv6 zone suffixes such as fe80::1%eth0.
        .filter_map(|addr| addr.split('%').next()?.parse::<IpAddr>().ok())
        .map(NameServerAddress::from_ip)
        .collect()
}
