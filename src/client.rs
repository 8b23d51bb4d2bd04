//! High-level lookups on top of the resolver.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::debug;

use crate::cache::DnsCache;
use crate::dns::{Message, Question, RData, RecordClass, RecordType, ResponseCode};
use crate::error::{Error, Result};
use crate::nameserver::{self, NameServerAddress};
use crate::resolver::{self, MAX_HOPS, ResolverConfig};
use crate::transport::ClientOptions;

/// A resolver bound to a server list.
///
/// With no servers every lookup walks the delegation tree from the root.
#[derive(Clone)]
pub struct DnsClient {
    servers: Vec<NameServerAddress>,
    config: ResolverConfig,
}

impl DnsClient {
    pub fn new(servers: Vec<NameServerAddress>, options: ClientOptions) -> Self {
        Self::with_config(
            servers,
            ResolverConfig {
                options,
                ..ResolverConfig::default()
            },
        )
    }

    pub fn with_config(servers: Vec<NameServerAddress>, config: ResolverConfig) -> Self {
        Self { servers, config }
    }

    /// Use the name servers from `/etc/resolv.conf`.
    pub fn system(options: ClientOptions) -> Result<Self> {
        Ok(Self::new(nameserver::system_name_servers()?, options))
    }

    /// Iterative resolution from the root, backed by `cache`.
    pub fn recursive(options: ClientOptions, cache: Arc<dyn DnsCache>) -> Self {
        Self::with_config(
            Vec::new(),
            ResolverConfig {
                options,
                cache: Some(cache),
                ..ResolverConfig::default()
            },
        )
    }

    pub fn servers(&self) -> &[NameServerAddress] {
        &self.servers
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve the request's first question. The response carries the
    /// request's ID.
    pub async fn resolve(&self, request: &Message) -> Result<Message> {
        let question = request
            .question
            .first()
            .cloned()
            .ok_or_else(|| Error::malformed("request has no question"))?;

        let mut response = self.resolve_question(question).await?;
        response.header.id = request.id();
        Ok(response)
    }

    pub async fn resolve_question(&self, question: Question) -> Result<Message> {
        resolver::resolve_via_name_servers(question, &self.servers, &self.config).await
    }

    /// Addresses of `domain`, following CNAME links.
    ///
    /// Asks for AAAA when IPv6 is preferred and falls back to A if that
    /// answer is empty.
    pub async fn resolve_ip(&self, domain: &str) -> Result<Vec<IpAddr>> {
        let mut qtype = if self.config.options.prefer_ipv6 {
            RecordType::Aaaa
        } else {
            RecordType::A
        };
        let mut name = domain.trim_end_matches('.').to_string();
        let mut links = 0;

        loop {
            let response = self
                .resolve_question(Question::new(name.clone(), qtype, RecordClass::In))
                .await?;
            check_rcode(&response, &name)?;

            if response.answer.is_empty() {
                if qtype == RecordType::Aaaa {
                    qtype = RecordType::A;
                    continue;
                }
                return Ok(Vec::new());
            }

            let links_before = links;
            let mut addresses = Vec::new();
            for record in &response.answer {
                if !record.name.eq_ignore_ascii_case(&name) {
                    continue;
                }
                match &record.rdata {
                    RData::A(_) | RData::Aaaa(_) => addresses.extend(record.rdata.ip_addr()),
                    RData::Cname(target) => {
                        links += 1;
                        if links >= MAX_HOPS {
                            return Err(Error::NoAnswer(domain.to_string()));
                        }
                        name = target.trim_end_matches('.').to_string();
                    }
                    _ => {
                        return Err(Error::UnexpectedRecordType {
                            server: response.server_name(),
                            rtype: record.rtype,
                            domain: name,
                        });
                    }
                }
            }

            if !addresses.is_empty() || links == links_before {
                return Ok(addresses);
            }
            debug!(domain, target = %name, links, "following CNAME");
        }
    }

    /// Mail exchanges of `domain`, most preferred first.
    ///
    /// With `resolve_ip` each exchange is replaced by its addresses. Glue
    /// in the MX response is used when present. An exchange that does not
    /// exist or has no addresses is left out; one whose lookup failed is
    /// kept as a bare hostname.
    pub async fn resolve_mx(&self, domain: &str, resolve_ip: bool) -> Result<Vec<String>> {
        if domain.parse::<IpAddr>().is_ok() {
            return Ok(vec![domain.to_string()]);
        }

        let mut name = domain.trim_end_matches('.').to_string();
        let mut links = 0;

        let (response, mut exchanges) = loop {
            let response = self
                .resolve_question(Question::new(name.clone(), RecordType::Mx, RecordClass::In))
                .await?;
            check_rcode(&response, &name)?;

            let links_before = links;
            let mut exchanges = Vec::new();
            for record in &response.answer {
                if !record.name.eq_ignore_ascii_case(&name) {
                    continue;
                }
                match &record.rdata {
                    RData::Mx {
                        preference,
                        exchange,
                    } => exchanges.push((*preference, exchange.clone())),
                    RData::Cname(target) => {
                        links += 1;
                        if links >= MAX_HOPS {
                            return Err(Error::NoAnswer(domain.to_string()));
                        }
                        name = target.trim_end_matches('.').to_string();
                    }
                    _ => {
                        return Err(Error::UnexpectedRecordType {
                            server: response.server_name(),
                            rtype: record.rtype,
                            domain: name,
                        });
                    }
                }
            }

            if !exchanges.is_empty() || links == links_before {
                break (response, exchanges);
            }
        };

        exchanges.sort_by_key(|(preference, _)| *preference);

        if !resolve_ip {
            return Ok(exchanges.into_iter().map(|(_, exchange)| exchange).collect());
        }

        let glue_type = if self.config.options.prefer_ipv6 {
            RecordType::Aaaa
        } else {
            RecordType::A
        };

        let mut resolved = Vec::new();
        for (_, exchange) in exchanges {
            let glue: Vec<IpAddr> = response
                .additional
                .iter()
                .filter(|record| record.rtype == glue_type)
                .filter(|record| record.name.eq_ignore_ascii_case(&exchange))
                .filter_map(|record| record.rdata.ip_addr())
                .collect();
            if !glue.is_empty() {
                resolved.extend(glue.iter().map(IpAddr::to_string));
                continue;
            }

            match self.resolve_ip(&exchange).await {
                Ok(addresses) => resolved.extend(addresses.iter().map(IpAddr::to_string)),
                Err(Error::NameDoesNotExist { .. }) => {
                    debug!(%exchange, "mail exchange does not exist");
                }
                Err(e) => {
                    debug!(%exchange, error = %e, "mail exchange address lookup failed");
                    resolved.push(exchange);
                }
            }
        }

        Ok(resolved)
    }

    /// The name an address maps back to, if any.
    pub async fn resolve_ptr(&self, ip: IpAddr) -> Result<Option<String>> {
        let question = Question::ptr(ip);
        let name = question.name.clone();
        let response = self.resolve_question(question).await?;
        check_rcode(&response, &name)?;

        Ok(match response.answer.first().map(|record| &record.rdata) {
            Some(RData::Ptr(host)) => Some(host.clone()),
            _ => None,
        })
    }
}

fn check_rcode(response: &Message, domain: &str) -> Result<()> {
    match response.rcode() {
        ResponseCode::NoError => Ok(()),
        ResponseCode::NameError => Err(Error::NameDoesNotExist {
            domain: domain.to_string(),
            server: response.server_name(),
        }),
        rcode => Err(Error::ServerError(rcode)),
    }
}
