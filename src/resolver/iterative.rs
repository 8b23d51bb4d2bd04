//! The delegation walk.
//!
//! Resolving a name server's hostname can itself require a full walk from
//! the root. Those nested lookups are kept on an explicit stack of frames
//! so their depth stays bounded by `max_stack_count`.

use std::mem;
use std::net::IpAddr;

use tracing::{debug, trace, warn};

use super::{MAX_HOPS, ResolverConfig};
use crate::dns::{Message, Question, RecordClass, RecordType, ResponseCode};
use crate::error::{Error, Result};
use crate::nameserver::{self, NameServerAddress};
use crate::transport::Transport;

/// A suspended walk waiting on the address of `name_servers[index]`.
struct Frame {
    question: Question,
    name_servers: Vec<NameServerAddress>,
    index: usize,
    hops: usize,
}

/// How a suspended walk continues once its bootstrap lookup finishes.
enum Resume {
    /// Install the address on the pending server and query it.
    Install(IpAddr),
    /// Move past the pending server.
    Skip,
}

enum State {
    ProbeCache,
    SelectServers,
    QueryServer,
    Pop(Resume),
    Return(Message),
}

struct Walk<'a> {
    config: &'a ResolverConfig,
    question: Question,
    name_servers: Vec<NameServerAddress>,
    index: usize,
    hops: usize,
    stack: Vec<Frame>,
}

pub(super) async fn resolve(
    question: Question,
    name_servers: Vec<NameServerAddress>,
    config: &ResolverConfig,
) -> Result<Message> {
    let mut walk = Walk {
        config,
        question,
        name_servers,
        index: 0,
        hops: 0,
        stack: Vec::new(),
    };

    let mut state = State::ProbeCache;
    loop {
        state = match state {
            State::ProbeCache => walk.probe_cache()?,
            State::SelectServers => walk.select_servers()?,
            State::QueryServer => walk.query_servers().await?,
            State::Pop(resume) => walk.pop(resume),
            State::Return(response) => return Ok(response),
        };
    }
}

impl Walk<'_> {
    fn prefer_ipv6(&self) -> bool {
        self.config.options.prefer_ipv6
    }

    fn probe_cache(&mut self) -> Result<State> {
        if self.stack.len() > self.config.max_stack_count {
            let origin = self
                .stack
                .first()
                .map_or_else(
                    || self.question.name.clone(),
                    |frame| frame.question.name.clone(),
                );
            warn!(question = %origin, depth = self.stack.len(), "bootstrap depth exceeded");
            return Err(Error::BootstrapDepthExceeded(origin));
        }

        let Some(cache) = &self.config.cache else {
            return Ok(State::SelectServers);
        };
        let Some(cached) = cache.query(&Message::request(self.question.clone())) else {
            return Ok(State::SelectServers);
        };

        trace!(question = %self.question, rcode = %cached.rcode(), "cache hit");
        self.config.options.stats.record_cache_hit();

        let state = match cached.rcode() {
            ResponseCode::NoError if !cached.answer.is_empty() => self.answered(cached),
            ResponseCode::NoError => match cached.authority.first().map(|record| record.rtype) {
                Some(RecordType::Soa) => self.negative(cached),
                Some(RecordType::Ns) if self.name_servers.is_empty() => {
                    let servers = self.referred_servers(&cached, true);
                    if !servers.is_empty() {
                        debug!(
                            question = %self.question,
                            servers = servers.len(),
                            "using cached delegation"
                        );
                        self.adopt(servers);
                    }
                    State::SelectServers
                }
                _ => State::SelectServers,
            },
            ResponseCode::NameError => self.name_error(cached),
            _ => State::SelectServers,
        };
        Ok(state)
    }

    fn select_servers(&mut self) -> Result<State> {
        if !self.name_servers.is_empty() {
            return Ok(State::QueryServer);
        }
        if !self.config.use_root_servers {
            return if self.stack.is_empty() {
                Err(Error::NoResponse)
            } else {
                Ok(State::Pop(Resume::Skip))
            };
        }

        self.adopt(nameserver::root_name_servers(self.prefer_ipv6()));
        Ok(State::QueryServer)
    }

    async fn query_servers(&mut self) -> Result<State> {
        while self.index < self.name_servers.len() {
            let server = &self.name_servers[self.index];

            if !server.host().is_empty()
                && server.host().eq_ignore_ascii_case(&self.question.name)
            {
                trace!(server = %server, "skipping server named by the question");
                self.index += 1;
                continue;
            }

            if server.endpoint().is_none() {
                let qtype = if self.prefer_ipv6() {
                    RecordType::Aaaa
                } else {
                    RecordType::A
                };
                let bootstrap = Question::new(server.host(), qtype, RecordClass::In);
                debug!(
                    host = server.host(),
                    depth = self.stack.len() + 1,
                    "bootstrapping name server address"
                );
                self.push(bootstrap);
                return Ok(State::ProbeCache);
            }

            let server = server.clone();
            let request = Message::request(self.question.clone());
            let transport = Transport::single(server.clone(), self.config.options.clone());

            let response = match transport.exchange(&request).await {
                Ok(response) => response,
                Err(e @ Error::ProxyUnsupported(_)) => return Err(e),
                Err(e) => {
                    debug!(
                        server = %server,
                        question = %self.question,
                        error = %e,
                        "name server failed"
                    );
                    self.index += 1;
                    continue;
                }
            };

            let foreign_owner = response
                .answer
                .first()
                .filter(|record| !record.name.eq_ignore_ascii_case(&self.question.name))
                .map(|record| record.name.clone());
            if let Some(owner) = foreign_owner {
                debug!(
                    server = %server,
                    %owner,
                    question = %self.question,
                    "answer for a different name"
                );
                self.index += 1;
                continue;
            }

            if let Some(cache) = &self.config.cache {
                cache.cache_response(&response);
            }

            match response.rcode() {
                ResponseCode::NoError if !response.answer.is_empty() => {
                    return Ok(self.answered(response));
                }
                ResponseCode::NoError => match response.authority.first().map(|r| r.rtype) {
                    None => {
                        debug!(server = %server, question = %self.question, "empty response");
                        self.index += 1;
                    }
                    Some(RecordType::Soa) => return Ok(self.negative(response)),
                    Some(_) => {
                        let servers = self.referred_servers(&response, false);
                        if servers.is_empty() {
                            debug!(
                                server = %server,
                                question = %self.question,
                                "referral without name servers"
                            );
                            self.index += 1;
                            continue;
                        }
                        if self.hops >= MAX_HOPS {
                            warn!(
                                question = %self.question,
                                hops = self.hops,
                                "delegation hop limit reached"
                            );
                            break;
                        }

                        debug!(
                            zone = %response.authority[0].name,
                            servers = servers.len(),
                            hops = self.hops + 1,
                            "following delegation"
                        );
                        self.adopt(servers);
                        self.hops += 1;
                    }
                },
                ResponseCode::NameError => return Ok(self.name_error(response)),
                rcode => {
                    debug!(
                        server = %server,
                        %rcode,
                        question = %self.question,
                        "name server returned an error"
                    );
                    self.index += 1;
                }
            }
        }

        if self.stack.is_empty() {
            Err(Error::NoResponse)
        } else {
            Ok(State::Pop(Resume::Skip))
        }
    }

    /// Suspend the current walk and start a lookup for `bootstrap`.
    fn push(&mut self, bootstrap: Question) {
        self.stack.push(Frame {
            question: mem::replace(&mut self.question, bootstrap),
            name_servers: mem::take(&mut self.name_servers),
            index: self.index,
            hops: self.hops,
        });
        self.index = 0;
        self.hops = 0;
    }

    fn pop(&mut self, resume: Resume) -> State {
        if let Some(frame) = self.stack.pop() {
            self.question = frame.question;
            self.name_servers = frame.name_servers;
            self.hops = frame.hops;

            match resume {
                Resume::Install(ip) => {
                    if let Some(server) = self.name_servers.get_mut(frame.index) {
                        debug!(host = server.host(), %ip, "installing bootstrapped address");
                        server.set_address(ip);
                    }
                    self.index = frame.index;
                }
                Resume::Skip => self.index = frame.index + 1,
            }
        }
        State::QueryServer
    }

    fn referred_servers(&self, response: &Message, glue_only: bool) -> Vec<NameServerAddress> {
        NameServerAddress::from_response(response, self.prefer_ipv6(), glue_only)
            .into_iter()
            .map(|server| server.with_port(self.config.name_server_port))
            .collect()
    }

    fn adopt(&mut self, mut servers: Vec<NameServerAddress>) {
        nameserver::shuffle(&mut servers);
        self.name_servers = servers;
        self.index = 0;
    }

    fn answered(&self, response: Message) -> State {
        if self.stack.is_empty() {
            return State::Return(response);
        }
        match response.answer.first().and_then(|record| record.rdata.ip_addr()) {
            Some(ip) => State::Pop(Resume::Install(ip)),
            None => State::Pop(Resume::Skip),
        }
    }

    /// An SOA-only answer. A failed AAAA bootstrap is retried as A.
    fn negative(&mut self, response: Message) -> State {
        if self.stack.is_empty() {
            return State::Return(response);
        }
        if self.question.qtype == RecordType::Aaaa {
            self.question = self.question.with_type(RecordType::A);
            self.index = 0;
            return State::ProbeCache;
        }
        State::Pop(Resume::Skip)
    }

    fn name_error(&self, response: Message) -> State {
        if self.stack.is_empty() {
            State::Return(response)
        } else {
            State::Pop(Resume::Skip)
        }
    }
}
