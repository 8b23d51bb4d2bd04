//! Iterative resolution from configured servers or the root.

mod iterative;

use std::sync::Arc;

use crate::cache::DnsCache;
use crate::dns::{Message, Question};
use crate::error::Result;
use crate::nameserver::{DNS_PORT, NameServerAddress};
use crate::transport::ClientOptions;

/// Upper bound on delegation descents and CNAME links.
pub const MAX_HOPS: usize = 16;

#[derive(Clone)]
pub struct ResolverConfig {
    pub options: ClientOptions,
    pub cache: Option<Arc<dyn DnsCache>>,
    /// Deepest nesting of name server bootstraps before giving up.
    pub max_stack_count: usize,
    /// Fall back to the root servers whenever no candidate list is set.
    pub use_root_servers: bool,
    /// Port assumed for servers learned from referrals.
    pub name_server_port: u16,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            options: ClientOptions::default(),
            cache: None,
            max_stack_count: 10,
            use_root_servers: true,
            name_server_port: DNS_PORT,
        }
    }
}

/// Resolve `question` starting from `name_servers`, or from the root set
/// when the list is empty.
pub async fn resolve_via_name_servers(
    question: Question,
    name_servers: &[NameServerAddress],
    config: &ResolverConfig,
) -> Result<Message> {
    iterative::resolve(question, name_servers.to_vec(), config).await
}

pub async fn resolve_via_root_name_servers(
    question: Question,
    config: &ResolverConfig,
) -> Result<Message> {
    iterative::resolve(question, Vec::new(), config).await
}
