//! DNS response cache with TTL-based expiration.

use rustc_hash::FxHashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::dns::{Message, Question, ResponseCode};

/// Storage for responses consulted before any network exchange.
///
/// Implementations must be shareable across concurrent resolutions.
pub trait DnsCache: Send + Sync {
    /// A stored response for the request's first question, if any.
    fn query(&self, request: &Message) -> Option<Message>;

    /// Store a response under its first question.
    fn cache_response(&self, response: &Message);
}

struct CacheEntry {
    response: Message,
    expires_at: Instant,
}

/// TTL-based in-memory cache.
///
/// Uses a 2-level map (qtype -> lowercased name -> entry). Only NoError and
/// NameError responses are kept.
pub struct SimpleCache {
    entries: RwLock<FxHashMap<u16, FxHashMap<String, CacheEntry>>>,
    min_ttl: Duration,
    max_ttl: Duration,
}

impl SimpleCache {
    pub fn new() -> Self {
        Self::with_ttl_bounds(Duration::from_secs(60), Duration::from_secs(86400))
    }

    pub fn with_ttl_bounds(min_ttl: Duration, max_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            min_ttl,
            max_ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|e| e.values().map(|inner| inner.len()).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ttl_of(&self, response: &Message) -> Duration {
        let ttl = response
            .answer
            .iter()
            .chain(&response.authority)
            .chain(&response.additional)
            .map(|record| Duration::from_secs(u64::from(record.ttl)))
            .min()
            .unwrap_or(self.min_ttl);
        ttl.clamp(self.min_ttl, self.max_ttl)
    }
}

fn key(question: &Question) -> (u16, String) {
    (u16::from(question.qtype), question.name.to_ascii_lowercase())
}

impl DnsCache for SimpleCache {
    fn query(&self, request: &Message) -> Option<Message> {
        let question = request.question.first()?;
        let (qtype, name) = key(question);
        let now = Instant::now();

        {
            let entries = self.entries.read().ok()?;
            if let Some(entry) = entries.get(&qtype).and_then(|inner| inner.get(&name)) {
                if now < entry.expires_at {
                    let mut response = entry.response.clone();
                    response.header.id = request.id();
                    response.origin = None;
                    return Some(response);
                }
            }
        }

        let mut entries = self.entries.write().ok()?;
        if let Some(inner) = entries.get_mut(&qtype) {
            if inner.get(&name).is_some_and(|entry| now >= entry.expires_at) {
                inner.remove(&name);
            }
        }
        None
    }

    fn cache_response(&self, response: &Message) {
        if !matches!(
            response.rcode(),
            ResponseCode::NoError | ResponseCode::NameError
        ) {
            return;
        }
        let Some(question) = response.question.first() else {
            return;
        };

        let ttl = self.ttl_of(response);
        let (qtype, name) = key(question);

        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        entries.entry(qtype).or_default().insert(
            name,
            CacheEntry {
                response: response.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

impl Default for SimpleCache {
    fn default() -> Self {
        Self::new()
    }
}
