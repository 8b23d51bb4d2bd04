//! Descent - an iterative DNS resolver.
//!
//! Walks delegations from the root (or a configured server list) down to an
//! answer, bootstrapping name server addresses along the way.

pub mod cache;
pub mod client;
pub mod dns;
pub mod error;
pub mod nameserver;
pub mod proxy;
pub mod resolver;
pub mod stats;
pub mod transport;

pub use cache::{DnsCache, SimpleCache};
pub use client::DnsClient;
pub use dns::{Message, Question, RData, Record, RecordClass, RecordType, ResponseCode};
pub use error::{Error, Result};
pub use nameserver::NameServerAddress;
pub use resolver::{MAX_HOPS, ResolverConfig};
pub use transport::{ClientOptions, Transport};
