//! Error types shared by the codec, transport and resolvers.

use std::io;

use thiserror::Error;

use crate::dns::{RecordType, ResponseCode};
use crate::proxy::ProxyKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The bytes could not be decoded as a DNS message.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Every transport attempt for a query was exhausted.
    #[error("no response from name servers")]
    NoResponse,

    /// The queried name does not exist (NXDOMAIN).
    #[error("domain does not exist: {domain}; name server: {server}")]
    NameDoesNotExist { domain: String, server: String },

    #[error("name server [{server}] returned unexpected record type [{rtype}] for domain: {domain}")]
    UnexpectedRecordType {
        server: String,
        rtype: RecordType,
        domain: String,
    },

    /// Bootstrapping name server addresses nested deeper than allowed.
    #[error("exceeded the maximum stack count to resolve the domain: {0}")]
    BootstrapDepthExceeded(String),

    #[error("proxy type not supported: {0}")]
    ProxyUnsupported(ProxyKind),

    #[error("name server returned error: {0}")]
    ServerError(ResponseCode),

    /// Following CNAME links did not reach an answer within the hop limit.
    #[error("no answer received from name server for domain: {0}")]
    NoAnswer(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage(message.into())
    }
}
