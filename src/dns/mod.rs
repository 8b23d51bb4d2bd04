//! DNS message parsing and construction.

mod header;
mod record;
mod wire;

pub use header::{HEADER_LEN, Header, Opcode, ResponseCode, random_id};
pub use record::{Question, RData, Record, RecordClass, RecordType, Soa};

use std::time::Duration;

use crate::error::{Error, Result};
use crate::nameserver::NameServerAddress;
use crate::transport::Protocol;
use wire::Reader;

/// Where a decoded response came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub server: NameServerAddress,
    pub protocol: Protocol,
    pub rtt: Duration,
}

/// A complete DNS message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: Header,
    pub question: Vec<Question>,
    pub answer: Vec<Record>,
    pub authority: Vec<Record>,
    pub additional: Vec<Record>,
    /// Set by the transport on responses read from a socket.
    pub origin: Option<Origin>,
}

impl Message {
    /// A standard recursive query for one question, with a random ID.
    pub fn request(question: Question) -> Self {
        Self {
            header: Header::query(0),
            question: vec![question],
            answer: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
            origin: None,
        }
    }

    /// An empty NoError response echoing the request's ID and question.
    pub fn response_to(request: &Message) -> Self {
        let mut header = request.header.clone();
        header.is_response = true;
        header.recursion_available = true;
        header.rcode = ResponseCode::NoError;
        header.an_count = 0;
        header.ns_count = 0;
        header.ar_count = 0;

        Self {
            header,
            question: request.question.clone(),
            answer: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
            origin: None,
        }
    }

    pub fn id(&self) -> u16 {
        self.header.id
    }

    pub fn rcode(&self) -> ResponseCode {
        self.header.rcode
    }

    pub fn is_truncated(&self) -> bool {
        self.header.truncation
    }

    /// Display name of the server that produced this message.
    pub fn server_name(&self) -> String {
        match &self.origin {
            Some(origin) => origin.server.to_string(),
            None => "cache".to_string(),
        }
    }

    /// Encode to wire format. Section counts are taken from the sections.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut header = self.header.clone();
        header.qd_count = section_len(self.question.len())?;
        header.an_count = section_len(self.answer.len())?;
        header.ns_count = section_len(self.authority.len())?;
        header.ar_count = section_len(self.additional.len())?;

        let mut buf = Vec::with_capacity(512);
        header.write_to(&mut buf);

        for question in &self.question {
            question.write_to(&mut buf)?;
        }
        for record in self
            .answer
            .iter()
            .chain(&self.authority)
            .chain(&self.additional)
        {
            record.write_to(&mut buf)?;
        }

        Ok(buf)
    }

    /// Decode a message; every section must fit within `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        let header = Header::read_from(&mut reader)?;

        let question = (0..header.qd_count)
            .map(|_| Question::read_from(&mut reader))
            .collect::<Result<Vec<_>>>()?;
        let answer = read_records(&mut reader, header.an_count)?;
        let authority = read_records(&mut reader, header.ns_count)?;
        let additional = read_records(&mut reader, header.ar_count)?;

        Ok(Self {
            header,
            question,
            answer,
            authority,
            additional,
            origin: None,
        })
    }
}

fn read_records(reader: &mut Reader<'_>, count: u16) -> Result<Vec<Record>> {
    (0..count).map(|_| Record::read_from(reader)).collect()
}

fn section_len(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::malformed(format!("section holds {} records", len)))
}
