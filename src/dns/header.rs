//! The fixed 12-byte DNS message header.

use std::fmt;

use super::wire::Reader;
use crate::error::Result;

pub const HEADER_LEN: usize = 12;

/// DNS operation code (4 bits on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Query,
    InverseQuery,
    Status,
    Notify,
    Update,
    Unknown(u8),
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Query,
            1 => Self::InverseQuery,
            2 => Self::Status,
            4 => Self::Notify,
            5 => Self::Update,
            other => Self::Unknown(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> Self {
        match opcode {
            Opcode::Query => 0,
            Opcode::InverseQuery => 1,
            Opcode::Status => 2,
            Opcode::Notify => 4,
            Opcode::Update => 5,
            Opcode::Unknown(value) => value,
        }
    }
}

/// Response code carried in the low 4 bits of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    YxDomain,
    YxRrSet,
    NxRrSet,
    NotAuthorized,
    NotZone,
    Unknown(u8),
}

impl From<u8> for ResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::FormatError,
            2 => Self::ServerFailure,
            3 => Self::NameError,
            4 => Self::NotImplemented,
            5 => Self::Refused,
            6 => Self::YxDomain,
            7 => Self::YxRrSet,
            8 => Self::NxRrSet,
            9 => Self::NotAuthorized,
            10 => Self::NotZone,
            other => Self::Unknown(other),
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(rcode: ResponseCode) -> Self {
        match rcode {
            ResponseCode::NoError => 0,
            ResponseCode::FormatError => 1,
            ResponseCode::ServerFailure => 2,
            ResponseCode::NameError => 3,
            ResponseCode::NotImplemented => 4,
            ResponseCode::Refused => 5,
            ResponseCode::YxDomain => 6,
            ResponseCode::YxRrSet => 7,
            ResponseCode::NxRrSet => 8,
            ResponseCode::NotAuthorized => 9,
            ResponseCode::NotZone => 10,
            ResponseCode::Unknown(value) => value,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(value) => write!(f, "RCODE{} ({})", value, value),
            other => write!(f, "{:?} ({})", other, u8::from(*other)),
        }
    }
}

/// DNS message header.
///
/// ```text
/// ID(16) | QR OPCODE(4) AA TC RD | RA Z AD CD RCODE(4) | QDCOUNT | ANCOUNT | NSCOUNT | ARCOUNT
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub is_response: bool,
    pub opcode: Opcode,
    pub authoritative_answer: bool,
    pub truncation: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub z: bool,
    pub authentic_data: bool,
    pub checking_disabled: bool,
    pub rcode: ResponseCode,
    pub qd_count: u16,
    pub an_count: u16,
    pub ns_count: u16,
    pub ar_count: u16,
}

impl Header {
    /// Standard recursive query header with one question.
    ///
    /// An `id` of zero is replaced by a random non-zero identifier.
    pub fn query(id: u16) -> Self {
        Self {
            id: if id == 0 { random_id() } else { id },
            is_response: false,
            opcode: Opcode::Query,
            authoritative_answer: false,
            truncation: false,
            recursion_desired: true,
            recursion_available: false,
            z: false,
            authentic_data: false,
            checking_disabled: false,
            rcode: ResponseCode::NoError,
            qd_count: 1,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        }
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        let opcode = u8::from(self.opcode) & 0x0F;
        let rcode = u8::from(self.rcode) & 0x0F;

        let high = ((self.is_response as u8) << 7)
            | (opcode << 3)
            | ((self.authoritative_answer as u8) << 2)
            | ((self.truncation as u8) << 1)
            | (self.recursion_desired as u8);
        let low = ((self.recursion_available as u8) << 7)
            | ((self.z as u8) << 6)
            | ((self.authentic_data as u8) << 5)
            | ((self.checking_disabled as u8) << 4)
            | rcode;

        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.push(high);
        buf.push(low);
        buf.extend_from_slice(&self.qd_count.to_be_bytes());
        buf.extend_from_slice(&self.an_count.to_be_bytes());
        buf.extend_from_slice(&self.ns_count.to_be_bytes());
        buf.extend_from_slice(&self.ar_count.to_be_bytes());
    }

    pub(crate) fn read_from(reader: &mut Reader<'_>) -> Result<Self> {
        if reader.remaining() < HEADER_LEN {
            return Err(crate::Error::malformed(format!(
                "header needs {} bytes, got {}",
                HEADER_LEN,
                reader.remaining()
            )));
        }

        let id = reader.read_u16()?;
        let high = reader.read_u8()?;
        let low = reader.read_u8()?;

        Ok(Self {
            id,
            is_response: high & 0x80 != 0,
            opcode: Opcode::from((high & 0x78) >> 3),
            authoritative_answer: high & 0x04 != 0,
            truncation: high & 0x02 != 0,
            recursion_desired: high & 0x01 != 0,
            recursion_available: low & 0x80 != 0,
            z: low & 0x40 != 0,
            authentic_data: low & 0x20 != 0,
            checking_disabled: low & 0x10 != 0,
            rcode: ResponseCode::from(low & 0x0F),
            qd_count: reader.read_u16()?,
            an_count: reader.read_u16()?,
            ns_count: reader.read_u16()?,
            ar_count: reader.read_u16()?,
        })
    }
}

/// Random transaction identifier, never zero.
pub fn random_id() -> u16 {
    loop {
        let id: u16 = rand::random();
        if id != 0 {
            return id;
        }
    }
}
