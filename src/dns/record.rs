//! Questions, resource records and the record payloads the resolver inspects.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use super::wire::{Reader, write_name};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Ns,
    Cname,
    Soa,
    Ptr,
    Mx,
    Txt,
    Aaaa,
    Srv,
    Any,
    Unknown(u16),
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => Self::A,
            2 => Self::Ns,
            5 => Self::Cname,
            6 => Self::Soa,
            12 => Self::Ptr,
            15 => Self::Mx,
            16 => Self::Txt,
            28 => Self::Aaaa,
            33 => Self::Srv,
            255 => Self::Any,
            other => Self::Unknown(other),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(rtype: RecordType) -> Self {
        match rtype {
            RecordType::A => 1,
            RecordType::Ns => 2,
            RecordType::Cname => 5,
            RecordType::Soa => 6,
            RecordType::Ptr => 12,
            RecordType::Mx => 15,
            RecordType::Txt => 16,
            RecordType::Aaaa => 28,
            RecordType::Srv => 33,
            RecordType::Any => 255,
            RecordType::Unknown(value) => value,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::A => "A",
            Self::Ns => "NS",
            Self::Cname => "CNAME",
            Self::Soa => "SOA",
            Self::Ptr => "PTR",
            Self::Mx => "MX",
            Self::Txt => "TXT",
            Self::Aaaa => "AAAA",
            Self::Srv => "SRV",
            Self::Any => "ANY",
            Self::Unknown(value) => return write!(f, "TYPE{}", value),
        };
        f.write_str(name)
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let rtype = match upper.as_str() {
            "A" => Self::A,
            "NS" => Self::Ns,
            "CNAME" => Self::Cname,
            "SOA" => Self::Soa,
            "PTR" => Self::Ptr,
            "MX" => Self::Mx,
            "TXT" => Self::Txt,
            "AAAA" => Self::Aaaa,
            "SRV" => Self::Srv,
            "ANY" => Self::Any,
            other => {
                let value = other
                    .strip_prefix("TYPE")
                    .and_then(|n| n.parse::<u16>().ok())
                    .ok_or_else(|| format!("unknown record type: {}", s))?;
                Self::from(value)
            }
        };
        Ok(rtype)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordClass {
    In,
    Ch,
    Hs,
    Any,
    Unknown(u16),
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value {
            1 => Self::In,
            3 => Self::Ch,
            4 => Self::Hs,
            255 => Self::Any,
            other => Self::Unknown(other),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(class: RecordClass) -> Self {
        match class {
            RecordClass::In => 1,
            RecordClass::Ch => 3,
            RecordClass::Hs => 4,
            RecordClass::Any => 255,
            RecordClass::Unknown(value) => value,
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => f.write_str("IN"),
            Self::Ch => f.write_str("CH"),
            Self::Hs => f.write_str("HS"),
            Self::Any => f.write_str("ANY"),
            Self::Unknown(value) => write!(f, "CLASS{}", value),
        }
    }
}

/// A question section entry. Names compare case-insensitively.
#[derive(Debug, Clone, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: RecordType,
    pub qclass: RecordClass,
}

impl Question {
    pub fn new(name: impl Into<String>, qtype: RecordType, qclass: RecordClass) -> Self {
        let mut name = name.into();
        if name.ends_with('.') {
            name.pop();
        }
        Self { name, qtype, qclass }
    }

    /// Reverse lookup question for an address (`in-addr.arpa` / `ip6.arpa`).
    pub fn ptr(ip: IpAddr) -> Self {
        let name = match ip {
            IpAddr::V4(v4) => {
                let [a, b, c, d] = v4.octets();
                format!("{}.{}.{}.{}.in-addr.arpa", d, c, b, a)
            }
            IpAddr::V6(v6) => {
                let mut labels = Vec::with_capacity(33);
                for byte in v6.octets().iter().rev() {
                    labels.push(format!("{:x}", byte & 0x0F));
                    labels.push(format!("{:x}", byte >> 4));
                }
                labels.push("ip6.arpa".to_string());
                labels.join(".")
            }
        };
        Self::new(name, RecordType::Ptr, RecordClass::In)
    }

    /// Same name and class, different type.
    pub fn with_type(&self, qtype: RecordType) -> Self {
        Self {
            name: self.name.clone(),
            qtype,
            qclass: self.qclass,
        }
    }

    pub(crate) fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        write_name(buf, &self.name)?;
        buf.extend_from_slice(&u16::from(self.qtype).to_be_bytes());
        buf.extend_from_slice(&u16::from(self.qclass).to_be_bytes());
        Ok(())
    }

    pub(crate) fn read_from(reader: &mut Reader<'_>) -> Result<Self> {
        let name = reader.read_name()?;
        let qtype = RecordType::from(reader.read_u16()?);
        let qclass = RecordClass::from(reader.read_u16()?);
        Ok(Self { name, qtype, qclass })
    }
}

impl PartialEq for Question {
    fn eq(&self, other: &Self) -> bool {
        self.qtype == other.qtype
            && self.qclass == other.qclass
            && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {} {}", self.name, self.qclass, self.qtype)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Soa {
    pub mname: String,
    pub rname: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

/// Record payload. Types the resolver does not interpret stay opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ns(String),
    Cname(String),
    Ptr(String),
    Mx { preference: u16, exchange: String },
    Soa(Soa),
    Unknown(Vec<u8>),
}

impl RData {
    /// The address carried by an A or AAAA payload.
    pub fn ip_addr(&self) -> Option<IpAddr> {
        match self {
            Self::A(v4) => Some(IpAddr::V4(*v4)),
            Self::Aaaa(v6) => Some(IpAddr::V6(*v6)),
            _ => None,
        }
    }

    fn read_from(reader: &mut Reader<'_>, rtype: RecordType, len: usize) -> Result<Self> {
        let rdata = match rtype {
            RecordType::A if len == 4 => {
                let b = reader.read_bytes(4)?;
                Self::A(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
            }
            RecordType::Aaaa if len == 16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(reader.read_bytes(16)?);
                Self::Aaaa(Ipv6Addr::from(octets))
            }
            RecordType::A | RecordType::Aaaa => {
                return Err(Error::malformed(format!(
                    "{} record with {} byte payload",
                    rtype, len
                )));
            }
            RecordType::Ns => Self::Ns(reader.read_name()?),
            RecordType::Cname => Self::Cname(reader.read_name()?),
            RecordType::Ptr => Self::Ptr(reader.read_name()?),
            RecordType::Mx => Self::Mx {
                preference: reader.read_u16()?,
                exchange: reader.read_name()?,
            },
            RecordType::Soa => Self::Soa(Soa {
                mname: reader.read_name()?,
                rname: reader.read_name()?,
                serial: reader.read_u32()?,
                refresh: reader.read_u32()?,
                retry: reader.read_u32()?,
                expire: reader.read_u32()?,
                minimum: reader.read_u32()?,
            }),
            _ => Self::Unknown(reader.read_bytes(len)?.to_vec()),
        };
        Ok(rdata)
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::A(v4) => buf.extend_from_slice(&v4.octets()),
            Self::Aaaa(v6) => buf.extend_from_slice(&v6.octets()),
            Self::Ns(name) | Self::Cname(name) | Self::Ptr(name) => write_name(buf, name)?,
            Self::Mx {
                preference,
                exchange,
            } => {
                buf.extend_from_slice(&preference.to_be_bytes());
                write_name(buf, exchange)?;
            }
            Self::Soa(soa) => {
                write_name(buf, &soa.mname)?;
                write_name(buf, &soa.rname)?;
                for value in [soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum] {
                    buf.extend_from_slice(&value.to_be_bytes());
                }
            }
            Self::Unknown(bytes) => buf.extend_from_slice(bytes),
        }
        Ok(())
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A(v4) => write!(f, "{}", v4),
            Self::Aaaa(v6) => write!(f, "{}", v6),
            Self::Ns(name) | Self::Cname(name) | Self::Ptr(name) => write!(f, "{}.", name),
            Self::Mx {
                preference,
                exchange,
            } => write!(f, "{} {}.", preference, exchange),
            Self::Soa(soa) => write!(
                f,
                "{}. {}. {} {} {} {} {}",
                soa.mname, soa.rname, soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum
            ),
            Self::Unknown(bytes) => {
                write!(f, "\\# {}", bytes.len())?;
                for byte in bytes {
                    write!(f, " {:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// A resource record from the answer, authority or additional section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub rtype: RecordType,
    pub class: RecordClass,
    pub ttl: u32,
    pub rdata: RData,
}

impl Record {
    /// A record whose type follows from `rdata`.
    ///
    /// An opaque [`RData::Unknown`] payload has no type of its own and is
    /// written as type 0; build those with [`Record::with_type`].
    pub fn new(name: impl Into<String>, ttl: u32, rdata: RData) -> Self {
        let rtype = match &rdata {
            RData::A(_) => RecordType::A,
            RData::Aaaa(_) => RecordType::Aaaa,
            RData::Ns(_) => RecordType::Ns,
            RData::Cname(_) => RecordType::Cname,
            RData::Ptr(_) => RecordType::Ptr,
            RData::Mx { .. } => RecordType::Mx,
            RData::Soa(_) => RecordType::Soa,
            RData::Unknown(_) => RecordType::Unknown(0),
        };
        Self::with_type(name, rtype, ttl, rdata)
    }

    pub fn with_type(name: impl Into<String>, rtype: RecordType, ttl: u32, rdata: RData) -> Self {
        let mut name = name.into();
        if name.ends_with('.') {
            name.pop();
        }
        Self {
            name,
            rtype,
            class: RecordClass::In,
            ttl,
            rdata,
        }
    }

    pub(crate) fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        write_name(buf, &self.name)?;
        buf.extend_from_slice(&u16::from(self.rtype).to_be_bytes());
        buf.extend_from_slice(&u16::from(self.class).to_be_bytes());
        buf.extend_from_slice(&self.ttl.to_be_bytes());

        let mut rdata = Vec::with_capacity(16);
        self.rdata.write_to(&mut rdata)?;
        let len = u16::try_from(rdata.len())
            .map_err(|_| Error::malformed(format!("record data too long: {} bytes", rdata.len())))?;
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&rdata);
        Ok(())
    }

    pub(crate) fn read_from(reader: &mut Reader<'_>) -> Result<Self> {
        let name = reader.read_name()?;
        let rtype = RecordType::from(reader.read_u16()?);
        let class = RecordClass::from(reader.read_u16()?);
        let ttl = reader.read_u32()?;
        let len = reader.read_u16()? as usize;

        let start = reader.position();
        if reader.remaining() < len {
            return Err(Error::malformed(format!(
                "{} record for {} claims {} bytes, {} available",
                rtype,
                name,
                len,
                reader.remaining()
            )));
        }
        let rdata = RData::read_from(reader, rtype, len)?;
        if reader.position() > start + len {
            return Err(Error::malformed(format!(
                "{} record for {} overruns its {} byte payload",
                rtype, name, len
            )));
        }
        reader.seek(start + len)?;

        Ok(Self {
            name,
            rtype,
            class,
            ttl,
            rdata,
        })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.\t{}\t{}\t{}\t{}",
            self.name, self.ttl, self.class, self.rtype, self.rdata
        )
    }
}
