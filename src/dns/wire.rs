//! Bounds-checked wire reading and domain name encoding.

use crate::error::{Error, Result};

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;
const MAX_POINTER_JUMPS: usize = 64;

/// Cursor over a complete DNS message.
///
/// Names are read against the whole buffer so compression pointers can
/// reach back into earlier sections.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(Error::malformed(format!(
                "offset {} is past the end of a {} byte message",
                pos,
                self.buf.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        let bytes = self.buf.get(self.pos..end).ok_or_else(|| {
            Error::malformed(format!(
                "need {} bytes at offset {}, {} available",
                len,
                self.pos,
                self.remaining()
            ))
        })?;
        self.pos = end;
        Ok(bytes)
    }

    /// Read a possibly compressed domain name, without the trailing dot.
    pub fn read_name(&mut self) -> Result<String> {
        let mut labels: Vec<String> = Vec::new();
        let mut pos = self.pos;
        let mut resume_at = None;
        let mut jumps = 0;
        let mut name_len = 0;

        loop {
            let len = *self
                .buf
                .get(pos)
                .ok_or_else(|| Error::malformed(format!("name runs past end at offset {}", pos)))?
                as usize;

            match len & 0xC0 {
                0x00 if len == 0 => {
                    pos += 1;
                    break;
                }
                0x00 => {
                    let start = pos + 1;
                    let label = self.buf.get(start..start + len).ok_or_else(|| {
                        Error::malformed(format!("label runs past end at offset {}", pos))
                    })?;

                    name_len += len + 1;
                    if name_len > MAX_NAME_LEN {
                        return Err(Error::malformed("name exceeds 255 bytes"));
                    }

                    labels.push(String::from_utf8_lossy(label).into_owned());
                    pos = start + len;
                }
                0xC0 => {
                    let low = *self.buf.get(pos + 1).ok_or_else(|| {
                        Error::malformed(format!("truncated pointer at offset {}", pos))
                    })? as usize;
                    let target = ((len & 0x3F) << 8) | low;

                    // Only backward pointers are accepted.
                    if target >= pos {
                        return Err(Error::malformed(format!(
                            "forward compression pointer at offset {} to {}",
                            pos, target
                        )));
                    }
                    jumps += 1;
                    if jumps > MAX_POINTER_JUMPS {
                        return Err(Error::malformed("too many compression pointers"));
                    }

                    resume_at.get_or_insert(pos + 2);
                    pos = target;
                }
                _ => {
                    return Err(Error::malformed(format!(
                        "unsupported label type {:#04x} at offset {}",
                        len, pos
                    )));
                }
            }
        }

        self.pos = resume_at.unwrap_or(pos);
        Ok(labels.join("."))
    }
}

/// Append a domain name in uncompressed wire form.
pub(crate) fn write_name(buf: &mut Vec<u8>, name: &str) -> Result<()> {
    let name = name.trim_end_matches('.');
    let mut name_len = 1;

    for label in name.split('.').filter(|label| !label.is_empty()) {
        if label.len() > MAX_LABEL_LEN {
            return Err(Error::malformed(format!("label too long: {}", label)));
        }
        name_len += label.len() + 1;
        if name_len > MAX_NAME_LEN {
            return Err(Error::malformed(format!("name too long: {}", name)));
        }
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);

    Ok(())
}
