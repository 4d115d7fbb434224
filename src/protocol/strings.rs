//! Per-connection string interning
//!
//! Frequently repeated strings (message kinds, player names) are replaced by
//! 16-bit ids after the peer has been told the mapping in-band.
//!
//! ## Encoding
//! ```text
//! 0x00 │ len (2) │ utf8        literal
//! 0x01 │ id (2)  │ len (2) │ utf8   define id, then use it
//! 0x02 │ id (2)                     reference to a defined id
//! ```
//!
//! Both sides must see the strings in the same order, so a `StringMap` is only
//! ever written by the worker currently draining its connection's queue.

use std::collections::HashMap;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{RelayError, Result};

pub const STRING_LITERAL: u8 = 0x00;
pub const STRING_DEFINE: u8 = 0x01;
pub const STRING_REF: u8 = 0x02;

/// Writer side of the string table
#[derive(Debug)]
pub struct StringMap {
    ids: HashMap<String, u16>,
    counts: HashMap<String, u32>,
    capacity: usize,
    promote_after: u32,
}

impl StringMap {
    pub fn new(capacity: usize, promote_after: u32) -> Self {
        Self {
            ids: HashMap::new(),
            counts: HashMap::new(),
            capacity: capacity.min(u16::MAX as usize),
            promote_after: promote_after.max(1),
        }
    }

    /// A map that never interns; output decodes without prior state.
    pub fn disabled() -> Self {
        Self::new(0, 1)
    }

    /// Number of interned strings
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id_of(&self, s: &str) -> Option<u16> {
        self.ids.get(s).copied()
    }

    /// Encode `s` into `out`, interning it once it is seen often enough.
    pub fn write(&mut self, s: &str, out: &mut BytesMut) -> Result<()> {
        if let Some(&id) = self.ids.get(s) {
            out.put_u8(STRING_REF);
            out.put_u16_le(id);
            return Ok(());
        }

        let len = string_len(s)?;

        if self.ids.len() < self.capacity {
            let room = self.counts.len() < self.capacity;
            let seen = match self.counts.get_mut(s) {
                Some(count) => {
                    *count += 1;
                    *count
                }
                None if room => {
                    self.counts.insert(s.to_string(), 1);
                    1
                }
                None => 0,
            };

            if seen >= self.promote_after {
                let id = self.ids.len() as u16;
                self.counts.remove(s);
                self.ids.insert(s.to_string(), id);

                out.put_u8(STRING_DEFINE);
                out.put_u16_le(id);
                out.put_u16_le(len);
                out.put_slice(s.as_bytes());
                return Ok(());
            }
        }

        out.put_u8(STRING_LITERAL);
        out.put_u16_le(len);
        out.put_slice(s.as_bytes());
        Ok(())
    }
}

/// Reader side of the string table
#[derive(Debug, Default)]
pub struct StringLookup {
    strings: HashMap<u16, String>,
}

impl StringLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Decode one string, recording definitions
    pub fn read(&mut self, buf: &mut &[u8]) -> Result<String> {
        let marker = take_u8(buf)?;
        match marker {
            STRING_LITERAL => take_utf8(buf),
            STRING_DEFINE => {
                let id = take_u16(buf)?;
                let s = take_utf8(buf)?;
                self.strings.insert(id, s.clone());
                Ok(s)
            }
            STRING_REF => {
                let id = take_u16(buf)?;
                self.strings
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| RelayError::Codec(format!("Unknown string id {}", id)))
            }
            other => Err(RelayError::Codec(format!(
                "Unknown string marker: 0x{:02x}",
                other
            ))),
        }
    }
}

fn string_len(s: &str) -> Result<u16> {
    u16::try_from(s.len()).map_err(|_| {
        RelayError::Codec(format!("String too long: {} bytes", s.len()))
    })
}

pub(crate) fn take_u8(buf: &mut &[u8]) -> Result<u8> {
    if buf.remaining() < 1 {
        return Err(RelayError::Codec("Unexpected end of packet".to_string()));
    }
    Ok(buf.get_u8())
}

pub(crate) fn take_u16(buf: &mut &[u8]) -> Result<u16> {
    if buf.remaining() < 2 {
        return Err(RelayError::Codec("Unexpected end of packet".to_string()));
    }
    Ok(buf.get_u16_le())
}

pub(crate) fn take_slice<'a>(buf: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if buf.len() < len {
        return Err(RelayError::Codec(format!(
            "Truncated field: expected {} bytes, got {}",
            len,
            buf.len()
        )));
    }
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

fn take_utf8(buf: &mut &[u8]) -> Result<String> {
    let len = take_u16(buf)? as usize;
    let raw = take_slice(buf, len)?;
    String::from_utf8(raw.to_vec())
        .map_err(|e| RelayError::Codec(format!("Invalid UTF-8 string: {}", e)))
}
