//! Protocol codec
//!
//! Encoding and decoding of messages and length-prefixed frames.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (2)  │   Serialized packet (Len)   │
//! └──────────┴─────────────────────────────┘
//! ```
//! `Len` is a little-endian `u16`.
//!
//! ## Message Format
//! ```text
//! ┌──────────────┬───────────┬──────────────────────────┐
//! │ kind (str)   │ count (1) │ (tag (1) + value) * count│
//! └──────────────┴───────────┴──────────────────────────┘
//! ```

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::strings::{take_slice, take_u16, take_u8, StringLookup, StringMap};
use super::{Message, Packet, Value, ValueTag};
use crate::error::{RelayError, Result};

/// Frame header size: 2 bytes length
pub const FRAME_HEADER_SIZE: usize = 2;

/// Serializes packets into a scratch buffer, bounded by the max packet size
#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    max_packet_size: usize,
}

impl PacketCodec {
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            max_packet_size: max_packet_size.min(u16::MAX as usize),
        }
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Append the serialized form of `packet` to `out`
    ///
    /// Blobs are copied verbatim; messages go through `strings`.
    pub fn encode(&self, packet: &Packet, strings: &mut StringMap, out: &mut BytesMut) -> Result<()> {
        let start = out.len();
        match packet {
            Packet::Blob(bytes) => out.extend_from_slice(bytes),
            Packet::Message(message) => self.encode_message(message, strings, out)?,
        }

        let size = out.len() - start;
        if size > self.max_packet_size {
            out.truncate(start);
            return Err(RelayError::PacketTooLarge {
                size,
                max: self.max_packet_size,
            });
        }
        Ok(())
    }

    fn encode_message(&self, message: &Message, strings: &mut StringMap, out: &mut BytesMut) -> Result<()> {
        let count = u8::try_from(message.fields.len()).map_err(|_| {
            RelayError::Codec(format!(
                "Message '{}' has too many fields: {}",
                message.kind,
                message.fields.len()
            ))
        })?;

        strings.write(&message.kind, out)?;
        out.put_u8(count);

        for value in &message.fields {
            out.put_u8(value.tag() as u8);
            match value {
                Value::Bool(v) => out.put_u8(*v as u8),
                Value::U8(v) => out.put_u8(*v),
                Value::U16(v) => out.put_u16_le(*v),
                Value::U32(v) => out.put_u32_le(*v),
                Value::U64(v) => out.put_u64_le(*v),
                Value::I32(v) => out.put_i32_le(*v),
                Value::I64(v) => out.put_i64_le(*v),
                Value::F32(v) => out.put_f32_le(*v),
                Value::Str(s) => strings.write(s, out)?,
                Value::Bytes(b) => {
                    let len = u16::try_from(b.len()).map_err(|_| RelayError::PacketTooLarge {
                        size: b.len(),
                        max: self.max_packet_size,
                    })?;
                    out.put_u16_le(len);
                    out.put_slice(b);
                }
            }
        }
        Ok(())
    }

    /// Serialize a message once, without string interning, so the same
    /// bytes can be sent to any number of connections.
    pub fn preserialize(&self, message: &Message) -> Result<Packet> {
        let mut out = BytesMut::with_capacity(self.max_packet_size);
        self.encode_message(message, &mut StringMap::disabled(), &mut out)?;
        if out.len() > self.max_packet_size {
            return Err(RelayError::PacketTooLarge {
                size: out.len(),
                max: self.max_packet_size,
            });
        }
        Ok(Packet::Blob(out.freeze()))
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Decode one serialized message
    pub fn decode(&self, payload: &[u8], strings: &mut StringLookup) -> Result<Message> {
        if payload.len() > self.max_packet_size {
            return Err(RelayError::PacketTooLarge {
                size: payload.len(),
                max: self.max_packet_size,
            });
        }

        let mut buf = payload;
        let kind = strings.read(&mut buf)?;
        let count = take_u8(&mut buf)?;

        let mut fields = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = take_u8(&mut buf)?;
            let tag = ValueTag::from_u8(tag)
                .ok_or_else(|| RelayError::Codec(format!("Unknown value tag: 0x{:02x}", tag)))?;
            fields.push(decode_value(tag, &mut buf, strings)?);
        }

        if !buf.is_empty() {
            return Err(RelayError::Codec(format!(
                "Message '{}': {} trailing bytes",
                kind,
                buf.len()
            )));
        }

        Ok(Message { kind, fields })
    }
}

fn decode_value(tag: ValueTag, buf: &mut &[u8], strings: &mut StringLookup) -> Result<Value> {
    let fixed = |buf: &mut &[u8], n: usize| -> Result<()> {
        if buf.remaining() < n {
            return Err(RelayError::Codec(format!(
                "Truncated {:?} value: expected {} bytes, got {}",
                tag,
                n,
                buf.remaining()
            )));
        }
        Ok(())
    };

    Ok(match tag {
        ValueTag::Bool => Value::Bool(take_u8(buf)? != 0),
        ValueTag::U8 => Value::U8(take_u8(buf)?),
        ValueTag::U16 => Value::U16(take_u16(buf)?),
        ValueTag::U32 => {
            fixed(buf, 4)?;
            Value::U32(buf.get_u32_le())
        }
        ValueTag::U64 => {
            fixed(buf, 8)?;
            Value::U64(buf.get_u64_le())
        }
        ValueTag::I32 => {
            fixed(buf, 4)?;
            Value::I32(buf.get_i32_le())
        }
        ValueTag::I64 => {
            fixed(buf, 8)?;
            Value::I64(buf.get_i64_le())
        }
        ValueTag::F32 => {
            fixed(buf, 4)?;
            Value::F32(buf.get_f32_le())
        }
        ValueTag::Str => Value::Str(strings.read(buf)?),
        ValueTag::Bytes => {
            let len = take_u16(buf)? as usize;
            Value::Bytes(Bytes::copy_from_slice(take_slice(buf, len)?))
        }
    })
}

// =============================================================================
// Stream-based frame helpers
// =============================================================================

/// Write one frame (length prefix + payload) without flushing
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = u16::try_from(payload.len()).map_err(|_| RelayError::PacketTooLarge {
        size: payload.len(),
        max: u16::MAX as usize,
    })?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}

/// Read one frame's payload from a stream
///
/// Blocks until a complete frame is received or an error occurs
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Bytes> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let len = u16::from_le_bytes(header) as usize;
    let mut payload = vec![0u8; len];
    if len > 0 {
        reader.read_exact(&mut payload)?;
    }
    Ok(Bytes::from(payload))
}

/// Split a byte stream into frame payloads
///
/// Fails if the stream ends in the middle of a frame.
pub fn split_frames(mut bytes: &[u8]) -> Result<Vec<Bytes>> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let len = take_u16(&mut bytes)? as usize;
        frames.push(Bytes::copy_from_slice(take_slice(&mut bytes, len)?));
    }
    Ok(frames)
}
