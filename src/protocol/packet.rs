//! Packet definitions
//!
//! Represents outbound messages queued on a connection.

use bytes::Bytes;

/// Wire tags for [`Value`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueTag {
    Bool = 0x01,
    U8 = 0x02,
    U16 = 0x03,
    U32 = 0x04,
    U64 = 0x05,
    I32 = 0x06,
    I64 = 0x07,
    F32 = 0x08,
    Str = 0x09,
    Bytes = 0x0A,
}

impl ValueTag {
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0x01 => ValueTag::Bool,
            0x02 => ValueTag::U8,
            0x03 => ValueTag::U16,
            0x04 => ValueTag::U32,
            0x05 => ValueTag::U64,
            0x06 => ValueTag::I32,
            0x07 => ValueTag::I64,
            0x08 => ValueTag::F32,
            0x09 => ValueTag::Str,
            0x0A => ValueTag::Bytes,
            _ => return None,
        })
    }
}

/// One field of a structured message
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I32(i32),
    I64(i64),
    F32(f32),
    /// Goes through the connection's string table
    Str(String),
    Bytes(Bytes),
}

impl Value {
    pub fn tag(&self) -> ValueTag {
        match self {
            Value::Bool(_) => ValueTag::Bool,
            Value::U8(_) => ValueTag::U8,
            Value::U16(_) => ValueTag::U16,
            Value::U32(_) => ValueTag::U32,
            Value::U64(_) => ValueTag::U64,
            Value::I32(_) => ValueTag::I32,
            Value::I64(_) => ValueTag::I64,
            Value::F32(_) => ValueTag::F32,
            Value::Str(_) => ValueTag::Str,
            Value::Bytes(_) => ValueTag::Bytes,
        }
    }
}

/// A structured protocol message: a kind name plus ordered fields
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: String,
    pub fields: Vec<Value>,
}

impl Message {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field (builder style)
    pub fn with(mut self, value: Value) -> Self {
        self.fields.push(value);
        self
    }
}

/// An outbound packet
///
/// Either a message the codec serializes per connection, or a blob whose
/// bytes were serialized ahead of time and are copied verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Message(Message),
    Blob(Bytes),
}

impl Packet {
    pub fn blob(bytes: impl Into<Bytes>) -> Self {
        Packet::Blob(bytes.into())
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, Packet::Blob(_))
    }
}

impl From<Message> for Packet {
    fn from(message: Message) -> Self {
        Packet::Message(message)
    }
}
