//! Protocol Module
//!
//! Defines the wire protocol for the TCP send direction.
//!
//! ## Stream Format
//! ```text
//! ┌──────────┬───────────────┬──────────┬───────────────┬─────
//! │ Len (2)  │   Payload     │ Len (2)  │   Payload     │ ...
//! └──────────┴───────────────┴──────────┴───────────────┴─────
//! ```
//!
//! Each payload is one serialized [`Packet`]: either a structured
//! [`Message`] or a pre-serialized blob copied verbatim.

mod packet;
mod strings;
mod codec;

pub use packet::{Message, Packet, Value, ValueTag};
pub use strings::{StringLookup, StringMap, STRING_DEFINE, STRING_LITERAL, STRING_REF};
pub use codec::{read_frame, split_frames, write_frame, PacketCodec, FRAME_HEADER_SIZE};
