//! Wire protocol for the parlor game session server.
//!
//! The protocol is deliberately small: every message on the wire is one
//! [`Packet`] - a 4-byte big-endian header (`msg_id: u16`, `length: u16`)
//! followed by `length` payload bytes. The header is raw binary so the
//! server can route packets without touching the payload; payloads that
//! carry structure are UTF-8 JSON documents (see [`payloads`]).
//!
//! There is no checksum, no compression, and no multi-frame reassembly.
//! Framing validity is the only guarantee this crate provides.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod msg;
mod packet;
pub mod payloads;

pub use error::ProtocolError;
pub use msg::MsgId;
pub use packet::Packet;

/// Convenience result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
