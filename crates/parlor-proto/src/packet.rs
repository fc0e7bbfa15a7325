//! Packet framing codec.
//!
//! Layout on the wire, big-endian:
//!
//! ```text
//! [msg_id: u16][length: u16][payload: `length` bytes]
//! ```
//!
//! A `Packet` is a pure data holder; routing happens on `msg_id` without
//! deserializing the payload. The decoder copies the payload out of the
//! receive buffer, so decoded packets never borrow from it.

use bytes::{BufMut, Bytes};

use crate::{
    MsgId,
    error::ProtocolError,
};

/// One framed message on the wire.
///
/// # Invariants
///
/// - `payload.len()` always fits the 16-bit length field; [`Packet::new`]
///   rejects anything larger, and [`Packet::decode`] can only produce
///   payloads the header could describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Namespaced opcode. Kept as the raw wire value so unknown ids survive
    /// decoding and can be logged at the dispatch layer.
    pub msg_id: u16,

    /// Raw payload bytes.
    pub payload: Bytes,
}

impl Packet {
    /// Header size in bytes: `msg_id` + `length`.
    pub const HEADER_LEN: usize = 4;

    /// Largest payload the 16-bit length field can describe.
    pub const MAX_PAYLOAD: usize = u16::MAX as usize;

    /// Create a packet for a known message id.
    ///
    /// # Errors
    ///
    /// `ProtocolError::PayloadTooLarge` if the payload exceeds
    /// [`Packet::MAX_PAYLOAD`].
    pub fn new(msg_id: MsgId, payload: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        Self::from_raw(msg_id.to_u16(), payload)
    }

    /// Create a packet from a raw wire id. Used by tests and by peers that
    /// speak ids this build does not know.
    ///
    /// # Errors
    ///
    /// `ProtocolError::PayloadTooLarge` if the payload exceeds
    /// [`Packet::MAX_PAYLOAD`].
    pub fn from_raw(msg_id: u16, payload: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let payload = payload.into();
        if payload.len() > Self::MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: Self::MAX_PAYLOAD,
            });
        }
        Ok(Self { msg_id, payload })
    }

    /// The message id as an enum, `None` when outside the namespace.
    #[must_use]
    pub fn msg(&self) -> Option<MsgId> {
        MsgId::from_u16(self.msg_id)
    }

    /// Total encoded size: header plus payload.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        Self::HEADER_LEN + self.payload.len()
    }

    /// Encode into a buffer.
    pub fn encode(&self, dst: &mut impl BufMut) {
        debug_assert!(self.payload.len() <= Self::MAX_PAYLOAD);

        dst.put_u16(self.msg_id);
        dst.put_u16(self.payload.len() as u16);
        dst.put_slice(&self.payload);
    }

    /// Encode into a freshly allocated buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        Bytes::from(buf)
    }

    /// Split a raw 4-byte header into `(msg_id, payload_length)`.
    ///
    /// Stream-based readers use this after `read_exact`-ing the header so
    /// they know how many payload bytes to wait for.
    #[must_use]
    pub fn read_header(header: [u8; Self::HEADER_LEN]) -> (u16, u16) {
        let msg_id = u16::from_be_bytes([header[0], header[1]]);
        let length = u16::from_be_bytes([header[2], header[3]]);
        (msg_id, length)
    }

    /// Decode one packet from the front of a buffer. Trailing bytes are
    /// ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::ShortBuffer` when fewer than 4 header bytes are
    ///   available.
    /// - `ProtocolError::Truncated` when the buffer does not hold the
    ///   `length` payload bytes the header claims.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < Self::HEADER_LEN {
            return Err(ProtocolError::ShortBuffer {
                needed: Self::HEADER_LEN,
                available: buf.len(),
            });
        }

        let (msg_id, length) = Self::read_header([buf[0], buf[1], buf[2], buf[3]]);
        let length = length as usize;
        let total = Self::HEADER_LEN + length;

        if buf.len() < total {
            return Err(ProtocolError::Truncated {
                expected: length,
                actual: buf.len() - Self::HEADER_LEN,
            });
        }

        Ok(Self {
            msg_id,
            payload: Bytes::copy_from_slice(&buf[Self::HEADER_LEN..total]),
        })
    }
}
