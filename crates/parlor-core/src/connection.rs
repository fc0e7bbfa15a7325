//! Send-side connection capability.
//!
//! A session exclusively owns the send side of one connection. The read
//! side (blocking packet read, heartbeat deadline) stays with the server's
//! accept loop - nothing in the core ever reads - so the capability the
//! core needs is deliberately narrow. The server crate provides the TCP
//! implementation; tests substitute in-memory fakes.

use std::net::SocketAddr;

use parlor_proto::MsgId;

use crate::error::ConnectionError;

/// The send side of one client connection.
///
/// Implementations must serialize concurrent `send` calls so frames never
/// interleave on the wire.
pub trait Connection: Send + Sync {
    /// Frame and send one packet.
    ///
    /// # Errors
    ///
    /// `ConnectionError::Closed` once the connection is gone; transport
    /// failures otherwise. Broadcast callers treat either as non-fatal for
    /// the remaining recipients.
    fn send(&self, msg_id: MsgId, data: &[u8]) -> Result<(), ConnectionError>;

    /// Release the transport. Calling this twice must not panic.
    fn close(&self);

    /// Best-effort peer identification for logs.
    fn remote_addr(&self) -> Option<SocketAddr>;
}
