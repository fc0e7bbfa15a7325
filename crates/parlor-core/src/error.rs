//! Error types for the runtime core.
//!
//! One enum per concern rather than one crate-wide error: callers handle a
//! rejected transition very differently from a dead transport, and the
//! distinction should survive the type system.

use thiserror::Error;

/// Errors from the send side of a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connection has been closed; no further sends will succeed.
    #[error("connection closed")]
    Closed,

    /// The heartbeat read deadline elapsed.
    #[error("read deadline elapsed")]
    Timeout,

    /// Underlying transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Framing violation on the wire.
    #[error(transparent)]
    Protocol(#[from] parlor_proto::ProtocolError),
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::Closed,
            std::io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Transport(err.to_string()),
        }
    }
}

/// Errors from state handling and transitions.
#[derive(Error, Debug)]
pub enum StateError {
    /// A guard rejected the transition; the current state is unchanged and
    /// neither lifecycle hook ran.
    #[error("state transition not allowed: {from} -> {to}")]
    TransitionNotAllowed {
        /// Outgoing state id.
        from: String,
        /// Requested state id.
        to: String,
    },

    /// An action payload was not the expected JSON document. The caller
    /// logs and drops the packet.
    #[error("malformed action payload: {0}")]
    MalformedAction(#[from] parlor_proto::ProtocolError),

    /// The room backing this state has already been destroyed.
    #[error("room is gone")]
    RoomGone,

    /// Broadcasting from within a state failed.
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
}

/// Errors from broadcast fan-out. Per-member send failures are not errors:
/// they are logged and the fan-out continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// The room id did not resolve.
    #[error("room not found: {0}")]
    RoomNotFound(String),
}

/// Errors from the persistence façade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The requested record does not exist.
    #[error("record not found")]
    RecordNotFound,

    /// A transaction closure aborted; all writes were rolled back.
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// Backend failure (connection loss, serialization, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}
