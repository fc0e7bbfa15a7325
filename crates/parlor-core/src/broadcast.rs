//! In-process fan-out of packets to rooms, users, or everyone.
//!
//! A slow or dead member must not impair the rest of a room: per-recipient
//! send failures are logged at warn and skipped. Only resolution failure
//! (unknown room) surfaces to the caller.

use std::sync::Arc;

use parlor_proto::MsgId;

use crate::{
    error::BroadcastError,
    room::RoomRegistry,
    session::SessionRegistry,
};

/// Fan-out capability handed to rooms and handlers.
pub trait Broadcaster: Send + Sync {
    /// Send a packet to every member of `room_id`.
    ///
    /// # Errors
    ///
    /// `BroadcastError::RoomNotFound` when the room id does not resolve.
    /// Per-member send failures are swallowed.
    fn broadcast_to_room(
        &self,
        room_id: &str,
        msg_id: MsgId,
        data: &[u8],
    ) -> Result<(), BroadcastError>;

    /// Send a packet to every session of each listed user.
    ///
    /// # Errors
    ///
    /// Infallible today; the `Result` keeps the three fan-out calls uniform.
    fn broadcast_to_users(
        &self,
        user_ids: &[i64],
        msg_id: MsgId,
        data: &[u8],
    ) -> Result<(), BroadcastError>;

    /// Send a packet to every registered session.
    ///
    /// # Errors
    ///
    /// Infallible today; the `Result` keeps the three fan-out calls uniform.
    fn broadcast_to_all(&self, msg_id: MsgId, data: &[u8]) -> Result<(), BroadcastError>;
}

/// Registry-backed broadcaster: resolves rooms via the room registry and
/// users via the session registry.
pub struct RoomBroadcaster {
    rooms: Arc<RoomRegistry>,
    sessions: Arc<SessionRegistry>,
}

impl RoomBroadcaster {
    /// Wire a broadcaster to the two registries.
    pub fn new(rooms: Arc<RoomRegistry>, sessions: Arc<SessionRegistry>) -> Self {
        Self { rooms, sessions }
    }

    fn send_each(sessions: &[Arc<crate::session::Session>], msg_id: MsgId, data: &[u8]) {
        for session in sessions {
            if let Err(err) = session.send(msg_id, data) {
                tracing::warn!(session = session.id(), %msg_id, %err, "broadcast send failed");
            }
        }
    }
}

impl Broadcaster for RoomBroadcaster {
    fn broadcast_to_room(
        &self,
        room_id: &str,
        msg_id: MsgId,
        data: &[u8],
    ) -> Result<(), BroadcastError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| BroadcastError::RoomNotFound(room_id.to_string()))?;

        // Snapshot under the read lock, send outside it.
        Self::send_each(&room.sessions(), msg_id, data);
        Ok(())
    }

    fn broadcast_to_users(
        &self,
        user_ids: &[i64],
        msg_id: MsgId,
        data: &[u8],
    ) -> Result<(), BroadcastError> {
        for &user_id in user_ids {
            Self::send_each(&self.sessions.get_by_user_id(user_id), msg_id, data);
        }
        Ok(())
    }

    fn broadcast_to_all(&self, msg_id: MsgId, data: &[u8]) -> Result<(), BroadcastError> {
        Self::send_each(&self.sessions.all(), msg_id, data);
        Ok(())
    }
}
