//! Message-id namespace.
//!
//! Ids are grouped by the hundreds digit: 1xx room lifecycle, 2xx player
//! actions, 3xx state pushed from the server. Ids 201, 301 and 302 are
//! reserved but carry no traffic today.

/// Namespaced opcode carried in the packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MsgId {
    /// Keepalive, empty payload, client and server.
    Heartbeat = 1,

    /// Client request to join an existing room. JSON `{"room_id": ...}`.
    JoinRoom = 101,
    /// Client request to leave its current room. Empty payload.
    LeaveRoom = 102,
    /// Client request to create a room; the ack reuses the same id and
    /// carries JSON `{"room_id": ...}`.
    CreateRoom = 103,

    /// Reserved.
    GameAction = 201,
    /// In-game player action. JSON `{"type": ...}` envelope.
    PlayerAction = 202,

    /// Reserved.
    RoomState = 301,
    /// Reserved.
    PlayerState = 302,
    /// Server broadcast: a game round started; payload is the marshalled
    /// initial game data.
    GameStart = 303,
    /// Server broadcast: game data changed; payload is the marshalled
    /// current game data.
    GameSync = 304,
    /// Server broadcast: the round ended; payload is the marshalled results.
    GameEnd = 305,
}

impl MsgId {
    /// Numeric wire value.
    #[must_use]
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse a wire value. Returns `None` for ids outside the namespace,
    /// which the dispatch layer logs and drops.
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Heartbeat),
            101 => Some(Self::JoinRoom),
            102 => Some(Self::LeaveRoom),
            103 => Some(Self::CreateRoom),
            201 => Some(Self::GameAction),
            202 => Some(Self::PlayerAction),
            301 => Some(Self::RoomState),
            302 => Some(Self::PlayerState),
            303 => Some(Self::GameStart),
            304 => Some(Self::GameSync),
            305 => Some(Self::GameEnd),
            _ => None,
        }
    }
}

impl std::fmt::Display for MsgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.to_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MsgId; 11] = [
        MsgId::Heartbeat,
        MsgId::JoinRoom,
        MsgId::LeaveRoom,
        MsgId::CreateRoom,
        MsgId::GameAction,
        MsgId::PlayerAction,
        MsgId::RoomState,
        MsgId::PlayerState,
        MsgId::GameStart,
        MsgId::GameSync,
        MsgId::GameEnd,
    ];

    #[test]
    fn wire_values_match_protocol_table() {
        assert_eq!(MsgId::Heartbeat.to_u16(), 1);
        assert_eq!(MsgId::JoinRoom.to_u16(), 101);
        assert_eq!(MsgId::LeaveRoom.to_u16(), 102);
        assert_eq!(MsgId::CreateRoom.to_u16(), 103);
        assert_eq!(MsgId::GameAction.to_u16(), 201);
        assert_eq!(MsgId::PlayerAction.to_u16(), 202);
        assert_eq!(MsgId::RoomState.to_u16(), 301);
        assert_eq!(MsgId::PlayerState.to_u16(), 302);
        assert_eq!(MsgId::GameStart.to_u16(), 303);
        assert_eq!(MsgId::GameSync.to_u16(), 304);
        assert_eq!(MsgId::GameEnd.to_u16(), 305);
    }

    #[test]
    fn round_trip_all_ids() {
        for id in ALL {
            assert_eq!(MsgId::from_u16(id.to_u16()), Some(id));
        }
    }

    #[test]
    fn unknown_ids_are_none() {
        for value in [0u16, 2, 100, 104, 200, 306, u16::MAX] {
            assert_eq!(MsgId::from_u16(value), None);
        }
    }
}
