//! Domain models exchanged with the persistence collaborator.
//!
//! Timestamps are unix seconds; none of these types appear on the game
//! wire.

use serde::{Deserialize, Serialize};

/// Persistent per-player data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    /// Application user id.
    pub user_id: i64,
    /// Display name.
    pub name: String,
    /// Player level.
    pub level: u32,
    /// Accumulated experience.
    pub experience: u64,
    /// Coin balance.
    pub coins: i64,
    /// Free-form inventory.
    pub items: serde_json::Map<String, serde_json::Value>,
    /// Unix timestamp (seconds) of creation.
    pub created_at_secs: u64,
    /// Unix timestamp (seconds) of the last update.
    pub updated_at_secs: u64,
}

/// A player's participation in one recorded game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// Application user id.
    pub user_id: i64,
    /// Display name at the time of the game.
    pub name: String,
    /// Outcome tag: `win` / `lose` / `draw`.
    pub outcome: String,
    /// Points scored.
    pub points: i64,
}

/// One finished game round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Room the game ran in.
    pub room_id: String,
    /// Game-type tag.
    pub game_type: String,
    /// Participants and their outcomes.
    pub players: Vec<PlayerInfo>,
    /// Marshalled game results.
    pub result: serde_json::Map<String, serde_json::Value>,
    /// Unix timestamp (seconds) the record was written.
    pub created_at_secs: u64,
}

/// Snapshot of a room's coarse state for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRoomState {
    /// Room id.
    pub room_id: String,
    /// Game-type tag.
    pub game_type: String,
    /// Fine-grained state id at snapshot time.
    pub state: String,
    /// Member snapshot, keyed by session id.
    pub players: serde_json::Map<String, serde_json::Value>,
    /// Unix timestamp (seconds) of creation.
    pub created_at_secs: u64,
    /// Unix timestamp (seconds) of the last update.
    pub updated_at_secs: u64,
}

/// Current unix time in seconds.
#[must_use]
pub fn unix_now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
