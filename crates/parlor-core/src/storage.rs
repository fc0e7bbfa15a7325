//! Persistence façade.
//!
//! The core never persists on the hot path; everything behind [`Database`]
//! is a collaborator the runtime calls at its own leisure. The trait is
//! synchronous to keep the call sites free of executor concerns, and the
//! in-memory implementation exists so the server and the tests run without
//! a real backend.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    error::StorageError,
    models::{GameRecord, PlayerData, StoredRoomState},
};

/// Abstract database capability.
///
/// Implementations must be safe for concurrent use. `transaction` runs the
/// given closure atomically: if it returns an error, every write it made is
/// rolled back.
pub trait Database: Send + Sync {
    /// Persist a player's data under their user id.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn save_player_data(&self, player_id: i64, data: &PlayerData) -> Result<(), StorageError>;

    /// Load a player's data.
    ///
    /// # Errors
    ///
    /// `StorageError::RecordNotFound` when the player has never been saved.
    fn load_player_data(&self, player_id: i64) -> Result<PlayerData, StorageError>;

    /// Append one finished game record.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn save_game_record(&self, record: &GameRecord) -> Result<(), StorageError>;

    /// Persist a room-state snapshot, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn save_room_state(&self, state: &StoredRoomState) -> Result<(), StorageError>;

    /// Load the last room-state snapshot.
    ///
    /// # Errors
    ///
    /// `StorageError::RecordNotFound` when no snapshot exists.
    fn load_room_state(&self, room_id: &str) -> Result<StoredRoomState, StorageError>;

    /// Run `f` atomically. The closure receives a database view whose writes
    /// become visible only if it returns `Ok`.
    ///
    /// # Errors
    ///
    /// The closure's error after rolling back, or backend failures.
    fn transaction(
        &self,
        f: &mut dyn FnMut(&dyn Database) -> Result<(), StorageError>,
    ) -> Result<(), StorageError>;

    /// Aggregated statistics for one user.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn player_stats(
        &self,
        user_id: i64,
    ) -> Result<serde_json::Map<String, serde_json::Value>, StorageError>;

    /// Release backend resources.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn close(&self) -> Result<(), StorageError>;
}

#[derive(Debug, Default, Clone)]
struct MemoryInner {
    players: HashMap<i64, PlayerData>,
    records: Vec<GameRecord>,
    room_states: HashMap<String, StoredRoomState>,
}

/// In-memory [`Database`] for tests and backend-less deployments.
///
/// Clones share the same underlying maps. Transactions run against a
/// scratch copy of the whole store and commit by swap, which is as atomic
/// as it gets for a hash-map backend.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryDatabase {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored game records.
    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Database for MemoryDatabase {
    fn save_player_data(&self, player_id: i64, data: &PlayerData) -> Result<(), StorageError> {
        self.lock().players.insert(player_id, data.clone());
        Ok(())
    }

    fn load_player_data(&self, player_id: i64) -> Result<PlayerData, StorageError> {
        self.lock().players.get(&player_id).cloned().ok_or(StorageError::RecordNotFound)
    }

    fn save_game_record(&self, record: &GameRecord) -> Result<(), StorageError> {
        self.lock().records.push(record.clone());
        Ok(())
    }

    fn save_room_state(&self, state: &StoredRoomState) -> Result<(), StorageError> {
        self.lock().room_states.insert(state.room_id.clone(), state.clone());
        Ok(())
    }

    fn load_room_state(&self, room_id: &str) -> Result<StoredRoomState, StorageError> {
        self.lock().room_states.get(room_id).cloned().ok_or(StorageError::RecordNotFound)
    }

    fn transaction(
        &self,
        f: &mut dyn FnMut(&dyn Database) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let scratch = MemoryDatabase { inner: Arc::new(Mutex::new(self.lock().clone())) };

        f(&scratch)?;

        *self.lock() = scratch.lock().clone();
        Ok(())
    }

    fn player_stats(
        &self,
        user_id: i64,
    ) -> Result<serde_json::Map<String, serde_json::Value>, StorageError> {
        let inner = self.lock();

        let mut games_played = 0u64;
        let mut wins = 0u64;
        let mut total_points = 0i64;

        for record in &inner.records {
            for player in &record.players {
                if player.user_id == user_id {
                    games_played += 1;
                    if player.outcome == "win" {
                        wins += 1;
                    }
                    total_points += player.points;
                }
            }
        }

        let mut stats = serde_json::Map::new();
        stats.insert("games_played".into(), games_played.into());
        stats.insert("wins".into(), wins.into());
        stats.insert("total_points".into(), total_points.into());
        Ok(stats)
    }

    fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
