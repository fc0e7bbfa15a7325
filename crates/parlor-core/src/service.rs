//! Player-facing operations composed over the persistence façade.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    error::StorageError,
    models::{PlayerData, unix_now_secs},
    storage::Database,
};

/// A player profile joined with their aggregated statistics, as served by
/// the admin surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerWithStats {
    /// Persistent player data.
    pub player: PlayerData,
    /// Aggregated statistics.
    pub stats: serde_json::Map<String, serde_json::Value>,
}

/// Read/write operations on player profiles.
pub struct PlayerService {
    db: Arc<dyn Database>,
}

impl PlayerService {
    /// Wire the service to a database.
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Load a player's profile and statistics in one consistent view.
    ///
    /// # Errors
    ///
    /// `StorageError::RecordNotFound` for unknown players; backend failures
    /// otherwise.
    pub fn get_player_with_stats(&self, user_id: i64) -> Result<PlayerWithStats, StorageError> {
        let mut result = None;

        self.db.transaction(&mut |tx| {
            let player = tx.load_player_data(user_id)?;
            let stats = tx.player_stats(user_id)?;
            result = Some(PlayerWithStats { player, stats });
            Ok(())
        })?;

        // The transaction only returns Ok after the closure filled `result`.
        result.ok_or(StorageError::RecordNotFound)
    }

    /// Adjust a player's coin balance atomically.
    ///
    /// A negative `delta` that would take the balance below zero aborts the
    /// transaction and leaves the balance untouched.
    ///
    /// # Errors
    ///
    /// `StorageError::Aborted` on insufficient coins;
    /// `StorageError::RecordNotFound` for unknown players.
    pub fn update_player_coins(&self, user_id: i64, delta: i64) -> Result<(), StorageError> {
        self.db.transaction(&mut |tx| {
            let mut player = tx.load_player_data(user_id)?;

            if delta < 0 && player.coins + delta < 0 {
                return Err(StorageError::Aborted("insufficient coins".into()));
            }

            player.coins += delta;
            player.updated_at_secs = unix_now_secs();
            tx.save_player_data(user_id, &player)
        })
    }
}
