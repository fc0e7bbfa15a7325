//! The waiting phase: counts down until a game round starts.

use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicI32, Ordering},
    },
    time::Duration,
};

use crate::{
    error::StateError,
    state::{GamingState, Player, RoomContext, STATE_WAITING, State},
};

/// Idle ticks before a round starts on its own: 10 seconds at the 100 ms
/// tick cadence.
const COUNTDOWN_TICKS: i32 = 100;

/// Duration of the round a waiting room starts.
const GAME_DURATION: Duration = Duration::from_secs(5);

/// Pre-game phase.
///
/// A round starts when the countdown runs out, when membership reaches
/// capacity, or immediately when any player acts - a player who tries to
/// act while waiting should not silently have the action discarded.
pub struct WaitingState {
    room: Weak<dyn RoomContext>,
    ticks_left: AtomicI32,
}

impl WaitingState {
    /// Create a waiting state bound to `room`.
    pub fn new(room: Weak<dyn RoomContext>) -> Self {
        Self { room, ticks_left: AtomicI32::new(COUNTDOWN_TICKS) }
    }

    fn start_game(&self, room: &dyn RoomContext) -> Result<Arc<GamingState>, StateError> {
        let gaming = Arc::new(GamingState::new(self.room.clone(), GAME_DURATION));
        room.change_state(gaming.clone())?;
        Ok(gaming)
    }
}

impl State for WaitingState {
    fn id(&self) -> &str {
        STATE_WAITING
    }

    fn on_enter(&self) {
        self.ticks_left.store(COUNTDOWN_TICKS, Ordering::SeqCst);
    }

    fn on_update(&self) {
        let Some(room) = self.room.upgrade() else {
            return;
        };

        let expired = self.ticks_left.fetch_sub(1, Ordering::SeqCst) <= 1;
        let full = room.players().len() >= room.max_players();

        if expired || full {
            // A rejected transition leaves us waiting; retried next tick.
            if let Err(err) = self.start_game(room.as_ref()) {
                tracing::debug!(room = room.id(), %err, "waiting state could not start game");
            }
        }
    }

    fn handle_action(&self, player: &dyn Player, data: &[u8]) -> Result<(), StateError> {
        let room = self.room.upgrade().ok_or(StateError::RoomGone)?;

        tracing::info!(
            room = room.id(),
            player = player.id(),
            "action during waiting phase, starting game"
        );

        // Start the round and re-dispatch the action to the new state so the
        // packet that woke the room up is not lost.
        let gaming = self.start_game(room.as_ref())?;
        gaming.handle_action(player, data)
    }
}
