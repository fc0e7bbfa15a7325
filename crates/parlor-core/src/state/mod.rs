//! Game-phase states and the machine that mediates their transitions.
//!
//! The room owns a [`StateMachine`]; the machine owns the current
//! [`State`]. States never see the concrete room type - only the
//! [`RoomContext`] capability set - which breaks the room↔state dependency
//! cycle. Likewise states see players only through the view-only [`Player`]
//! capability and cannot mutate sessions directly.
//!
//! Concrete states hold the context weakly: the room owns its machine which
//! owns its states, so a strong reference back would leak every room.

mod gaming;
mod machine;
mod waiting;

use std::{collections::HashMap, sync::Arc};

pub use gaming::{GAME_SLOT_MACHINE, GameData, GameResults, GamingState};
pub use machine::{Guard, StateMachine};
use parlor_proto::MsgId;
pub use waiting::WaitingState;

use crate::error::{BroadcastError, StateError};

/// State id of [`WaitingState`].
pub const STATE_WAITING: &str = "waiting";
/// State id of [`GamingState`].
pub const STATE_GAMING: &str = "gaming";
/// Reserved state id for a future settlement phase.
pub const STATE_SETTLEMENT: &str = "settlement";

/// View-only player capability exposed to states.
pub trait Player: Send + Sync {
    /// The player's session id.
    fn id(&self) -> &str;
}

/// The capability set a room exposes to its states.
pub trait RoomContext: Send + Sync {
    /// Room id.
    fn id(&self) -> &str;

    /// Game-type tag selecting plug-in behavior (e.g. `"slot_machine"`).
    fn game_type(&self) -> &str;

    /// Snapshot of the members as view-only players, keyed by session id.
    fn players(&self) -> HashMap<String, Arc<dyn Player>>;

    /// Membership capacity.
    fn max_players(&self) -> usize;

    /// Request a phase transition on the room's machine.
    ///
    /// # Errors
    ///
    /// `StateError::TransitionNotAllowed` when a guard rejects the change.
    fn change_state(&self, next: Arc<dyn State>) -> Result<(), StateError>;

    /// Fan a packet out to every member.
    ///
    /// # Errors
    ///
    /// `BroadcastError::RoomNotFound` when the room is no longer registered.
    fn broadcast(&self, msg_id: MsgId, data: &[u8]) -> Result<(), BroadcastError>;
}

/// One game phase.
///
/// Hook contract: `on_enter`/`on_exit` run inside the machine's write lock -
/// they must not call back into the machine on the same task. `on_update`
/// and `handle_action` run outside it and may request transitions.
pub trait State: Send + Sync {
    /// Stable identifier used by the transition table.
    fn id(&self) -> &str;

    /// Called once when this state becomes current.
    fn on_enter(&self) {}

    /// Called once when this state stops being current.
    fn on_exit(&self) {}

    /// Called once per room tick (100 ms cadence, best effort).
    fn on_update(&self) {}

    /// Handle one inbound action packet from `player`.
    ///
    /// # Errors
    ///
    /// `StateError::MalformedAction` for undecodable payloads (the caller
    /// logs and drops); transition errors when the action tried to advance
    /// the phase. Unknown action types are a no-op, not an error.
    fn handle_action(&self, player: &dyn Player, data: &[u8]) -> Result<(), StateError> {
        let _ = (player, data);
        Ok(())
    }
}
