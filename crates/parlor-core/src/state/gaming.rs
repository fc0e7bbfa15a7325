//! The gaming phase: a timed round of the room's configured game.

use std::{
    sync::{Arc, RwLock, Weak},
    time::Duration,
};

use parlor_proto::{
    MsgId,
    payloads::{self, ActionEnvelope, SlotMachineData, SlotResults, SpinResult},
};
use rand::Rng;

use crate::{
    error::StateError,
    state::{Player, RoomContext, STATE_GAMING, State, WaitingState},
};

/// Tick cadence of the room driver; `on_update` subtracts this much from the
/// remaining time.
const TICK: Duration = Duration::from_millis(100);

/// Game-type tag of the sample game.
pub const GAME_SLOT_MACHINE: &str = "slot_machine";

/// Round-scoped game payload, selected by the room's game type at enter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameData {
    /// The sample three-reel slot machine.
    Slot(SlotMachineData),
    /// Unrecognized game types get an opaque key/value bag.
    Generic(serde_json::Map<String, serde_json::Value>),
}

impl GameData {
    fn for_game_type(game_type: &str) -> Self {
        match game_type {
            GAME_SLOT_MACHINE => Self::Slot(SlotMachineData::new_round()),
            _ => Self::Generic(serde_json::Map::new()),
        }
    }

    fn marshal(&self) -> Vec<u8> {
        // Both variants are plain serde data; serialization cannot fail.
        match self {
            Self::Slot(data) => serde_json::to_vec(data),
            Self::Generic(map) => serde_json::to_vec(map),
        }
        .unwrap_or_default()
    }
}

/// Final results of a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameResults {
    /// Slot-machine summary.
    Slot(SlotResults),
    /// Game types without a result calculator end with an empty document.
    Empty,
}

impl GameResults {
    fn marshal(&self) -> Vec<u8> {
        match self {
            Self::Slot(results) => serde_json::to_vec(results).unwrap_or_default(),
            Self::Empty => b"{}".to_vec(),
        }
    }
}

/// State guarded by the gaming data lock. `on_update` and `handle_action`
/// both take it, which is what keeps the countdown and concurrent spins
/// mutually consistent.
struct GamingInner {
    remaining: Duration,
    data: Option<GameData>,
    results: Option<GameResults>,
    /// Latched by the first expiry so results are computed and GameEnd is
    /// broadcast exactly once, even when the transition back to waiting has
    /// to be retried.
    ended: bool,
}

/// In-round phase. Counts the round down, applies player actions to the
/// game data, and loops back to [`WaitingState`] when the timer expires.
pub struct GamingState {
    room: Weak<dyn RoomContext>,
    duration: Duration,
    inner: RwLock<GamingInner>,
}

impl GamingState {
    /// Create a gaming state bound to `room` with the given round duration.
    pub fn new(room: Weak<dyn RoomContext>, duration: Duration) -> Self {
        Self {
            room,
            duration,
            inner: RwLock::new(GamingInner {
                remaining: duration,
                data: None,
                results: None,
                ended: false,
            }),
        }
    }

    /// Round duration this state was constructed with.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Remaining round time.
    pub fn remaining(&self) -> Duration {
        self.read().remaining
    }

    /// Snapshot of the current game data, `None` outside enter/exit.
    pub fn game_data(&self) -> Option<GameData> {
        self.read().data.clone()
    }

    /// Snapshot of the computed results, `None` until the round ends.
    pub fn results(&self) -> Option<GameResults> {
        self.read().results.clone()
    }

    /// Apply one spin to the slot machine and broadcast the new data.
    fn spin(&self, room: &dyn RoomContext, player: &dyn Player) {
        let snapshot = {
            let mut inner = self.write();
            let Some(GameData::Slot(data)) = inner.data.as_mut() else {
                return;
            };

            let mut rng = rand::rng();
            let reels = [
                rng.random_range(0..8u8),
                rng.random_range(0..8u8),
                rng.random_range(0..8u8),
            ];

            data.reels = reels;
            data.spin_count += 1;
            data.last_result = Some(SpinResult::score(reels));

            tracing::info!(
                room = room.id(),
                player = player.id(),
                spin = data.spin_count,
                "slot machine spin"
            );

            inner.data.as_ref().map(GameData::marshal)
        };

        if let Some(bytes) = snapshot {
            if let Err(err) = room.broadcast(MsgId::GameSync, &bytes) {
                tracing::warn!(room = room.id(), %err, "game sync broadcast failed");
            }
        }
    }

    /// Compute results and broadcast GameEnd (once), then ask the room to
    /// return to the waiting phase.
    fn end_game(&self, room: &dyn RoomContext) {
        let end_payload = {
            let mut inner = self.write();
            if inner.ended {
                None
            } else {
                inner.ended = true;
                let results = match (room.game_type(), inner.data.as_ref()) {
                    (GAME_SLOT_MACHINE, Some(GameData::Slot(data))) => {
                        GameResults::Slot(SlotResults {
                            final_spin_count: data.spin_count,
                            last_win: data.last_result.map(|r| r.win),
                        })
                    }
                    _ => GameResults::Empty,
                };
                let bytes = results.marshal();
                inner.results = Some(results);
                Some(bytes)
            }
        };

        if let Some(bytes) = end_payload {
            tracing::info!(room = room.id(), "game round ended");
            if let Err(err) = room.broadcast(MsgId::GameEnd, &bytes) {
                tracing::warn!(room = room.id(), %err, "game end broadcast failed");
            }
        }

        // Loop back to waiting. A guard may reject this; the next tick
        // retries the transition without re-broadcasting.
        let waiting = Arc::new(WaitingState::new(self.room.clone()));
        if let Err(err) = room.change_state(waiting) {
            tracing::debug!(room = room.id(), %err, "return to waiting rejected");
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, GamingInner> {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, GamingInner> {
        self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl State for GamingState {
    fn id(&self) -> &str {
        STATE_GAMING
    }

    fn on_enter(&self) {
        let Some(room) = self.room.upgrade() else {
            return;
        };

        let bytes = {
            let mut inner = self.write();
            let data = GameData::for_game_type(room.game_type());
            let bytes = data.marshal();
            inner.data = Some(data);
            bytes
        };

        tracing::info!(
            room = room.id(),
            game_type = room.game_type(),
            duration_ms = self.duration.as_millis() as u64,
            "game round started"
        );

        if let Err(err) = room.broadcast(MsgId::GameStart, &bytes) {
            tracing::warn!(room = room.id(), %err, "game start broadcast failed");
        }
    }

    fn on_exit(&self) {
        let mut inner = self.write();
        inner.data = None;
        inner.results = None;
    }

    fn on_update(&self) {
        let Some(room) = self.room.upgrade() else {
            return;
        };

        let expired = {
            let mut inner = self.write();
            if inner.ended {
                true
            } else {
                inner.remaining = inner.remaining.saturating_sub(TICK);
                inner.remaining.is_zero()
            }
        };

        // The data lock is released before end_game: ending broadcasts and
        // re-enters the machine, neither of which may run under it.
        if expired {
            self.end_game(room.as_ref());
        }
    }

    fn handle_action(&self, player: &dyn Player, data: &[u8]) -> Result<(), StateError> {
        let room = self.room.upgrade().ok_or(StateError::RoomGone)?;

        let action: ActionEnvelope = payloads::from_bytes(data)?;

        match (room.game_type(), action.kind.as_str()) {
            (GAME_SLOT_MACHINE, "spin") => self.spin(room.as_ref(), player),
            // Actions are advisory: unknown types are dropped silently.
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::error::BroadcastError;

    #[derive(Default)]
    struct StubRoom {
        game_type: String,
        changes: Mutex<Vec<String>>,
        broadcasts: Mutex<Vec<(MsgId, Vec<u8>)>>,
    }

    impl StubRoom {
        fn new(game_type: &str) -> Arc<Self> {
            Arc::new(Self { game_type: game_type.to_string(), ..Self::default() })
        }

        fn broadcast_ids(&self) -> Vec<MsgId> {
            self.broadcasts.lock().unwrap().iter().map(|(id, _)| *id).collect()
        }

        fn last_payload_of(&self, wanted: MsgId) -> Option<Vec<u8>> {
            self.broadcasts
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(id, _)| *id == wanted)
                .map(|(_, data)| data.clone())
        }
    }

    impl RoomContext for StubRoom {
        fn id(&self) -> &str {
            "room-1"
        }

        fn game_type(&self) -> &str {
            &self.game_type
        }

        fn players(&self) -> HashMap<String, Arc<dyn Player>> {
            HashMap::new()
        }

        fn max_players(&self) -> usize {
            4
        }

        fn change_state(&self, next: Arc<dyn State>) -> Result<(), StateError> {
            self.changes.lock().unwrap().push(next.id().to_string());
            Ok(())
        }

        fn broadcast(&self, msg_id: MsgId, data: &[u8]) -> Result<(), BroadcastError> {
            self.broadcasts.lock().unwrap().push((msg_id, data.to_vec()));
            Ok(())
        }
    }

    struct StubPlayer;

    impl Player for StubPlayer {
        fn id(&self) -> &str {
            "p1"
        }
    }

    fn gaming_for(room: &Arc<StubRoom>, duration: Duration) -> GamingState {
        let ctx: Weak<dyn RoomContext> = Arc::downgrade(&(room.clone() as Arc<dyn RoomContext>));
        let state = GamingState::new(ctx, duration);
        state.on_enter();
        state
    }

    #[test]
    fn enter_initializes_slot_data_and_broadcasts_start() {
        let room = StubRoom::new(GAME_SLOT_MACHINE);
        let state = gaming_for(&room, Duration::from_secs(5));

        assert_eq!(room.broadcast_ids(), vec![MsgId::GameStart]);

        let start = room.last_payload_of(MsgId::GameStart).unwrap();
        let data: SlotMachineData = payloads::from_bytes(&start).unwrap();
        assert_eq!(data, SlotMachineData::new_round());

        assert!(matches!(state.game_data(), Some(GameData::Slot(_))));
    }

    #[test]
    fn unknown_game_type_gets_generic_data() {
        let room = StubRoom::new("chess");
        let state = gaming_for(&room, Duration::from_secs(5));

        assert!(matches!(state.game_data(), Some(GameData::Generic(_))));
        assert_eq!(room.last_payload_of(MsgId::GameStart).unwrap(), b"{}");
    }

    #[test]
    fn spin_mutates_data_and_broadcasts_sync() {
        let room = StubRoom::new(GAME_SLOT_MACHINE);
        let state = gaming_for(&room, Duration::from_secs(5));

        state.handle_action(&StubPlayer, br#"{"type":"spin"}"#).unwrap();

        let sync = room.last_payload_of(MsgId::GameSync).unwrap();
        let data: SlotMachineData = payloads::from_bytes(&sync).unwrap();
        assert_eq!(data.spin_count, 1);

        let result = data.last_result.expect("spin records a result");
        assert!(result.symbols.iter().all(|&s| s < 8));
        assert_eq!(result, SpinResult::score(result.symbols));
    }

    #[test]
    fn unknown_action_type_is_ignored() {
        let room = StubRoom::new(GAME_SLOT_MACHINE);
        let state = gaming_for(&room, Duration::from_secs(5));

        state.handle_action(&StubPlayer, br#"{"type":"dance"}"#).unwrap();

        assert_eq!(room.broadcast_ids(), vec![MsgId::GameStart]);
    }

    #[test]
    fn malformed_action_is_an_error() {
        let room = StubRoom::new(GAME_SLOT_MACHINE);
        let state = gaming_for(&room, Duration::from_secs(5));

        let err = state.handle_action(&StubPlayer, b"{broken").unwrap_err();
        assert!(matches!(err, StateError::MalformedAction(_)));
    }

    #[test]
    fn timer_expiry_ends_exactly_once_and_returns_to_waiting() {
        let room = StubRoom::new(GAME_SLOT_MACHINE);
        let state = gaming_for(&room, Duration::from_secs(5));

        // 49 ticks: still running.
        for _ in 0..49 {
            state.on_update();
        }
        assert_eq!(room.broadcast_ids(), vec![MsgId::GameStart]);

        // 50th tick: the 5 s round at 100 ms cadence expires.
        state.on_update();

        let ids = room.broadcast_ids();
        assert_eq!(ids.iter().filter(|&&id| id == MsgId::GameEnd).count(), 1);
        assert_eq!(room.changes.lock().unwrap().clone(), vec!["waiting"]);

        // Extra ticks on the stale state retry the transition but never
        // re-broadcast the results.
        state.on_update();
        state.on_update();
        let ids = room.broadcast_ids();
        assert_eq!(ids.iter().filter(|&&id| id == MsgId::GameEnd).count(), 1);
    }

    #[test]
    fn results_summarize_the_round() {
        let room = StubRoom::new(GAME_SLOT_MACHINE);
        let state = gaming_for(&room, Duration::from_millis(100));

        state.handle_action(&StubPlayer, br#"{"type":"spin"}"#).unwrap();
        state.on_update();

        let end = room.last_payload_of(MsgId::GameEnd).unwrap();
        let results: SlotResults = payloads::from_bytes(&end).unwrap();
        assert_eq!(results.final_spin_count, 1);
        assert!(results.last_win.is_some());
    }

    #[test]
    fn round_with_no_spins_ends_with_null_win() {
        let room = StubRoom::new(GAME_SLOT_MACHINE);
        let state = gaming_for(&room, Duration::from_millis(100));

        state.on_update();

        let end = room.last_payload_of(MsgId::GameEnd).unwrap();
        let results: SlotResults = payloads::from_bytes(&end).unwrap();
        assert_eq!(results.final_spin_count, 0);
        assert_eq!(results.last_win, None);
    }

    #[test]
    fn exit_clears_data_and_results() {
        let room = StubRoom::new(GAME_SLOT_MACHINE);
        let state = gaming_for(&room, Duration::from_millis(100));

        state.on_update();
        state.on_exit();

        assert!(state.game_data().is_none());
        assert!(state.results().is_none());
    }
}
