//! Rooms and the process-wide room registry.
//!
//! A room owns its members, a state machine, and a 100 ms driver task that
//! calls the current state's `on_update`. Rooms are destroyed only through
//! the registry, which also stops the driver.
//!
//! Lock order inside a room: machine | players | status, then the gaming
//! state's data lock. The broadcaster is never invoked while the player
//! write lock is held - it re-enters the room to snapshot members.

use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, SystemTime},
};

use parlor_proto::MsgId;
use tokio::sync::watch;

use crate::{
    broadcast::Broadcaster,
    error::{BroadcastError, StateError},
    session::Session,
    state::{Player, RoomContext, State, StateMachine, WaitingState},
};

/// Interval between driver ticks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Coarse business status of a room - distinct from the state machine's
/// fine-grained phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    /// Constructed but not yet accepting play.
    Idle,
    /// Accepting players; `find_available` only returns rooms in this
    /// status.
    Waiting,
    /// A round is running.
    Gaming,
    /// Settling a finished round.
    Settlement,
}

/// Server-side container for one game room.
pub struct Room {
    id: String,
    name: String,
    game_type: String,
    max_players: usize,
    created_at: SystemTime,
    status: RwLock<RoomStatus>,
    /// session id → session. At most `max_players` entries; every member's
    /// `room_id` equals this room's id.
    players: RwLock<HashMap<String, Arc<Session>>>,
    machine: StateMachine,
    broadcaster: Arc<dyn Broadcaster>,
    close_tx: watch::Sender<bool>,
    closed: AtomicBool,
}

impl Room {
    /// Construct a room and start its driver.
    ///
    /// The machine starts in [`WaitingState`], the business status is set to
    /// `Waiting`, and the 100 ms driver task is spawned. Must run inside a
    /// tokio runtime.
    pub fn new(
        id: String,
        name: String,
        game_type: String,
        max_players: usize,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Arc<Self> {
        let (close_tx, close_rx) = watch::channel(false);

        let room = Arc::new_cyclic(|weak: &Weak<Self>| {
            let ctx: Weak<dyn RoomContext> = weak.clone();
            // The initial on_enter runs here, before the room is fully
            // linked; WaitingState's enter only resets its counter and must
            // stay that way.
            let machine = StateMachine::new(Arc::new(WaitingState::new(ctx)));

            Self {
                id,
                name,
                game_type,
                max_players,
                created_at: SystemTime::now(),
                status: RwLock::new(RoomStatus::Idle),
                players: RwLock::new(HashMap::new()),
                machine,
                broadcaster,
                close_tx,
                closed: AtomicBool::new(false),
            }
        });

        room.set_status(RoomStatus::Waiting);
        spawn_driver(Arc::downgrade(&room), close_rx);
        room
    }

    /// Room name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Add a session to the room.
    ///
    /// Rejects when the room is at capacity. On success the session's
    /// `room_id` is set while the player write lock is still held, keeping
    /// membership and `room_id` in agreement.
    pub fn add_player(&self, session: Arc<Session>) -> bool {
        let mut players = self.write_players();

        if players.len() >= self.max_players {
            return false;
        }

        session.set_room_id(self.id.clone());
        players.insert(session.id().to_string(), session);
        true
    }

    /// Remove a session by id, clearing its `room_id`. Silent no-op when
    /// the session is not a member.
    pub fn remove_player(&self, session_id: &str) {
        let mut players = self.write_players();

        if let Some(session) = players.remove(session_id) {
            session.set_room_id(String::new());
        }
    }

    /// Look up a member by session id.
    pub fn get_player(&self, session_id: &str) -> Option<Arc<Session>> {
        self.read_players().get(session_id).cloned()
    }

    /// Snapshot of all member sessions, safe to iterate without holding the
    /// lock. Broadcasters rely on this.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.read_players().values().cloned().collect()
    }

    /// Number of members.
    pub fn player_count(&self) -> usize {
        self.read_players().len()
    }

    /// Set the business status.
    pub fn set_status(&self, status: RoomStatus) {
        *self.status.write().unwrap_or_else(std::sync::PoisonError::into_inner) = status;
    }

    /// Current business status.
    pub fn status(&self) -> RoomStatus {
        *self.status.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// The room's state machine.
    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Drive the current state once. No-op after close.
    pub fn update(&self) {
        if self.is_closed() {
            return;
        }
        // Snapshot the state first so on_update runs outside the machine
        // lock and may itself request a transition.
        self.machine.current().on_update();
    }

    /// Stop the driver. Further `update` calls are no-ops. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.close_tx.send(true);
    }

    /// Whether the room has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn read_players(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Session>>> {
        self.players.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_players(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Session>>> {
        self.players.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl RoomContext for Room {
    fn id(&self) -> &str {
        &self.id
    }

    fn game_type(&self) -> &str {
        &self.game_type
    }

    /// Fresh map of members as view-only players - states cannot reach the
    /// sessions behind it.
    fn players(&self) -> HashMap<String, Arc<dyn Player>> {
        self.read_players()
            .iter()
            .map(|(id, session)| (id.clone(), session.clone() as Arc<dyn Player>))
            .collect()
    }

    fn max_players(&self) -> usize {
        self.max_players
    }

    fn change_state(&self, next: Arc<dyn State>) -> Result<(), StateError> {
        self.machine.change_state(next)
    }

    fn broadcast(&self, msg_id: MsgId, data: &[u8]) -> Result<(), BroadcastError> {
        self.broadcaster.broadcast_to_room(&self.id, msg_id, data)
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("game_type", &self.game_type)
            .field("status", &self.status())
            .field("players", &self.player_count())
            .field("state", &self.machine.current_id())
            .finish()
    }
}

/// Periodic driver: ticks the room every 100 ms until it closes or is
/// dropped by the registry.
fn spawn_driver(room: Weak<Room>, mut close_rx: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(room) = room.upgrade() else {
                        return;
                    };
                    if room.is_closed() {
                        return;
                    }
                    room.update();
                }
                _ = close_rx.changed() => {
                    return;
                }
            }
        }
    });
}

/// Process-wide `room id → room` map.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a room, install it, and return it.
    pub fn create_room(
        &self,
        id: String,
        name: String,
        game_type: String,
        max_players: usize,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Arc<Room> {
        let room = Room::new(id, name, game_type, max_players, broadcaster);
        self.write().insert(room.id().to_string(), room.clone());
        room
    }

    /// Close a room and drop it from the registry; subsequent lookups miss.
    pub fn remove_room(&self, id: &str) {
        if let Some(room) = self.write().remove(id) {
            room.close();
        }
    }

    /// Look up a room by id.
    pub fn get(&self, id: &str) -> Option<Arc<Room>> {
        self.read().get(id).cloned()
    }

    /// Any room with open capacity whose business status is `Waiting`.
    /// Unspecified which one when several match.
    pub fn find_available(&self) -> Option<Arc<Room>> {
        self.read()
            .values()
            .find(|room| {
                room.player_count() < room.max_players() && room.status() == RoomStatus::Waiting
            })
            .cloned()
    }

    /// Number of registered rooms.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Room>>> {
        self.rooms.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Room>>> {
        self.rooms.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry").field("room_count", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    /// Broadcaster double that drops everything.
    struct NullBroadcaster;

    impl Broadcaster for NullBroadcaster {
        fn broadcast_to_room(
            &self,
            _room_id: &str,
            _msg_id: MsgId,
            _data: &[u8],
        ) -> Result<(), BroadcastError> {
            Ok(())
        }

        fn broadcast_to_users(
            &self,
            _user_ids: &[i64],
            _msg_id: MsgId,
            _data: &[u8],
        ) -> Result<(), BroadcastError> {
            Ok(())
        }

        fn broadcast_to_all(&self, _msg_id: MsgId, _data: &[u8]) -> Result<(), BroadcastError> {
            Ok(())
        }
    }

    fn test_room(max_players: usize) -> Arc<Room> {
        Room::new(
            "room-1".into(),
            "Test Room".into(),
            "slot_machine".into(),
            max_players,
            Arc::new(NullBroadcaster),
        )
    }

    #[tokio::test]
    async fn construction_installs_waiting_state_and_status() {
        let room = test_room(4);

        assert_eq!(room.machine().current_id(), "waiting");
        assert_eq!(room.status(), RoomStatus::Waiting);
        assert_eq!(room.player_count(), 0);
        room.close();
    }

    #[tokio::test]
    async fn add_player_sets_room_id_and_respects_capacity() {
        let room = test_room(1);
        let (first, _) = test_support::session("s1");
        let (second, _) = test_support::session("s2");

        assert!(room.add_player(first.clone()));
        assert_eq!(first.room_id(), "room-1");
        assert_eq!(room.player_count(), 1);

        // Capacity reached: the second insert is rejected and leaves no
        // trace on the session.
        assert!(!room.add_player(second.clone()));
        assert_eq!(second.room_id(), "");
        assert_eq!(room.player_count(), 1);
        room.close();
    }

    #[tokio::test]
    async fn membership_never_exceeds_capacity_under_contention() {
        let room = test_room(3);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let room = room.clone();
                std::thread::spawn(move || {
                    let (session, _) = test_support::session(&format!("s{i}"));
                    room.add_player(session)
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&admitted| admitted)
            .count();
        assert_eq!(admitted, 3);
        assert_eq!(room.player_count(), 3);
        room.close();
    }

    #[tokio::test]
    async fn remove_player_clears_room_id() {
        let room = test_room(4);
        let (session, _) = test_support::session("s1");
        room.add_player(session.clone());

        room.remove_player("s1");

        assert_eq!(session.room_id(), "");
        assert_eq!(room.player_count(), 0);
        assert!(room.get_player("s1").is_none());

        // Removing an absent member is a silent no-op.
        room.remove_player("s1");
        room.close();
    }

    #[tokio::test]
    async fn room_and_session_agree_on_membership() {
        let room = test_room(4);
        let (a, _) = test_support::session("a");
        let (b, _) = test_support::session("b");

        room.add_player(a.clone());
        room.add_player(b.clone());
        room.remove_player("a");

        // Observed under one lock acquisition: members' room_id matches,
        // non-members' is empty.
        let players = room.read_players();
        for (id, session) in players.iter() {
            assert_eq!(session.room_id(), "room-1", "member {id} must agree");
        }
        assert!(!players.contains_key("a"));
        drop(players);

        assert_eq!(a.room_id(), "");
        assert_eq!(b.room_id(), "room-1");
        room.close();
    }

    #[tokio::test]
    async fn players_view_is_a_fresh_snapshot() {
        let room = test_room(4);
        let (session, _) = test_support::session("s1");
        room.add_player(session);

        let view = room.players();
        assert_eq!(view.len(), 1);
        assert_eq!(view["s1"].id(), "s1");

        room.remove_player("s1");
        // The snapshot is unaffected by later membership changes.
        assert_eq!(view.len(), 1);
        room.close();
    }

    #[tokio::test]
    async fn update_after_close_is_a_no_op() {
        let room = test_room(4);
        room.close();
        assert!(room.is_closed());

        // Would tick the waiting countdown if the room were open.
        for _ in 0..200 {
            room.update();
        }
        assert_eq!(room.machine().current_id(), "waiting");
    }

    #[tokio::test]
    async fn close_twice_is_fine() {
        let room = test_room(4);
        room.close();
        room.close();
    }

    #[tokio::test]
    async fn driver_ticks_the_waiting_countdown() {
        let room = test_room(4);
        let (session, _) = test_support::session("s1");
        room.add_player(session);

        // 10 s idle countdown at 100 ms per tick; give the driver a little
        // headroom past the threshold.
        tokio::time::pause();
        tokio::time::sleep(Duration::from_millis(10_200)).await;
        tokio::time::resume();

        // Yield so the driver task can run its due ticks.
        for _ in 0..200 {
            tokio::task::yield_now().await;
            if room.machine().current_id() == "gaming" {
                break;
            }
        }

        assert_eq!(room.machine().current_id(), "gaming");
        room.close();
    }

    /// Full round over a real room: spin starts the game, the driver runs
    /// the 5 s round down, exactly one GameEnd goes out, and the room is
    /// waiting again.
    #[tokio::test(start_paused = true)]
    async fn full_round_returns_the_room_to_waiting() {
        use crate::broadcast::RoomBroadcaster;

        let rooms = Arc::new(RoomRegistry::new());
        let sessions = Arc::new(crate::session::SessionRegistry::new());
        let broadcaster = Arc::new(RoomBroadcaster::new(rooms.clone(), sessions.clone()));

        let room = rooms.create_room(
            "r1".into(),
            "Room".into(),
            "slot_machine".into(),
            4,
            broadcaster,
        );
        let (session, conn) = test_support::session("s1");
        room.add_player(session.clone());

        // Acting while waiting starts the round and replays the spin.
        room.machine()
            .current()
            .handle_action(session.as_ref(), br#"{"type":"spin"}"#)
            .unwrap();
        assert_eq!(room.machine().current_id(), "gaming");

        // Let the driver tick the 5 s round to expiry (plus slack).
        tokio::time::sleep(Duration::from_millis(5_500)).await;

        let ids = conn.sent_ids();
        assert_eq!(ids.iter().filter(|&&id| id == MsgId::GameStart).count(), 1);
        assert_eq!(ids.iter().filter(|&&id| id == MsgId::GameSync).count(), 1);
        assert_eq!(ids.iter().filter(|&&id| id == MsgId::GameEnd).count(), 1);
        assert_eq!(room.machine().current_id(), "waiting");

        rooms.remove_room("r1");
    }

    #[tokio::test]
    async fn registry_create_get_remove() {
        let registry = RoomRegistry::new();
        let broadcaster: Arc<dyn Broadcaster> = Arc::new(NullBroadcaster);

        let room = registry.create_room(
            "r1".into(),
            "Room".into(),
            "slot_machine".into(),
            4,
            broadcaster,
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.get("r1").is_some());

        registry.remove_room("r1");
        assert!(registry.get("r1").is_none());
        assert!(room.is_closed());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn find_available_skips_full_and_non_waiting_rooms() {
        let registry = RoomRegistry::new();
        let broadcaster: Arc<dyn Broadcaster> = Arc::new(NullBroadcaster);

        let full = registry.create_room(
            "full".into(),
            "Full".into(),
            "slot_machine".into(),
            1,
            broadcaster.clone(),
        );
        let (session, _) = test_support::session("s1");
        full.add_player(session);

        let gaming = registry.create_room(
            "busy".into(),
            "Busy".into(),
            "slot_machine".into(),
            4,
            broadcaster.clone(),
        );
        gaming.set_status(RoomStatus::Gaming);

        assert!(registry.find_available().is_none());

        let open = registry.create_room(
            "open".into(),
            "Open".into(),
            "slot_machine".into(),
            4,
            broadcaster,
        );

        let found = registry.find_available().expect("open room is available");
        assert_eq!(found.id(), open.id());

        registry.remove_room("full");
        registry.remove_room("busy");
        registry.remove_room("open");
    }
}
