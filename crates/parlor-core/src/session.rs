//! Sessions and the process-wide session registry.
//!
//! A session is the server-side handle for one connected client: exactly one
//! session exists per accepted connection, created when the connection is
//! accepted and removed from the registry (and any room) on disconnect.
//! Handlers may mutate a session concurrently; all mutable state sits behind
//! the session's own lock.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::SystemTime,
};

use parlor_proto::MsgId;

use crate::{connection::Connection, error::ConnectionError, state::Player};

/// Mutable per-session state, serialized under one lock.
#[derive(Debug)]
struct SessionInner {
    /// Application user id; 0 until application logic sets it.
    user_id: i64,
    /// Id of the containing room; empty while not in a room. Non-empty iff
    /// some room's membership map holds this session's id.
    room_id: String,
    /// Free-form per-client key/value data for handlers.
    data: HashMap<String, serde_json::Value>,
    last_active: SystemTime,
}

/// Server-side handle for one connected client.
pub struct Session {
    /// Opaque unique id assigned at creation.
    id: String,
    /// Exclusively owned send side of the client's connection.
    conn: Arc<dyn Connection>,
    created_at: SystemTime,
    inner: RwLock<SessionInner>,
}

impl Session {
    /// Create a session for a freshly accepted connection. `created_at` and
    /// `last_active` start at now; the data map starts empty.
    pub fn new(id: String, conn: Arc<dyn Connection>) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            conn,
            created_at: now,
            inner: RwLock::new(SessionInner {
                user_id: 0,
                room_id: String::new(),
                data: HashMap::new(),
                last_active: now,
            }),
        }
    }

    /// Session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Send one packet to this client, refreshing `last_active` first.
    ///
    /// # Errors
    ///
    /// Propagates the connection's send error; broadcast callers treat it as
    /// non-fatal per recipient.
    pub fn send(&self, msg_id: MsgId, data: &[u8]) -> Result<(), ConnectionError> {
        self.touch();
        self.conn.send(msg_id, data)
    }

    /// Refresh the last-active timestamp (heartbeat handling).
    pub fn touch(&self) {
        self.write().last_active = SystemTime::now();
    }

    /// Last time this client sent traffic.
    pub fn last_active(&self) -> SystemTime {
        self.read().last_active
    }

    /// Store a handler-defined value under `key`.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.write().data.insert(key.into(), value);
    }

    /// Fetch a handler-defined value.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.read().data.get(key).cloned()
    }

    /// Application user id; 0 until set.
    pub fn user_id(&self) -> i64 {
        self.read().user_id
    }

    /// Bind this session to an application user.
    pub fn set_user_id(&self, user_id: i64) {
        self.write().user_id = user_id;
    }

    /// Id of the containing room; empty when not in a room.
    pub fn room_id(&self) -> String {
        self.read().room_id.clone()
    }

    /// Set or clear room membership. Called by the room under its player
    /// lock; nothing else should write this field.
    pub(crate) fn set_room_id(&self, room_id: impl Into<String>) {
        self.write().room_id = room_id.into();
    }

    /// Best-effort peer address for logs.
    pub fn remote_addr(&self) -> Option<std::net::SocketAddr> {
        self.conn.remote_addr()
    }

    /// Close the underlying connection.
    pub fn close(&self) {
        self.conn.close();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Player for Session {
    fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id())
            .field("room_id", &self.room_id())
            .finish_non_exhaustive()
    }
}

/// Process-wide `session id → session` map with a secondary user-id view.
///
/// The user-id view is a linear scan: membership sizes are modest and the
/// scan keeps add/remove O(1). Replace with an index if that stops holding.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its id.
    pub fn add(&self, session: Arc<Session>) {
        self.write().insert(session.id().to_string(), session);
    }

    /// Remove a session by id. No-op when absent.
    pub fn remove(&self, session_id: &str) {
        self.write().remove(session_id);
    }

    /// Look up a session by id.
    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.read().get(session_id).cloned()
    }

    /// All sessions currently bound to `user_id`.
    pub fn get_by_user_id(&self, user_id: i64) -> Vec<Arc<Session>> {
        self.read().values().filter(|s| s.user_id() == user_id).cloned().collect()
    }

    /// Snapshot of every registered session.
    pub fn all(&self) -> Vec<Arc<Session>> {
        self.read().values().cloned().collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").field("session_count", &self.len()).finish()
    }
}
