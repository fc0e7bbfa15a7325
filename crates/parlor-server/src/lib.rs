//! Parlor game session server.
//!
//! Production glue around [`parlor_core`]: a tokio TCP listener whose accept
//! loop wraps each stream in a framed connection, mints a session, and runs
//! the per-connection read loop that dispatches packets to rooms. A second
//! listener serves the admin surface.
//!
//! # Lifecycle
//!
//! Accept → session registered → read loop → dispatch per packet. On read
//! error or shutdown the loop exits, the session leaves the registry and
//! its room (the room is destroyed only once empty), and the connection is
//! closed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod admin;
pub mod config;
mod connection;
mod error;

use std::sync::Arc;

use parlor_core::{
    ConnectionError, Database, PlayerService, RoomBroadcaster, RoomRegistry, Session,
    SessionRegistry, StateError,
};
use parlor_proto::{MsgId, Packet, payloads};
use tokio::{net::TcpListener, sync::watch};
use uuid::Uuid;

pub use crate::{
    config::Config,
    connection::{PacketReader, TcpConnection},
    error::ServerError,
};

/// Handle for stopping a running server from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Signal shutdown: the accept loops stop and every read loop exits at
    /// its next boundary.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Shared runtime state handed to every connection task.
struct Shared {
    config: config::ServerConfig,
    sessions: Arc<SessionRegistry>,
    rooms: Arc<RoomRegistry>,
    broadcaster: Arc<RoomBroadcaster>,
}

/// The game session server.
pub struct GameServer {
    listener: TcpListener,
    admin_listener: TcpListener,
    shared: Arc<Shared>,
    player_service: Arc<PlayerService>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GameServer {
    /// Bind the game and admin listeners and wire up the registries.
    ///
    /// # Errors
    ///
    /// `ServerError::Io` when either address cannot be bound.
    pub async fn bind(config: Config, db: Arc<dyn Database>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.server.http_address).await?;
        let admin_listener = TcpListener::bind(&config.server.rpc_address).await?;

        // The broadcaster resolves rooms and sessions through the same
        // registries the dispatch path uses.
        let rooms = Arc::new(RoomRegistry::new());
        let sessions = Arc::new(SessionRegistry::new());
        let broadcaster = Arc::new(RoomBroadcaster::new(rooms.clone(), sessions.clone()));

        let shared = Arc::new(Shared {
            config: config.server.clone(),
            sessions,
            rooms,
            broadcaster,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            listener,
            admin_listener,
            shared,
            player_service: Arc::new(PlayerService::new(db)),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }

    /// Address the game listener is bound to.
    ///
    /// # Errors
    ///
    /// `ServerError::Io` when the socket is gone.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Address the admin listener is bound to.
    ///
    /// # Errors
    ///
    /// `ServerError::Io` when the socket is gone.
    pub fn admin_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        Ok(self.admin_listener.local_addr()?)
    }

    /// Handle for stopping this server.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { tx: self.shutdown_tx.clone() }
    }

    /// Run until shut down: accept connections and spawn a task per client.
    ///
    /// # Errors
    ///
    /// `ServerError::Io` on listener failure.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(
            addr = %self.listener.local_addr()?,
            admin = %self.admin_listener.local_addr()?,
            "game server listening"
        );

        tokio::spawn(admin::serve(
            self.admin_listener,
            self.player_service.clone(),
            self.shutdown_rx.clone(),
        ));

        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    tracing::info!("shutdown signalled, stopping accept loop");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let shared = self.shared.clone();
                            let shutdown_rx = self.shutdown_rx.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, shared, shutdown_rx).await;
                            });
                        }
                        Err(err) => tracing::error!(%err, "accept failed"),
                    }
                }
            }
        }
    }
}

/// Per-connection task: session lifecycle plus the read/dispatch loop.
async fn handle_connection(
    stream: tokio::net::TcpStream,
    shared: Arc<Shared>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (conn, mut reader) = TcpConnection::split(stream);
    let session = Arc::new(Session::new(Uuid::new_v4().to_string(), conn));
    shared.sessions.add(session.clone());

    tracing::info!(
        session = session.id(),
        peer = ?session.remote_addr(),
        "connection accepted"
    );

    loop {
        let packet = tokio::select! {
            _ = shutdown_rx.changed() => break,
            result = reader.read_packet() => match result {
                Ok(packet) => packet,
                Err(ConnectionError::Closed) => {
                    tracing::info!(session = session.id(), "peer closed connection");
                    break;
                }
                Err(err) => {
                    tracing::info!(session = session.id(), %err, "read failed");
                    break;
                }
            },
        };

        if packet.msg() == Some(MsgId::Heartbeat) {
            session.touch();
            reader.set_heartbeat(shared.config.heartbeat_interval());
            continue;
        }

        shared.handle_packet(&session, &packet);
    }

    shared.teardown(&session);
}

impl Shared {
    /// Dispatch one decoded packet.
    fn handle_packet(&self, session: &Arc<Session>, packet: &Packet) {
        match packet.msg() {
            Some(MsgId::CreateRoom) => self.handle_create_room(session),
            Some(MsgId::JoinRoom) => self.handle_join_room(session, &packet.payload),
            Some(MsgId::LeaveRoom) => self.handle_leave_room(session),
            Some(MsgId::PlayerAction) => self.handle_player_action(session, &packet.payload),
            Some(other) => {
                tracing::info!(session = session.id(), msg = %other, "unhandled message");
            }
            None => {
                tracing::info!(session = session.id(), msg_id = packet.msg_id, "unknown message id");
            }
        }
    }

    fn handle_create_room(&self, session: &Arc<Session>) {
        let room_id = Uuid::new_v4().to_string();
        let room = self.rooms.create_room(
            room_id.clone(),
            self.config.default_room_name.clone(),
            self.config.default_game_type.clone(),
            self.config.default_max_players,
            self.broadcaster.clone(),
        );
        room.add_player(session.clone());

        tracing::info!(session = session.id(), room = %room_id, "room created");

        match payloads::to_bytes(&payloads::RoomId { room_id }) {
            Ok(ack) => {
                if let Err(err) = session.send(MsgId::CreateRoom, &ack) {
                    tracing::warn!(session = session.id(), %err, "create-room ack failed");
                }
            }
            Err(err) => tracing::error!(%err, "create-room ack marshalling failed"),
        }
    }

    fn handle_join_room(&self, session: &Arc<Session>, payload: &[u8]) {
        let request: payloads::RoomId = match payloads::from_bytes(payload) {
            Ok(request) => request,
            Err(err) => {
                tracing::info!(session = session.id(), %err, "malformed join request");
                return;
            }
        };

        // No error packet on failure: the id table reserves no opcode for
        // one, so failures are logged and the connection stays open.
        let Some(room) = self.rooms.get(&request.room_id) else {
            tracing::info!(session = session.id(), room = %request.room_id, "join: no such room");
            return;
        };

        if room.add_player(session.clone()) {
            tracing::info!(session = session.id(), room = %request.room_id, "joined room");
        } else {
            tracing::warn!(session = session.id(), room = %request.room_id, "join: room full");
        }
    }

    fn handle_leave_room(&self, session: &Arc<Session>) {
        let room_id = session.room_id();
        if room_id.is_empty() {
            return;
        }

        if let Some(room) = self.rooms.get(&room_id) {
            room.remove_player(session.id());
            tracing::info!(session = session.id(), room = %room_id, "left room");
            self.remove_room_if_empty(&room_id);
        }
    }

    fn handle_player_action(&self, session: &Arc<Session>, payload: &[u8]) {
        let room_id = session.room_id();
        if room_id.is_empty() {
            tracing::warn!(session = session.id(), "action while not in a room");
            return;
        }

        let Some(room) = self.rooms.get(&room_id) else {
            tracing::error!(session = session.id(), room = %room_id, "action for missing room");
            return;
        };

        // Route to the room's *current* state; the state may swap itself
        // out (waiting starts a round on any action).
        let state = room.machine().current();
        match state.handle_action(session.as_ref(), payload) {
            Ok(()) => {}
            Err(StateError::MalformedAction(err)) => {
                tracing::info!(session = session.id(), %err, "malformed action dropped");
            }
            Err(err) => {
                tracing::error!(session = session.id(), room = %room_id, %err, "action failed");
            }
        }
    }

    /// Disconnect path: unregister, leave the room, close the transport.
    fn teardown(&self, session: &Arc<Session>) {
        tracing::info!(
            session = session.id(),
            peer = ?session.remote_addr(),
            "connection closed"
        );

        self.sessions.remove(session.id());

        let room_id = session.room_id();
        if !room_id.is_empty() {
            if let Some(room) = self.rooms.get(&room_id) {
                room.remove_player(session.id());
                self.remove_room_if_empty(&room_id);
            }
        }

        session.close();
    }

    /// Rooms live as long as they have members; the last one out turns off
    /// the lights.
    fn remove_room_if_empty(&self, room_id: &str) {
        if let Some(room) = self.rooms.get(room_id) {
            if room.player_count() == 0 {
                tracing::info!(room = %room_id, "room empty, destroying");
                self.rooms.remove_room(room_id);
            }
        }
    }
}
