//! Session–room–state-machine runtime for the parlor game session server.
//!
//! This crate owns the shared-state core the server glue drives:
//!
//! - [`Session`] / [`SessionRegistry`]: one session per accepted connection,
//!   with the process-wide id map and a secondary user-id view.
//! - [`Room`] / [`RoomRegistry`]: membership, business status, the owned
//!   state machine, and the 100 ms per-room driver task.
//! - [`StateMachine`] and the concrete [`WaitingState`] / [`GamingState`]
//!   game phases, including the sample slot-machine plug-in.
//! - [`Broadcaster`] / [`RoomBroadcaster`]: in-process fan-out of packets to
//!   room members, users, or everyone.
//! - [`Database`]: the persistence façade (a collaborator - stubbed in
//!   memory here) plus the [`PlayerService`] built on top of it.
//!
//! # Concurrency
//!
//! One lightweight task per connection drives reads; one task per room
//! drives ticks; sends run on the caller's task. Correctness rests on a
//! fixed lock order: registry → room → (machine | players | status) →
//! gaming-state data. The broadcaster is never called while a room's player
//! write lock is held, and no lock is held across a send.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broadcast;
pub mod connection;
pub mod error;
pub mod models;
pub mod room;
pub mod service;
pub mod session;
pub mod state;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use broadcast::{Broadcaster, RoomBroadcaster};
pub use connection::Connection;
pub use error::{BroadcastError, ConnectionError, StateError, StorageError};
pub use room::{Room, RoomRegistry, RoomStatus};
pub use service::{PlayerService, PlayerWithStats};
pub use session::{Session, SessionRegistry};
pub use state::{GamingState, Player, RoomContext, State, StateMachine, WaitingState};
pub use storage::{Database, MemoryDatabase};
