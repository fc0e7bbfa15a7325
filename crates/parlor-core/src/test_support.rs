//! Shared test doubles for the core crate's unit tests.

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use parlor_proto::MsgId;

use crate::{connection::Connection, error::ConnectionError, session::Session};

/// Connection double that records every packet sent through it.
#[derive(Default)]
pub struct RecordingConnection {
    sent: Mutex<Vec<(MsgId, Vec<u8>)>>,
    fail_sends: AtomicBool,
    closed: AtomicBool,
}

impl RecordingConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent `send` fail, as a dead peer would.
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(MsgId, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_ids(&self) -> Vec<MsgId> {
        self.sent().into_iter().map(|(id, _)| id).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connection for RecordingConnection {
    fn send(&self, msg_id: MsgId, data: &[u8]) -> Result<(), ConnectionError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ConnectionError::Transport("simulated send failure".into()));
        }
        self.sent.lock().unwrap().push((msg_id, data.to_vec()));
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Session with a fresh recording connection.
pub fn session(id: &str) -> (Arc<Session>, Arc<RecordingConnection>) {
    let conn = RecordingConnection::new();
    (Arc::new(Session::new(id.to_string(), conn.clone())), conn)
}
