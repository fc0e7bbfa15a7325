//! Framed TCP connection: split reader/writer with serialized writes.
//!
//! The stream is split at accept time. All outbound frames go through one
//! unbounded channel drained by a dedicated writer task, so concurrent
//! senders are serialized and frames never interleave on the wire - the
//! same single-ordered-stream discipline the broadcast path depends on.
//! The read half stays with the accept loop's read task, which is the only
//! reader.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use parlor_core::{Connection, ConnectionError};
use parlor_proto::{MsgId, Packet};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
};

enum WriterCmd {
    Frame(Bytes),
    Shutdown,
}

/// Send side of one client connection.
///
/// Cheap to share; sessions hold it as their `Connection`. Dropping every
/// handle (or calling [`TcpConnection::close`]) stops the writer task and
/// shuts the socket's write direction down.
pub struct TcpConnection {
    outbound: mpsc::UnboundedSender<WriterCmd>,
    peer: Option<SocketAddr>,
    closed: AtomicBool,
}

impl TcpConnection {
    /// Split an accepted stream into the shared send handle and the
    /// exclusive packet reader, spawning the writer task.
    pub fn split(stream: TcpStream) -> (Arc<Self>, PacketReader) {
        let peer = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();
        let (outbound, rx) = mpsc::unbounded_channel();

        tokio::spawn(write_loop(write_half, rx));

        let conn = Arc::new(Self { outbound, peer, closed: AtomicBool::new(false) });
        (conn, PacketReader { read: read_half, deadline: None })
    }
}

impl Connection for TcpConnection {
    fn send(&self, msg_id: MsgId, data: &[u8]) -> Result<(), ConnectionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnectionError::Closed);
        }

        let packet = Packet::new(msg_id, Bytes::copy_from_slice(data))?;

        self.outbound
            .send(WriterCmd::Frame(packet.to_bytes()))
            .map_err(|_| ConnectionError::Closed)
    }

    fn close(&self) {
        // Repeated closes just enqueue another no-op shutdown.
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.outbound.send(WriterCmd::Shutdown);
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

/// Drain outbound frames onto the socket until shutdown or a write error.
async fn write_loop(mut write: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<WriterCmd>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WriterCmd::Frame(frame) => {
                if let Err(err) = write.write_all(&frame).await {
                    tracing::debug!(%err, "connection write failed");
                    break;
                }
            }
            WriterCmd::Shutdown => break,
        }
    }

    let _ = write.shutdown().await;
}

/// Exclusive read half of a connection.
pub struct PacketReader {
    read: OwnedReadHalf,
    deadline: Option<tokio::time::Instant>,
}

impl PacketReader {
    /// Arm (or re-arm) the read deadline at `now + 2 * interval`. The
    /// dispatch loop calls this on every received heartbeat.
    pub fn set_heartbeat(&mut self, interval: Duration) {
        self.deadline = Some(tokio::time::Instant::now() + 2 * interval);
    }

    /// Read one fully framed packet.
    ///
    /// # Errors
    ///
    /// `ConnectionError::Closed` on EOF, `ConnectionError::Timeout` once the
    /// heartbeat deadline elapses, `ConnectionError::Transport` on other
    /// socket failures.
    pub async fn read_packet(&mut self) -> Result<Packet, ConnectionError> {
        let mut header = [0u8; Packet::HEADER_LEN];
        self.read_exact(&mut header).await?;

        let (msg_id, length) = Packet::read_header(header);

        let mut payload = vec![0u8; length as usize];
        if length > 0 {
            self.read_exact(&mut payload).await?;
        }

        Ok(Packet::from_raw(msg_id, payload)?)
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ConnectionError> {
        match self.deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, self.read.read_exact(buf)).await {
                    Ok(result) => {
                        result?;
                        Ok(())
                    }
                    Err(_) => Err(ConnectionError::Timeout),
                }
            }
            None => {
                self.read.read_exact(buf).await?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    /// Loopback pair: (accepted server stream, client stream).
    async fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn send_frames_arrive_intact() {
        let (server, client) = tcp_pair().await;
        let (conn, _reader) = TcpConnection::split(server);
        let (_, mut peer_reader) = TcpConnection::split(client);

        conn.send(MsgId::GameStart, b"hello").unwrap();

        let packet = peer_reader.read_packet().await.unwrap();
        assert_eq!(packet.msg(), Some(MsgId::GameStart));
        assert_eq!(&packet.payload[..], b"hello");
    }

    #[tokio::test]
    async fn concurrent_sends_never_interleave() {
        let (server, client) = tcp_pair().await;
        let (conn, _reader) = TcpConnection::split(server);
        let (_, mut peer_reader) = TcpConnection::split(client);

        const SENDERS: usize = 8;
        const PER_SENDER: usize = 25;

        let handles: Vec<_> = (0..SENDERS)
            .map(|i| {
                let conn = conn.clone();
                tokio::spawn(async move {
                    for j in 0..PER_SENDER {
                        // Distinct payload per frame; length varies too.
                        let payload = format!("sender-{i}-frame-{j}");
                        conn.send(MsgId::GameSync, payload.as_bytes()).unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        // Every frame decodes cleanly and the full set arrives exactly once;
        // any interleaving would corrupt the framing.
        let mut seen = std::collections::HashSet::new();
        for _ in 0..SENDERS * PER_SENDER {
            let packet = peer_reader.read_packet().await.unwrap();
            assert_eq!(packet.msg(), Some(MsgId::GameSync));
            assert!(seen.insert(packet.payload.clone()), "duplicate frame");
        }
        assert_eq!(seen.len(), SENDERS * PER_SENDER);
    }

    #[tokio::test]
    async fn send_after_close_is_rejected_and_second_close_is_fine() {
        let (server, _client) = tcp_pair().await;
        let (conn, _reader) = TcpConnection::split(server);

        conn.close();
        conn.close();

        assert_eq!(conn.send(MsgId::Heartbeat, b"").unwrap_err(), ConnectionError::Closed);
    }

    #[tokio::test]
    async fn peer_close_surfaces_as_closed() {
        let (server, client) = tcp_pair().await;
        let (_conn, mut reader) = TcpConnection::split(server);

        drop(client);

        assert_eq!(reader.read_packet().await.unwrap_err(), ConnectionError::Closed);
    }

    #[tokio::test]
    async fn heartbeat_deadline_expires_reads() {
        let (server, _client) = tcp_pair().await;
        let (_conn, mut reader) = TcpConnection::split(server);

        // 2 * 50 ms deadline against a silent peer.
        reader.set_heartbeat(Duration::from_millis(50));

        let start = std::time::Instant::now();
        let err = reader.read_packet().await.unwrap_err();
        assert_eq!(err, ConnectionError::Timeout);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn heartbeat_rearm_extends_the_deadline() {
        let (server, client) = tcp_pair().await;
        let (_conn, mut reader) = TcpConnection::split(server);
        let (peer, _peer_reader) = TcpConnection::split(client);

        // First arm: deadline at 400 ms.
        reader.set_heartbeat(Duration::from_millis(200));

        tokio::time::sleep(Duration::from_millis(300)).await;
        peer.send(MsgId::Heartbeat, b"").unwrap();

        let packet = reader.read_packet().await.unwrap();
        assert_eq!(packet.msg(), Some(MsgId::Heartbeat));
        reader.set_heartbeat(Duration::from_millis(200));

        tokio::time::sleep(Duration::from_millis(300)).await;
        peer.send(MsgId::Heartbeat, b"").unwrap();
        // ~600 ms after the first arm: dead under the original deadline,
        // alive under the re-armed one.
        assert!(reader.read_packet().await.is_ok());
    }

    #[tokio::test]
    async fn remote_addr_is_the_peer() {
        let (server, client) = tcp_pair().await;
        let local = client.local_addr().unwrap();
        let (conn, _reader) = TcpConnection::split(server);

        assert_eq!(conn.remote_addr(), Some(local));
    }
}
