//! Session state machine
//!
//! A `Session` owns exactly one TCP connection and runs two independent
//! axes over it:
//!
//! - a read loop that accumulates bytes until the `\n` delimiter and
//!   emits each formatted line to the hub, and
//! - a write loop that drains a FIFO outbox, started only on the
//!   Idle -> Writing transition in [`Session::post`].
//!
//! The first transport failure on either axis closes the session,
//! drops whatever is still queued, and emits a `Closed` event. Both
//! axes can fail separately, so the hub may see `Closed` twice; removal
//! there is idempotent.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::hub::HubCommand;
use crate::types::SessionId;

/// Write-axis state, transitioned deliberately rather than inferred
/// from queue emptiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    /// No write loop running; the outbox is empty.
    Idle,
    /// A write loop is draining the outbox.
    Writing,
    /// Terminal: a transport failure occurred on either axis.
    Closed,
}

/// FIFO outbox plus the write-axis state flag, guarded by one lock so
/// concurrent `post` calls are serialized against both.
#[derive(Debug)]
struct Outbox {
    queue: VecDeque<String>,
    state: WriteState,
}

/// Per-connection state machine
///
/// Created by the acceptor on a successful accept; the hub holds the
/// only long-lived strong handle. The session itself keeps just a
/// channel sender back to the hub, so there is no ownership cycle.
pub struct Session {
    id: SessionId,
    addr: SocketAddr,
    outbox: Mutex<Outbox>,
    /// Taken by the first (and only) `start` call.
    reader: Mutex<Option<OwnedReadHalf>>,
    /// Exclusive use is guaranteed by the Writing state flag; the lock
    /// exists because the write loop runs on a spawned task.
    writer: AsyncMutex<OwnedWriteHalf>,
    hub: mpsc::UnboundedSender<HubCommand>,
    /// Signals the read loop when the write axis closes the session.
    closed: Notify,
}

impl Session {
    /// Wrap an accepted connection. Fails only if the peer address is
    /// no longer available (the peer already vanished).
    pub fn new(
        stream: TcpStream,
        hub: mpsc::UnboundedSender<HubCommand>,
    ) -> std::io::Result<Arc<Self>> {
        let addr = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();

        Ok(Arc::new(Self {
            id: SessionId::new(),
            addr,
            outbox: Mutex::new(Outbox {
                queue: VecDeque::new(),
                state: WriteState::Idle,
            }),
            reader: Mutex::new(Some(reader)),
            writer: AsyncMutex::new(writer),
            hub,
            closed: Notify::new(),
        }))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Remote identity used to prefix relayed lines.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the read loop. Must be called exactly once; later calls
    /// are no-ops.
    pub fn start(self: &Arc<Self>) {
        let Some(reader) = self.reader.lock().unwrap().take() else {
            warn!(session = %self.id, "read loop already started");
            return;
        };
        tokio::spawn(Arc::clone(self).read_loop(reader));
    }

    /// Append a message to the outbox.
    ///
    /// Only the Idle -> Writing transition starts a write loop; a loop
    /// already running will pick the message up from the queue. Posting
    /// to a closed session drops the message silently.
    pub fn post(self: &Arc<Self>, message: impl Into<String>) {
        let message = message.into();
        let mut outbox = self.outbox.lock().unwrap();
        match outbox.state {
            WriteState::Closed => {}
            WriteState::Writing => outbox.queue.push_back(message),
            WriteState::Idle => {
                outbox.queue.push_back(message);
                outbox.state = WriteState::Writing;
                tokio::spawn(Arc::clone(self).write_loop());
            }
        }
    }

    /// Read axis: Reading -> Reading on each delimited line, terminal
    /// on the first transport failure (EOF included).
    async fn read_loop(self: Arc<Self>, reader: OwnedReadHalf) {
        let mut reader = BufReader::new(reader);
        // Unbounded by design: bytes accumulate until a delimiter shows up.
        let mut buf = Vec::new();

        loop {
            buf.clear();
            tokio::select! {
                result = reader.read_until(b'\n', &mut buf) => match result {
                    // A short read without the delimiter means the peer
                    // went away mid-line; the partial line is dropped.
                    Ok(n) if n == 0 || !buf.ends_with(b"\n") => break,
                    Ok(_) => {
                        let line = crate::message::relay_line(self.addr, &buf);
                        if self.hub.send(HubCommand::Line { from: self.id, line }).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(session = %self.id, error = %e, "read failed");
                        break;
                    }
                },
                // The write axis failed and closed the session.
                _ = self.closed.notified() => break,
            }
        }

        self.close();
        let _ = self.hub.send(HubCommand::Closed { id: self.id });
        debug!(session = %self.id, addr = %self.addr, "read loop ended");
    }

    /// Write axis: drains the outbox front-first, returning to Idle
    /// once empty. Runs at most once at a time.
    async fn write_loop(self: Arc<Self>) {
        loop {
            let next = {
                let mut outbox = self.outbox.lock().unwrap();
                if outbox.state != WriteState::Writing {
                    return;
                }
                match outbox.queue.front() {
                    Some(message) => message.clone(),
                    None => {
                        outbox.state = WriteState::Idle;
                        return;
                    }
                }
            };

            let result = {
                let mut writer = self.writer.lock().await;
                writer.write_all(next.as_bytes()).await
            };

            match result {
                Ok(()) => {
                    let mut outbox = self.outbox.lock().unwrap();
                    if outbox.state != WriteState::Writing {
                        return;
                    }
                    outbox.queue.pop_front();
                    if outbox.queue.is_empty() {
                        outbox.state = WriteState::Idle;
                        return;
                    }
                }
                Err(e) => {
                    debug!(session = %self.id, error = %e, "write failed");
                    self.close();
                    let _ = self.hub.send(HubCommand::Closed { id: self.id });
                    return;
                }
            }
        }
    }

    /// Transition to Closed, dropping undelivered messages. Idempotent;
    /// wakes the read loop so it stops reissuing reads.
    fn close(&self) {
        {
            let mut outbox = self.outbox.lock().unwrap();
            if outbox.state == WriteState::Closed {
                return;
            }
            outbox.state = WriteState::Closed;
            outbox.queue.clear();
        }
        // notify_one stores a permit, so the read loop sees this even
        // if it is not parked on `notified` yet.
        self.closed.notify_one();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .finish()
    }
}
