//! Hub actor implementation
//!
//! The central actor owning the registry of live sessions. It is the
//! sole holder of long-lived strong handles; sessions reach back only
//! through the command channel. All registry mutation goes through the
//! actor loop, so no locks are needed around the map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::message;
use crate::session::Session;
use crate::types::SessionId;

/// Commands sent to the Hub actor by the acceptor and by session
/// read/write loops.
#[derive(Debug)]
pub enum HubCommand {
    /// Add a session to the registry. Precondition: not already present.
    Register { session: Arc<Session> },
    /// Broadcast a message to every registered session.
    Post { message: String },
    /// A session read a full line from its peer.
    Line { from: SessionId, line: String },
    /// A session hit a transport failure on its read or write axis.
    /// Emitted once per failed axis, so it can arrive twice for the
    /// same session.
    Closed { id: SessionId },
}

/// The session registry and broadcast authority
pub struct Hub {
    /// All registered sessions: SessionId -> Session
    sessions: HashMap<SessionId, Arc<Session>>,
    /// Command receiver channel
    receiver: mpsc::UnboundedReceiver<HubCommand>,
}

impl Hub {
    /// Create a new Hub with the given command receiver
    pub fn new(receiver: mpsc::UnboundedReceiver<HubCommand>) -> Self {
        Self {
            sessions: HashMap::new(),
            receiver,
        }
    }

    /// Run the Hub event loop
    ///
    /// Continuously processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("Hub started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("Hub shutting down");
    }

    fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register { session } => self.handle_register(session),
            HubCommand::Post { message } => self.broadcast(&message),
            HubCommand::Line { from, line } => self.handle_line(from, line),
            HubCommand::Closed { id } => self.handle_closed(id),
        }
    }

    fn handle_register(&mut self, session: Arc<Session>) {
        let id = session.id();
        info!(session = %id, addr = %session.addr(), "session registered");

        if self.sessions.insert(id, session).is_some() {
            warn!(session = %id, "session was already registered");
        }
        debug!("Total sessions: {}", self.sessions.len());
    }

    /// Relay a received line to the whole registry. The sender was
    /// registered before it could ever produce a line, so it receives
    /// its own echo; that matches the original wire behavior.
    fn handle_line(&mut self, from: SessionId, line: String) {
        debug!(session = %from, "relaying line");
        self.broadcast(&line);
    }

    /// Remove a session from the registry.
    ///
    /// Idempotent: a session whose read and write axes failed separately
    /// reports closure twice, but the departure notice goes out only on
    /// the present -> absent transition.
    fn handle_closed(&mut self, id: SessionId) {
        if self.sessions.remove(&id).is_none() {
            return;
        }

        info!(session = %id, "session removed");
        debug!("Total sessions: {}", self.sessions.len());
        self.broadcast(message::DEPART_NOTICE);
    }

    /// Enqueue a message on every registered session. Only enqueues;
    /// the sessions' own write loops do the IO.
    fn broadcast(&self, message: &str) {
        for session in self.sessions.values() {
            session.post(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    const TICK: Duration = Duration::from_secs(1);

    /// Spawn a Hub and return its command sender.
    fn spawn_hub() -> mpsc::UnboundedSender<HubCommand> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Hub::new(rx).run());
        tx
    }

    /// A registered session plus the client end of its socket.
    async fn register_session(
        hub: &mpsc::UnboundedSender<HubCommand>,
    ) -> (Arc<Session>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();

        let session = Session::new(server, hub.clone()).unwrap();
        hub.send(HubCommand::Register {
            session: Arc::clone(&session),
        })
        .unwrap();
        (session, client)
    }

    async fn read_exactly(stream: &mut TcpStream, len: usize) -> String {
        let mut buf = vec![0u8; len];
        timeout(TICK, stream.read_exact(&mut buf))
            .await
            .expect("timed out")
            .expect("read failed");
        String::from_utf8(buf).unwrap()
    }

    async fn assert_silent(stream: &mut TcpStream) {
        let mut buf = [0u8; 1];
        assert!(
            timeout(Duration::from_millis(200), stream.read(&mut buf))
                .await
                .is_err(),
            "expected no further bytes"
        );
    }

    #[tokio::test]
    async fn test_post_reaches_every_session() {
        let hub = spawn_hub();
        let (_a, mut client_a) = register_session(&hub).await;
        let (_b, mut client_b) = register_session(&hub).await;

        hub.send(HubCommand::Post {
            message: "hello all\n".into(),
        })
        .unwrap();

        assert_eq!(read_exactly(&mut client_a, 10).await, "hello all\n");
        assert_eq!(read_exactly(&mut client_b, 10).await, "hello all\n");
    }

    #[tokio::test]
    async fn test_line_is_echoed_to_sender_too() {
        let hub = spawn_hub();
        let (a, mut client_a) = register_session(&hub).await;
        let (_b, mut client_b) = register_session(&hub).await;

        let line = format!("{} : hi\n", a.addr());
        hub.send(HubCommand::Line {
            from: a.id(),
            line: line.clone(),
        })
        .unwrap();

        // Full-registry relay: the sender gets its own line back.
        assert_eq!(read_exactly(&mut client_a, line.len()).await, line);
        assert_eq!(read_exactly(&mut client_b, line.len()).await, line);
    }

    #[tokio::test]
    async fn test_departure_notice_sent_exactly_once() {
        let hub = spawn_hub();
        let (a, _client_a) = register_session(&hub).await;
        let (_b, mut client_b) = register_session(&hub).await;

        // Read and write axes both failed: two Closed reports.
        hub.send(HubCommand::Closed { id: a.id() }).unwrap();
        hub.send(HubCommand::Closed { id: a.id() }).unwrap();

        let notice = message::DEPART_NOTICE;
        assert_eq!(read_exactly(&mut client_b, notice.len()).await, notice);
        assert_silent(&mut client_b).await;
    }

    #[tokio::test]
    async fn test_removed_session_no_longer_receives_posts() {
        let hub = spawn_hub();
        let (a, mut client_a) = register_session(&hub).await;

        hub.send(HubCommand::Closed { id: a.id() }).unwrap();
        hub.send(HubCommand::Post {
            message: "after removal\n".into(),
        })
        .unwrap();

        assert_silent(&mut client_a).await;
    }
}
