//! TCP Line-Chat Relay Library
//!
//! A chat relay that accepts TCP connections, reads newline-delimited
//! lines from each, and fans every line out to all connected peers,
//! prefixed with the sender's remote address.
//!
//! # Architecture
//! Three components wired over `mpsc` channels:
//! - `Acceptor` drives the accept loop and wires each connection up
//! - `Session` owns one connection: an independent read loop plus a
//!   FIFO write loop over a per-session outbox
//! - `Hub` is the central actor owning the session registry; all
//!   broadcast and removal goes through its command channel
//!
//! The hub holds the only long-lived strong handles to sessions;
//! sessions hold just a command sender back to the hub.
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use chat_relay::{Acceptor, Hub};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:15001").await.unwrap();
//!     let (tx, rx) = mpsc::unbounded_channel();
//!
//!     tokio::spawn(Hub::new(rx).run());
//!     Acceptor::new(listener, tx).run().await;
//! }
//! ```

pub mod acceptor;
pub mod error;
pub mod hub;
pub mod message;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use acceptor::Acceptor;
pub use error::RelayError;
pub use hub::{Hub, HubCommand};
pub use session::Session;
pub use types::SessionId;
