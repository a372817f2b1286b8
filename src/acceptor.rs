//! Connection acceptor
//!
//! Drives the unbounded accept loop and wires each accepted connection
//! into the hub: welcome the newcomer, announce it to everyone already
//! registered, register it, then start its read loop.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::error::RelayError;
use crate::hub::HubCommand;
use crate::message;
use crate::session::Session;

/// Accept-loop component
pub struct Acceptor {
    listener: TcpListener,
    hub: mpsc::UnboundedSender<HubCommand>,
}

impl Acceptor {
    /// Create an acceptor over an already-bound listener
    pub fn new(listener: TcpListener, hub: mpsc::UnboundedSender<HubCommand>) -> Self {
        Self { listener, hub }
    }

    /// Run the accept loop indefinitely
    ///
    /// Per-connection setup failures are logged and skipped; the loop
    /// itself never returns.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    if let Err(e) = self.accept_session(stream) {
                        error!("Failed to set up session: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Wire one accepted connection into the hub.
    ///
    /// The join notice is broadcast BEFORE the new session is
    /// registered, so the joiner never receives its own notice; the
    /// hub processes both commands in order.
    fn accept_session(&self, stream: TcpStream) -> Result<(), RelayError> {
        let session = Session::new(stream, self.hub.clone())?;

        session.post(message::WELCOME);
        self.hub
            .send(HubCommand::Post {
                message: message::JOIN_NOTICE.into(),
            })
            .map_err(|_| RelayError::HubClosed)?;
        self.hub
            .send(HubCommand::Register {
                session: Arc::clone(&session),
            })
            .map_err(|_| RelayError::HubClosed)?;
        session.start();

        Ok(())
    }
}
