//! Error types for the relay
//!
//! Uses thiserror for ergonomic error definitions.
//!
//! Transport failures on individual connections are handled locally by
//! the session (close + removal) and never surface through this type;
//! `RelayError` covers only the errors that propagate to a caller.

use thiserror::Error;

/// Errors that propagate out of the acceptor or entry point
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO error (fatal when raised by the listener)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Hub command channel closed (fatal - hub actor is gone)
    #[error("hub channel closed")]
    HubClosed,
}
