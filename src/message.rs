//! Wire message definitions
//!
//! The protocol is plain text: newline-delimited lines with no framing,
//! length prefix, or content validation. Server notices are fixed strings
//! terminated with `\n\r`; relayed lines carry the sender's own line
//! terminator through verbatim.

use std::net::SocketAddr;

/// Sent to a client right after its connection is accepted.
pub const WELCOME: &str = "Welcome to chat\n\r";

/// Broadcast to previously registered clients when a new one connects.
pub const JOIN_NOTICE: &str = "We have a new user connected!\n\r";

/// Broadcast to remaining clients when a session is removed.
pub const DEPART_NOTICE: &str = "One user has disconnected\n\r";

/// Format an incoming line for relay.
///
/// `raw` is the byte run up to and including the `\n` delimiter, exactly
/// as read from the sender; non-UTF-8 bytes are replaced rather than
/// rejected. The result is `"<sender addr:port> : <line>"` with the
/// sender's terminator still attached.
pub fn relay_line(from: SocketAddr, raw: &[u8]) -> String {
    format!("{} : {}", from, String::from_utf8_lossy(raw))
}
