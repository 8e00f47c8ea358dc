//! Error types for the relay server
//!
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Relay-level errors
///
/// `Bind` is the only fatal condition; everything else is local to a
/// single session or a single relay call.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Listener could not be created (port in use, permission denied)
    #[error("cannot start: failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// IO error on a connection or while reading a file to relay
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Nickname already registered (strict `register` only)
    #[error("nickname already taken: {0}")]
    NicknameTaken(String),

    /// Outbound queue full or dispatcher gone
    #[error("session '{0}' cannot accept frames")]
    SessionClosed(String),

    /// Malformed frame on the receive path
    #[error("protocol violation: {0}")]
    Protocol(String),
}
