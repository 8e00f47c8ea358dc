//! Operator-notification interface
//!
//! The server reports joins, leaves, and forwarded client messages to a
//! single injected observer. Delivery is synchronous fire-and-forget:
//! no acknowledgment, no backpressure into the relay. Implementations
//! must therefore return quickly.

use tracing::info;

/// Callbacks invoked by the server on registry and forwarding events.
///
/// One observer per server instance, injected at construction.
pub trait RelayObserver: Send + Sync {
    /// A session was registered under `nickname`
    fn on_join(&self, nickname: &str);

    /// The session registered under `nickname` was removed
    fn on_leave(&self, nickname: &str);

    /// A registered client sent a text line
    fn on_client_message(&self, nickname: &str, text: &str);
}

/// Observer that ignores every event
#[derive(Debug, Default)]
pub struct NoopObserver;

impl RelayObserver for NoopObserver {
    fn on_join(&self, _nickname: &str) {}
    fn on_leave(&self, _nickname: &str) {}
    fn on_client_message(&self, _nickname: &str, _text: &str) {}
}

/// Observer that logs every event via tracing
///
/// Used by the standalone binary, where no operator console is attached.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl RelayObserver for LoggingObserver {
    fn on_join(&self, nickname: &str) {
        info!("client '{}' joined", nickname);
    }

    fn on_leave(&self, nickname: &str) {
        info!("client '{}' left", nickname);
    }

    fn on_client_message(&self, nickname: &str, text: &str) {
        info!("[{}] {}", nickname, text);
    }
}
