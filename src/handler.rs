//! Per-connection inbound reader and handshake
//!
//! One handler task per accepted connection: request a nickname,
//! resolve and register it, start the dispatcher, then forward every
//! received line to the observer until the connection ends.

use std::sync::Arc;

use rand::Rng;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::dispatcher::run_dispatcher;
use crate::error::RelayError;
use crate::protocol;
use crate::registry::Registry;
use crate::session::Session;

/// Grace period for the dispatcher to drain after the reader ends
const DRAIN_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

/// Drive one connection from accept to teardown.
///
/// Errors returned here are per-connection: the accept loop logs them
/// and moves on.
pub async fn handle_connection(
    stream: TcpStream,
    registry: Arc<Registry>,
    config: ServerConfig,
) -> Result<(), RelayError> {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    debug!("new connection from {}", peer);

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    // AwaitingNick. The dispatcher is not running yet, so the handshake
    // writes directly to the socket.
    write_half.write_all(protocol::REQUEST_NICK.as_bytes()).await?;
    write_half.write_all(b"\n").await?;

    let mut line = String::new();
    let n = match timeout(config.idle_timeout, reader.read_line(&mut line)).await {
        Ok(result) => result?,
        Err(_) => {
            debug!("{} sent no nickname within {:?}", peer, config.idle_timeout);
            return Ok(());
        }
    };
    if n == 0 {
        debug!("{} disconnected during handshake", peer);
        return Ok(());
    }

    let proposed = match line.trim() {
        "" => generate_guest_nickname(),
        name => name.to_string(),
    };

    // Resolution and registration are one critical section inside the
    // registry; from here the session is visible to relay calls.
    let (queue_tx, queue_rx) = tokio::sync::mpsc::channel(config.queue_capacity);
    let session = registry.register_unique(&proposed, queue_tx);

    let reply = if session.nickname() == proposed {
        protocol::nick_accepted_line(session.nickname())
    } else {
        protocol::nick_assigned_line(session.nickname())
    };
    if let Err(e) = write_half.write_all(format!("{}\n", reply).as_bytes()).await {
        teardown(&registry, &session);
        return Err(e.into());
    }

    info!("{} registered as '{}'", peer, session.nickname());

    let mut dispatcher = tokio::spawn(run_dispatcher(
        session.clone(),
        queue_rx,
        write_half,
    ));

    // Active: forward lines until quit, EOF, read error, or the
    // dispatcher stops (kick, reap, or write failure).
    loop {
        line.clear();
        tokio::select! {
            result = reader.read_line(&mut line) => match result {
                Ok(0) => {
                    debug!("'{}' reached EOF", session.nickname());
                    break;
                }
                Ok(_) => {
                    let text = line.trim();
                    if text.is_empty() {
                        continue;
                    }
                    if protocol::is_quit(text) {
                        debug!("'{}' sent quit", session.nickname());
                        break;
                    }
                    session.touch();
                    registry.observer().on_client_message(session.nickname(), text);
                }
                Err(e) => {
                    warn!("read from '{}' failed: {}", session.nickname(), e);
                    break;
                }
            },
            _ = &mut dispatcher => break,
        }
    }

    session.close();
    if !dispatcher.is_finished() {
        let _ = timeout(DRAIN_GRACE, &mut dispatcher).await;
    }
    dispatcher.abort();
    teardown(&registry, &session);
    Ok(())
}

/// Closed. Safe to call from racing paths; the registry notifies
/// departure only for the removal that actually happened.
fn teardown(registry: &Registry, session: &Session) {
    session.close();
    registry.unregister(session.nickname());
    session.mark_closed();
    info!("'{}' disconnected", session.nickname());
}

/// Placeholder nickname for clients that propose an empty one
fn generate_guest_nickname() -> String {
    format!("Guest-{}", rand::thread_rng().gen_range(1000..10000))
}
