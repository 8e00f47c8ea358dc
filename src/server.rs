//! RelayServer: listener, registry, and the operator-facing relay API
//!
//! One `RelayServer` is one independent instance: its own registry, its
//! own injected observer, its own listener and reaper. Relay calls
//! look up sessions and enqueue frames; they never perform socket I/O
//! on the caller's task.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::RelayError;
use crate::handler::handle_connection;
use crate::observer::RelayObserver;
use crate::protocol::Frame;
use crate::reaper::run_reaper;
use crate::registry::Registry;
use crate::session::Session;

/// Sender name used for server-originated notices (kick reasons)
const SERVER_SENDER: &str = "server";

/// One relay server instance
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<Registry>,
}

impl RelayServer {
    pub fn new(config: ServerConfig, observer: Arc<dyn RelayObserver>) -> Self {
        Self {
            config,
            registry: Arc::new(Registry::new(observer)),
        }
    }

    /// Bind the listener and spawn the accept loop and the reaper.
    ///
    /// Returns the bound address (useful with port 0). A bind failure
    /// leaves no partial state behind: nothing has been spawned yet.
    pub async fn start(&self) -> Result<SocketAddr, RelayError> {
        let addr = format!("0.0.0.0:{}", self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| RelayError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        info!("relay server listening on {}", local_addr);

        tokio::spawn(run_reaper(
            self.registry.clone(),
            self.config.idle_timeout,
            self.config.reap_interval,
        ));

        tokio::spawn(accept_loop(
            listener,
            self.registry.clone(),
            self.config.clone(),
        ));

        Ok(local_addr)
    }

    /// Enqueue a text frame on the named session. Silent no-op if the
    /// nickname is not registered.
    pub fn send_to_client(&self, nickname: &str, sender: &str, text: &str) {
        if let Some(session) = self.registry.lookup(nickname) {
            self.enqueue_or_drop(
                &session,
                Frame::Text {
                    sender: sender.to_string(),
                    text: text.to_string(),
                },
            );
        }
    }

    /// Enqueue a text frame on every session registered at call time.
    ///
    /// Best-effort: sessions joining after the snapshot are not
    /// included, and a session leaving mid-broadcast may miss it.
    pub fn broadcast(&self, sender: &str, text: &str) {
        for session in self.registry.snapshot() {
            self.enqueue_or_drop(
                &session,
                Frame::Text {
                    sender: sender.to_string(),
                    text: text.to_string(),
                },
            );
        }
    }

    /// Send a file to the named session, inline or streamed depending
    /// on size. No-op if the nickname is not registered.
    pub async fn send_file_to_client(
        &self,
        nickname: &str,
        sender: &str,
        path: &Path,
    ) -> Result<(), RelayError> {
        let Some(session) = self.registry.lookup(nickname) else {
            return Ok(());
        };
        let frame = self.file_frame(sender, path).await?;
        self.enqueue_or_drop(&session, frame);
        Ok(())
    }

    /// Send a file to every session registered at call time, with the
    /// same delivery semantics as [`broadcast`].
    ///
    /// [`broadcast`]: RelayServer::broadcast
    pub async fn broadcast_file(&self, sender: &str, path: &Path) -> Result<(), RelayError> {
        let frame = self.file_frame(sender, path).await?;
        for session in self.registry.snapshot() {
            self.enqueue_or_drop(&session, frame.clone());
        }
        Ok(())
    }

    /// Enqueue a final notice, then close and unregister the session.
    ///
    /// The registry reflects the kick before this returns; the notice
    /// drains through the dispatcher ahead of the close.
    pub fn kick_client(&self, nickname: &str, reason: &str) {
        let Some(session) = self.registry.lookup(nickname) else {
            return;
        };
        info!("kicking '{}': {}", nickname, reason);
        let _ = session.enqueue(Frame::Text {
            sender: SERVER_SENDER.to_string(),
            text: format!("you have been kicked: {}", reason),
        });
        session.close();
        self.registry.unregister(nickname);
    }

    /// Snapshot of currently registered nicknames
    pub fn client_nicknames(&self) -> Vec<String> {
        self.registry.all_nicknames()
    }

    /// Build the frame for one file per the size threshold: at or
    /// below it the whole payload travels in one encoded line, above
    /// it only a reference is queued and the dispatcher streams the
    /// bytes.
    async fn file_frame(&self, sender: &str, path: &Path) -> Result<Frame, RelayError> {
        let len = fs::metadata(path).await?.len();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        if len <= self.config.inline_threshold {
            let payload = fs::read(path).await?;
            Ok(Frame::FileInline {
                sender: sender.to_string(),
                filename,
                payload,
            })
        } else {
            Ok(Frame::FileStream {
                sender: sender.to_string(),
                filename,
                path: path.to_path_buf(),
                len,
            })
        }
    }

    /// Slow-consumer policy: a session whose queue cannot take the
    /// frame is disconnected rather than letting producers block or
    /// the queue grow without bound.
    fn enqueue_or_drop(&self, session: &Arc<Session>, frame: Frame) {
        if let Err(e) = session.enqueue(frame) {
            warn!("dropping slow consumer: {}", e);
            session.close();
            self.registry.unregister(session.nickname());
        }
    }
}

/// Accept connections until the listener task is dropped with the
/// runtime. Accept errors are logged and do not stop the loop.
async fn accept_loop(listener: TcpListener, registry: Arc<Registry>, config: ServerConfig) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let registry = registry.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, registry, config).await {
                        warn!("connection from {} ended with error: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("accept failed: {}", e);
            }
        }
    }
}
