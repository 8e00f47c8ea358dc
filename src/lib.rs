//! Line-oriented TCP relay server
//!
//! Relays text and files between many transient client connections and
//! a single privileged operator over a hand-rolled, line-oriented
//! protocol on one TCP listener.
//!
//! # Architecture
//! Task-per-concern on tokio:
//! - one inbound reader task per connection (handshake, then line
//!   forwarding),
//! - one outbound dispatcher task per connection (the only writer to
//!   that socket),
//! - one accept loop and one idle reaper per server instance.
//!
//! Relay calls ([`RelayServer::send_to_client`],
//! [`RelayServer::broadcast`], the file variants, and
//! [`RelayServer::kick_client`]) enqueue frames onto per-session
//! bounded queues and never touch a socket themselves. Files at or
//! below a size threshold travel inline as one base64 line; larger
//! files are streamed as a header line followed by exactly the
//! declared number of raw bytes.
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use line_relay::{LoggingObserver, RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = RelayServer::new(ServerConfig::default(), Arc::new(LoggingObserver));
//!     let addr = server.start().await?;
//!     println!("listening on {}", addr);
//!     server.broadcast("admin", "hello everyone");
//!     tokio::signal::ctrl_c().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod observer;
pub mod protocol;
pub mod reaper;
pub mod registry;
pub mod server;
pub mod session;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use error::RelayError;
pub use observer::{LoggingObserver, NoopObserver, RelayObserver};
pub use protocol::{Frame, FrameReader, ServerFrame};
pub use registry::Registry;
pub use server::RelayServer;
pub use session::Session;
