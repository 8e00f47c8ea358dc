//! Outbound dispatcher: the single writer per connection
//!
//! Every frame destined for one connection funnels through that
//! connection's dispatcher loop. Relay calls and broadcasts only ever
//! enqueue; nothing else touches the write half. This is what lets
//! text lines and raw file byte runs share one stream without
//! corrupting each other.

use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::protocol::Frame;
use crate::session::Session;

/// Drain one session's outbound queue into its write half.
///
/// Runs until a `Close` frame, a write error, or a forced close wakeup,
/// then shuts the write half down. Each outcome ends only this
/// connection.
pub async fn run_dispatcher(
    session: Arc<Session>,
    mut queue: mpsc::Receiver<Frame>,
    writer: OwnedWriteHalf,
) {
    let mut writer = BufWriter::new(writer);

    loop {
        tokio::select! {
            frame = queue.recv() => match frame {
                None | Some(Frame::Close) => break,
                Some(frame) => {
                    if let Err(e) = write_frame(&mut writer, &frame).await {
                        warn!("write to '{}' failed: {}", session.nickname(), e);
                        session.close();
                        break;
                    }
                }
            },
            _ = session.close_forced() => break,
        }
    }

    let _ = writer.shutdown().await;
    debug!("dispatcher for '{}' ended", session.nickname());
}

/// Write one frame and flush.
///
/// For a stream job: header line first, then exactly the declared
/// number of raw bytes copied from the file. A file that has shrunk
/// since the job was enqueued would leave the receiver waiting on a
/// byte count we can no longer honor, so a short copy is an error.
async fn write_frame(
    writer: &mut BufWriter<OwnedWriteHalf>,
    frame: &Frame,
) -> Result<(), RelayError> {
    let line = match frame.encode_line() {
        Some(line) => line,
        None => return Ok(()),
    };
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;

    if let Frame::FileStream { path, len, .. } = frame {
        let file = File::open(path).await?;
        let mut limited = file.take(*len);
        let copied = tokio::io::copy(&mut limited, writer).await?;
        if copied != *len {
            return Err(RelayError::Protocol(format!(
                "file '{}' yielded {} of {} declared bytes",
                path.display(),
                copied,
                len
            )));
        }
    }

    writer.flush().await?;
    Ok(())
}
