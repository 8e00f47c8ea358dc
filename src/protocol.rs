//! Wire protocol: line-oriented, UTF-8, `|`-delimited
//!
//! Server-to-client frames are single `\n`-terminated lines, with one
//! exception: a `FILESTREAM` header line is followed by exactly the
//! declared number of raw bytes with no further framing. Every consumer
//! of the stream must switch from line parsing to counted raw reads on
//! seeing that header, then switch back. [`FrameReader`] implements that
//! switch for the receiving side; the dispatcher implements it for the
//! sending side.
//!
//! Text payloads are always the last `|` field, so they may themselves
//! contain `|`. Filenames may not.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use crate::error::RelayError;

/// Handshake request, sent by the server immediately after accept
pub const REQUEST_NICK: &str = "REQUEST_NICK";
/// Handshake reply: confirmed nickname equals the proposed one
pub const NICK_ACCEPTED: &str = "NICK_ACCEPTED";
/// Handshake reply: a collision was resolved, confirmed != proposed
pub const NICK_ASSIGNED: &str = "NICK_ASSIGNED";
/// Relayed text line
pub const FROM: &str = "FROM";
/// Inline file transfer (whole payload base64-encoded in the line)
pub const FILE: &str = "FILE";
/// Streamed file transfer header (raw bytes follow)
pub const FILESTREAM: &str = "FILESTREAM";
/// Client line ending the connection gracefully, matched case-insensitively
pub const QUIT_SENTINEL: &str = "quit";

/// Returns true if a client line is the quit sentinel
pub fn is_quit(line: &str) -> bool {
    line.eq_ignore_ascii_case(QUIT_SENTINEL)
}

/// `NICK_ACCEPTED|<nick>`
pub fn nick_accepted_line(nickname: &str) -> String {
    format!("{}|{}", NICK_ACCEPTED, nickname)
}

/// `NICK_ASSIGNED|<nick>`
pub fn nick_assigned_line(nickname: &str) -> String {
    format!("{}|{}", NICK_ASSIGNED, nickname)
}

/// An outbound frame queued for one session's dispatcher
///
/// The stream variant carries a file reference, not bytes: the
/// dispatcher reads the file while writing, so a large file is never
/// buffered per target.
#[derive(Debug, Clone)]
pub enum Frame {
    /// `FROM|sender|text`
    Text { sender: String, text: String },
    /// `FILE|sender|filename|<base64>` — whole payload in one line
    FileInline {
        sender: String,
        filename: String,
        payload: Vec<u8>,
    },
    /// `FILESTREAM|sender|filename|len` header, then `len` raw bytes
    /// copied from `path`
    FileStream {
        sender: String,
        filename: String,
        path: PathBuf,
        len: u64,
    },
    /// Drains FIFO like any other frame, then stops the dispatcher.
    /// Enqueued behind a kick notice so the notice is still written.
    Close,
}

impl Frame {
    /// Encode the line form of this frame, without the terminator.
    ///
    /// For `FileStream` this is the header line only; the raw byte run
    /// is written separately by the dispatcher. `Close` has no line form.
    pub fn encode_line(&self) -> Option<String> {
        match self {
            Frame::Text { sender, text } => Some(format!("{}|{}|{}", FROM, sender, text)),
            Frame::FileInline {
                sender,
                filename,
                payload,
            } => Some(format!(
                "{}|{}|{}|{}",
                FILE,
                sender,
                filename,
                BASE64.encode(payload)
            )),
            Frame::FileStream {
                sender,
                filename,
                len,
                ..
            } => Some(format!("{}|{}|{}|{}", FILESTREAM, sender, filename, len)),
            Frame::Close => None,
        }
    }
}

/// A frame as decoded by a protocol consumer (the client boundary)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    /// Handshake request
    RequestNick,
    /// Handshake reply, confirmed == proposed
    NickAccepted(String),
    /// Handshake reply, collision resolved
    NickAssigned(String),
    /// Relayed text
    Text { sender: String, text: String },
    /// Inline file, payload already decoded
    FileInline {
        sender: String,
        filename: String,
        payload: Vec<u8>,
    },
    /// Streamed file, raw byte run already consumed
    FileStream {
        sender: String,
        filename: String,
        payload: Vec<u8>,
    },
}

/// Receiving-side decoder for the server-to-client stream
///
/// Owns the dual-mode parsing switch: line-oriented until a `FILESTREAM`
/// header, then exactly the declared byte count, then lines again.
pub struct FrameReader<R> {
    inner: BufReader<R>,
}

impl<R: tokio::io::AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
        }
    }

    /// Read the next frame, or `None` on clean EOF.
    ///
    /// EOF in the middle of a frame (a partial line, or fewer raw bytes
    /// than a stream header declared) is a protocol violation.
    pub async fn read_frame(&mut self) -> Result<Option<ServerFrame>, RelayError> {
        let mut line = String::new();
        let n = self.inner.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        let line = line.trim_end_matches(['\r', '\n']);

        let frame = parse_frame_line(line)?;
        match frame {
            HeaderFrame::Complete(frame) => Ok(Some(frame)),
            HeaderFrame::Stream {
                sender,
                filename,
                len,
            } => {
                // Mode switch: consume exactly `len` raw bytes before
                // resuming line parsing. The buffer grows with the
                // bytes actually received, so a hostile length field
                // cannot force the allocation up front.
                let expected = usize::try_from(len).map_err(|_| {
                    RelayError::Protocol(format!("stream length {} exceeds address space", len))
                })?;
                let mut payload = Vec::new();
                (&mut self.inner)
                    .take(len)
                    .read_to_end(&mut payload)
                    .await?;
                if payload.len() != expected {
                    return Err(RelayError::Protocol(format!(
                        "stream of '{}' ended after {} of {} declared bytes",
                        filename,
                        payload.len(),
                        len
                    )));
                }
                Ok(Some(ServerFrame::FileStream {
                    sender,
                    filename,
                    payload,
                }))
            }
        }
    }

    /// Access the underlying buffered reader
    pub fn get_mut(&mut self) -> &mut BufReader<R> {
        &mut self.inner
    }
}

enum HeaderFrame {
    Complete(ServerFrame),
    Stream {
        sender: String,
        filename: String,
        len: u64,
    },
}

fn parse_frame_line(line: &str) -> Result<HeaderFrame, RelayError> {
    let (tag, rest) = match line.split_once('|') {
        Some((tag, rest)) => (tag, rest),
        None if line == REQUEST_NICK => return Ok(HeaderFrame::Complete(ServerFrame::RequestNick)),
        None => return Err(RelayError::Protocol(format!("unframed line: '{}'", line))),
    };

    match tag {
        NICK_ACCEPTED => Ok(HeaderFrame::Complete(ServerFrame::NickAccepted(
            rest.to_string(),
        ))),
        NICK_ASSIGNED => Ok(HeaderFrame::Complete(ServerFrame::NickAssigned(
            rest.to_string(),
        ))),
        FROM => {
            let (sender, text) = rest
                .split_once('|')
                .ok_or_else(|| RelayError::Protocol(format!("malformed {} frame", FROM)))?;
            Ok(HeaderFrame::Complete(ServerFrame::Text {
                sender: sender.to_string(),
                text: text.to_string(),
            }))
        }
        FILE => {
            let mut fields = rest.splitn(3, '|');
            let sender = fields.next().unwrap_or_default();
            let filename = fields
                .next()
                .ok_or_else(|| RelayError::Protocol(format!("malformed {} frame", FILE)))?;
            let encoded = fields
                .next()
                .ok_or_else(|| RelayError::Protocol(format!("malformed {} frame", FILE)))?;
            let payload = BASE64
                .decode(encoded)
                .map_err(|e| RelayError::Protocol(format!("bad inline payload: {}", e)))?;
            Ok(HeaderFrame::Complete(ServerFrame::FileInline {
                sender: sender.to_string(),
                filename: filename.to_string(),
                payload,
            }))
        }
        FILESTREAM => {
            let mut fields = rest.splitn(3, '|');
            let sender = fields.next().unwrap_or_default().to_string();
            let filename = fields
                .next()
                .ok_or_else(|| RelayError::Protocol(format!("malformed {} frame", FILESTREAM)))?
                .to_string();
            let len: u64 = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| {
                    RelayError::Protocol(format!("bad {} length field", FILESTREAM))
                })?;
            Ok(HeaderFrame::Stream {
                sender,
                filename,
                len,
            })
        }
        other => Err(RelayError::Protocol(format!("unknown frame tag '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frame_encoding() {
        let frame = Frame::Text {
            sender: "admin".to_string(),
            text: "hello".to_string(),
        };
        assert_eq!(frame.encode_line().unwrap(), "FROM|admin|hello");
    }

    #[test]
    fn test_text_may_contain_delimiter() {
        let frame = Frame::Text {
            sender: "admin".to_string(),
            text: "a|b|c".to_string(),
        };
        let line = frame.encode_line().unwrap();
        match parse_frame_line(&line).unwrap() {
            HeaderFrame::Complete(ServerFrame::Text { sender, text }) => {
                assert_eq!(sender, "admin");
                assert_eq!(text, "a|b|c");
            }
            _ => panic!("wrong frame"),
        }
    }

    #[test]
    fn test_inline_round_trip() {
        let payload: Vec<u8> = (0..=255).collect();
        let frame = Frame::FileInline {
            sender: "admin".to_string(),
            filename: "blob.bin".to_string(),
            payload: payload.clone(),
        };
        let line = frame.encode_line().unwrap();
        match parse_frame_line(&line).unwrap() {
            HeaderFrame::Complete(ServerFrame::FileInline {
                payload: decoded, ..
            }) => assert_eq!(decoded, payload),
            _ => panic!("wrong frame"),
        }
    }

    #[test]
    fn test_close_has_no_line_form() {
        assert!(Frame::Close.encode_line().is_none());
    }

    #[test]
    fn test_quit_sentinel_case_insensitive() {
        assert!(is_quit("quit"));
        assert!(is_quit("QUIT"));
        assert!(is_quit("QuIt"));
        assert!(!is_quit("quit now"));
    }

    #[test]
    fn test_malformed_lines_rejected() {
        assert!(parse_frame_line("nonsense").is_err());
        assert!(parse_frame_line("FROM|only-sender").is_err());
        assert!(parse_frame_line("FILESTREAM|a|f.bin|not-a-number").is_err());
        assert!(parse_frame_line("BOGUS|x").is_err());
    }

    #[tokio::test]
    async fn test_reader_switches_modes_mid_stream() {
        let raw = [1u8, 2, 3, 4, 5];
        let mut wire = Vec::new();
        wire.extend_from_slice(b"REQUEST_NICK\n");
        wire.extend_from_slice(b"NICK_ACCEPTED|alice\n");
        wire.extend_from_slice(format!("FILESTREAM|admin|big.bin|{}\n", raw.len()).as_bytes());
        wire.extend_from_slice(&raw);
        wire.extend_from_slice(b"FROM|admin|after\n");

        let mut reader = FrameReader::new(wire.as_slice());
        assert_eq!(
            reader.read_frame().await.unwrap(),
            Some(ServerFrame::RequestNick)
        );
        assert_eq!(
            reader.read_frame().await.unwrap(),
            Some(ServerFrame::NickAccepted("alice".to_string()))
        );
        assert_eq!(
            reader.read_frame().await.unwrap(),
            Some(ServerFrame::FileStream {
                sender: "admin".to_string(),
                filename: "big.bin".to_string(),
                payload: raw.to_vec(),
            })
        );
        assert_eq!(
            reader.read_frame().await.unwrap(),
            Some(ServerFrame::Text {
                sender: "admin".to_string(),
                text: "after".to_string(),
            })
        );
        assert_eq!(reader.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reader_rejects_hostile_stream_length() {
        let mut wire = Vec::new();
        wire.extend_from_slice(format!("FILESTREAM|admin|big.bin|{}\n", u64::MAX).as_bytes());
        wire.extend_from_slice(&[0u8; 8]);

        let mut reader = FrameReader::new(wire.as_slice());
        assert!(matches!(
            reader.read_frame().await,
            Err(RelayError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_reader_rejects_truncated_stream() {
        let mut wire = Vec::new();
        wire.extend_from_slice(b"FILESTREAM|admin|big.bin|10\n");
        wire.extend_from_slice(&[0u8; 4]);

        let mut reader = FrameReader::new(wire.as_slice());
        assert!(matches!(
            reader.read_frame().await,
            Err(RelayError::Protocol(_))
        ));
    }
}
