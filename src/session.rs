//! Per-connection session state
//!
//! A `Session` is the server-side handle for one live connection: its
//! final nickname, the sending end of its outbound queue, its activity
//! timestamp, and a tri-state lifecycle flag. The socket itself is not
//! held here; the read half lives in the inbound reader task and the
//! write half in the dispatcher task.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::Notify;

use crate::error::RelayError;
use crate::protocol::Frame;

const ACTIVE: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// State for one registered connection
#[derive(Debug)]
pub struct Session {
    nickname: String,
    /// Producers enqueue here; only this session's dispatcher drains
    outbound: mpsc::Sender<Frame>,
    /// Written only by the inbound reader, on every received line
    last_active: Mutex<Instant>,
    /// Active -> Closing -> Closed, transitions are idempotent
    state: AtomicU8,
    /// Wakes the dispatcher when `close` cannot enqueue a Close frame
    closed: Notify,
}

impl Session {
    pub fn new(nickname: String, outbound: mpsc::Sender<Frame>) -> Self {
        Self {
            nickname,
            outbound,
            last_active: Mutex::new(Instant::now()),
            state: AtomicU8::new(ACTIVE),
            closed: Notify::new(),
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Enqueue a frame for this session's dispatcher.
    ///
    /// Never blocks. Fails if the session is no longer active or its
    /// queue is full (slow consumer) or the dispatcher is gone.
    pub fn enqueue(&self, frame: Frame) -> Result<(), RelayError> {
        if self.state.load(Ordering::Acquire) != ACTIVE {
            return Err(RelayError::SessionClosed(self.nickname.clone()));
        }
        self.outbound
            .try_send(frame)
            .map_err(|_| RelayError::SessionClosed(self.nickname.clone()))
    }

    /// Record inbound activity
    pub fn touch(&self) {
        let mut last = self.last_active.lock().unwrap();
        *last = Instant::now();
    }

    /// Time since the last received line (or since registration)
    pub fn idle_for(&self) -> Duration {
        self.last_active.lock().unwrap().elapsed()
    }

    /// Begin teardown. Idempotent; returns true for the caller that
    /// actually initiated it.
    ///
    /// Enqueues a `Close` frame so the dispatcher drains anything
    /// already queued (a kick notice in particular) before stopping.
    /// If the queue is full, the dispatcher is woken directly instead.
    pub fn close(&self) -> bool {
        if self
            .state
            .compare_exchange(ACTIVE, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if self.outbound.try_send(Frame::Close).is_err() {
            self.closed.notify_one();
        }
        true
    }

    /// Final transition, called once teardown has completed
    pub fn mark_closed(&self) {
        self.state.store(CLOSED, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::Acquire) == ACTIVE
    }

    /// Resolves when `close` had to fall back to a direct wakeup
    pub async fn close_forced(&self) {
        self.closed.notified().await;
    }
}
