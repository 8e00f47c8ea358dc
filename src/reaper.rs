//! Idle-session reaper
//!
//! One periodic task per server instance. Closing a session is an
//! atomic flag flip plus a queue wakeup, so a dead socket cannot stall
//! the sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::registry::Registry;

/// Sweep registered sessions every `reap_interval`, closing and
/// unregistering any idle longer than `idle_timeout`.
pub async fn run_reaper(registry: Arc<Registry>, idle_timeout: Duration, reap_interval: Duration) {
    let mut ticker = interval(reap_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        for session in registry.snapshot() {
            let idle = session.idle_for();
            if idle > idle_timeout {
                info!(
                    "reaping '{}' (idle {:?} > {:?})",
                    session.nickname(),
                    idle,
                    idle_timeout
                );
                session.close();
                registry.unregister(session.nickname());
            }
        }
    }
}
