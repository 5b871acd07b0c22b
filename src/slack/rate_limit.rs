//! Cooldown tracking for a single Slack credential.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Sentinel for "no cooldown active".
const IDLE: u64 = 0;

/// Deadline before which Slack will keep rejecting requests made with this credential.
///
/// The deadline is stored as milliseconds past `origin` in one atomic so that
/// concurrent callers read and extend it without locking. Each caller that
/// finds a cooldown active sleeps for its own remainder.
#[derive(Debug)]
pub struct RateLimitState {
    origin: Instant,
    until_ms: AtomicU64,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            until_ms: AtomicU64::new(IDLE),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Start (or extend) a cooldown of `cooldown` from now. Never shortens an active one.
    pub fn engage(&self, cooldown: Duration) {
        let cooldown_ms = u64::try_from(cooldown.as_millis()).unwrap_or(u64::MAX);
        // +1 keeps a zero-length cooldown distinguishable from IDLE.
        let deadline = self.now_ms().saturating_add(cooldown_ms).max(1);
        let previous = self.until_ms.fetch_max(deadline, Ordering::AcqRel);
        if previous < deadline {
            debug!(cooldown_ms, "Slack cooldown engaged");
        }
    }

    /// Time left on the active cooldown. Clears the state once it has elapsed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        let until = self.until_ms.load(Ordering::Acquire);
        if until == IDLE {
            return None;
        }

        let now = self.now_ms();
        if now >= until {
            // Only clear if nobody extended the deadline in the meantime.
            let _ = self
                .until_ms
                .compare_exchange(until, IDLE, Ordering::AcqRel, Ordering::Acquire);
            return None;
        }

        Some(Duration::from_millis(until - now))
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.remaining().is_some()
    }

    /// Sleep until no cooldown is active.
    pub async fn wait(&self) {
        // Loop because another caller may extend the cooldown while we sleep.
        while let Some(remaining) = self.remaining() {
            debug!(
                remaining_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
                "Waiting out Slack cooldown"
            );
            tokio::time::sleep(remaining).await;
        }
    }
}
