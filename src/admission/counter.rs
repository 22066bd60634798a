//! Per-key fixed window counter.

use std::time::Duration;

use super::decision::Decision;
use super::policy::AdmissionPolicy;

/// Counting state for one rate key.
///
/// The counter is plain data; callers serialize access to it (the controller
/// keeps each one behind its store shard lock), so the read, reset, increment
/// and decide sequence in [`WindowCounter::record`] is atomic per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounter {
    /// Start of the current window (ms)
    window_start: u64,
    /// Admitted requests since `window_start`
    count: u64,
    /// Rejected requests since `window_start`
    rejected: u64,
    /// Timestamp of the most recent request (ms)
    last_seen: u64,
}

impl WindowCounter {
    /// Create a fresh counter whose window opens at `now`.
    pub fn new(now: u64) -> Self {
        Self {
            window_start: now,
            count: 0,
            rejected: 0,
            last_seen: now,
        }
    }

    /// Count one request arriving at `now` and decide whether it is admitted.
    ///
    /// Rejected requests do not increment `count`, so a caller that backs off
    /// is admitted as soon as the window rolls over.
    pub fn record(&mut self, now: u64, policy: &AdmissionPolicy) -> Decision {
        let window_ms = policy.window_ms();

        if self.is_expired(now, window_ms) {
            self.reset(now);
        }
        self.last_seen = self.last_seen.max(now);

        let elapsed = self.elapsed(now);
        let until_reset = Duration::from_millis(window_ms.saturating_sub(elapsed));

        if self.count < policy.max_requests() {
            self.count += 1;
            Decision::Admit {
                remaining: policy.max_requests() - self.count,
                reset_after: until_reset,
            }
        } else {
            self.rejected = self.rejected.saturating_add(1);
            Decision::Reject {
                retry_after: until_reset,
            }
        }
    }

    /// Milliseconds since the window opened. A `now` before the window start
    /// counts as zero elapsed time.
    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.window_start)
    }

    pub fn is_expired(&self, now: u64, window_ms: u64) -> bool {
        self.elapsed(now) >= window_ms
    }

    /// Whether the key has been silent for at least `retention_ms`.
    pub fn is_idle(&self, now: u64, retention_ms: u64) -> bool {
        now.saturating_sub(self.last_seen) >= retention_ms
    }

    fn reset(&mut self, now: u64) {
        self.window_start = now;
        self.count = 0;
        self.rejected = 0;
    }

    pub fn window_start(&self) -> u64 {
        self.window_start
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }
}
