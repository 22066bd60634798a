//! Core admission controller implementation.

use dashmap::DashMap;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::counter::WindowCounter;
use super::decision::Decision;
use super::key::RateKey;
use super::policy::AdmissionPolicy;
use crate::error::Result;

/// Gates requests by key, enforcing "at most N requests per key per window".
///
/// This struct is thread-safe and meant to be shared behind an `Arc`. Each
/// key's counter lives in a `DashMap` shard; the whole read, reset, increment
/// and decide step for a key runs while that shard's write lock is held, so
/// concurrent callers for the same key can never admit past the ceiling.
pub struct AdmissionController<C: Clock = SystemClock> {
    /// Window counters indexed by rate key
    counters: DashMap<RateKey, WindowCounter>,
    /// Immutable admission policy
    policy: AdmissionPolicy,
    /// Time source for `check` and `sweep`
    clock: C,
}

impl AdmissionController {
    /// Create a controller driven by the system clock.
    pub fn new(policy: AdmissionPolicy) -> Self {
        Self::with_clock(policy, SystemClock::new())
    }
}

impl<C: Clock> AdmissionController<C> {
    /// Create a controller with an explicit time source.
    pub fn with_clock(policy: AdmissionPolicy, clock: C) -> Self {
        Self {
            counters: DashMap::new(),
            policy,
            clock,
        }
    }

    /// Validate `key`, count a request arriving at `now` and decide on it.
    ///
    /// Fails with `InvalidArgument` for an empty or malformed key, in which
    /// case no counter is touched.
    pub fn check_and_record(&self, key: &str, now: u64) -> Result<Decision> {
        let key = RateKey::new(key)?;
        Ok(self.record(&key, now))
    }

    /// Like [`check_and_record`](Self::check_and_record), stamped with the controller's clock.
    pub fn check(&self, key: &str) -> Result<Decision> {
        self.check_and_record(key, self.clock.now_ms())
    }

    /// Count a request for an already validated key arriving at `now`.
    pub fn record(&self, key: &RateKey, now: u64) -> Decision {
        trace!(key = %key, now = now, "Checking admission");

        let decision = match self.counters.get_mut(key) {
            Some(mut counter) => counter.record(now, &self.policy),
            None => {
                let mut counter = self.counters.entry(key.clone()).or_insert_with(|| {
                    debug!(
                        key = %key,
                        limit = self.policy.max_requests(),
                        window_ms = self.policy.window_ms(),
                        "Creating new window counter"
                    );
                    WindowCounter::new(now)
                });
                counter.record(now, &self.policy)
            }
        };

        if let Decision::Reject { retry_after } = decision {
            debug!(
                key = %key,
                retry_after_ms = retry_after.as_millis() as u64,
                "Admission rejected"
            );
        }

        decision
    }

    /// Count a request for a validated key at the controller's current time.
    pub fn record_now(&self, key: &RateKey) -> Decision {
        self.record(key, self.clock.now_ms())
    }

    /// Purge counters idle for at least the policy's retention horizon.
    ///
    /// Returns the number of counters removed.
    pub fn sweep_at(&self, now: u64) -> usize {
        let retention_ms = self.policy.retention_ms();
        let mut purged = 0;

        self.counters.retain(|_, counter| {
            let idle = counter.is_idle(now, retention_ms);
            if idle {
                purged += 1;
            }
            !idle
        });

        if purged > 0 {
            debug!(purged = purged, remaining = self.counters.len(), "Swept idle counters");
        }
        purged
    }

    /// [`sweep_at`](Self::sweep_at) using the controller's clock.
    pub fn sweep(&self) -> usize {
        self.sweep_at(self.clock.now_ms())
    }

    /// Drop every counter, returning how many there were.
    ///
    /// Used at shutdown; the controller stays usable afterwards.
    pub fn drain(&self) -> usize {
        let mut drained = 0;
        self.counters.retain(|_, _| {
            drained += 1;
            false
        });
        drained
    }

    /// Admitted request count in the key's current window.
    ///
    /// Returns `None` if no counter exists for the key.
    pub fn counter_value(&self, key: &RateKey) -> Option<u64> {
        self.counters.get(key).map(|c| c.count())
    }

    /// Copy of the key's full counter state.
    pub fn counter(&self, key: &RateKey) -> Option<WindowCounter> {
        self.counters.get(key).map(|c| *c)
    }

    /// Clear all counters.
    pub fn clear(&self) {
        self.counters.clear();
    }

    /// Get the number of live counters.
    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
