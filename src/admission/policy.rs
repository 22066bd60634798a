//! Admission policy: the window and the ceiling.

use std::time::Duration;

use crate::error::{GatekeeperError, Result};

/// Idle windows a counter survives before the sweep may purge it.
pub const DEFAULT_RETENTION_WINDOWS: u32 = 3;

/// "At most `max_requests` per key per `window`."
///
/// Immutable once built; the controller holds one for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    window: Duration,
    max_requests: u64,
    retention_windows: u32,
}

impl AdmissionPolicy {
    /// Create a policy. Both the window and the ceiling must be non-zero.
    pub fn new(window: Duration, max_requests: u64) -> Result<Self> {
        let window_ms = window.as_millis();
        if window_ms == 0 {
            return Err(GatekeeperError::InvalidArgument(
                "window must be at least one millisecond".into(),
            ));
        }
        if window_ms > u64::MAX as u128 {
            return Err(GatekeeperError::InvalidArgument(
                "window does not fit in a millisecond timestamp".into(),
            ));
        }
        if max_requests == 0 {
            return Err(GatekeeperError::InvalidArgument(
                "max_requests must be greater than 0".into(),
            ));
        }

        Ok(Self {
            window,
            max_requests,
            retention_windows: DEFAULT_RETENTION_WINDOWS,
        })
    }

    /// Set how many idle windows a counter is retained for. Clamped to at least one.
    pub fn with_retention_windows(mut self, windows: u32) -> Self {
        self.retention_windows = windows.max(1);
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Idle time after which a counter is eligible for eviction.
    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms())
    }

    pub fn retention_ms(&self) -> u64 {
        self.window_ms().saturating_mul(self.retention_windows as u64)
    }
}
