//! Outcome of an admission check.

use std::time::Duration;

/// Whether a request may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request was counted and may proceed.
    Admit {
        /// Requests still available to this key in the current window
        remaining: u64,
        /// Time until the current window ends
        reset_after: Duration,
    },
    /// The key has used its allowance for this window.
    Reject {
        /// Time until the window rolls over and requests are admitted again
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit { .. })
    }

    /// Backoff hint for rejected requests; `None` when admitted.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Admit { .. } => None,
            Decision::Reject { retry_after } => Some(*retry_after),
        }
    }
}
