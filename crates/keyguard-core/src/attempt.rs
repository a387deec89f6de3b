//! Failed-attempt counters

use serde::{Deserialize, Serialize};

use crate::UNLIMITED_ATTEMPTS;

/// Persisted failed-unlock-attempt state
///
/// `max_attempt == 0` means unlimited attempts. Whenever `max_attempt` is
/// nonzero, `current_attempt <= max_attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttemptState {
    /// Consecutive failed attempts since the last success or lockout expiry
    pub current_attempt: u32,
    /// Attempts allowed before a lockout (0 = unlimited)
    pub max_attempt: u32,
    /// Unix seconds at which the current lockout started
    pub lockout_started_at: Option<u64>,
    /// Consecutive lockouts since the last success
    #[serde(default)]
    pub lockout_count: u32,
}

impl AttemptState {
    /// Fresh state with the given attempt limit
    pub fn fresh(max_attempt: u32) -> Self {
        Self {
            max_attempt,
            ..Default::default()
        }
    }

    /// Attempts left before lockout, or `UNLIMITED_ATTEMPTS`
    pub fn attempts_left(&self) -> i32 {
        if self.max_attempt == 0 {
            return UNLIMITED_ATTEMPTS;
        }
        let left = self.max_attempt.saturating_sub(self.current_attempt);
        i32::try_from(left).unwrap_or(i32::MAX)
    }

    /// All attempts used up
    pub fn is_exhausted(&self) -> bool {
        self.max_attempt != 0 && self.current_attempt >= self.max_attempt
    }

    pub fn is_locked_out(&self) -> bool {
        self.lockout_started_at.is_some()
    }

    /// Count one failure, starting a lockout at `now` when exhausted
    ///
    /// Returns true if this failure started a lockout.
    pub fn register_failure(&mut self, now: u64) -> bool {
        if self.max_attempt == 0 {
            self.current_attempt = self.current_attempt.saturating_add(1);
            return false;
        }
        self.current_attempt = (self.current_attempt + 1).min(self.max_attempt);
        if self.is_exhausted() && self.lockout_started_at.is_none() {
            self.lockout_started_at = Some(now);
            self.lockout_count = self.lockout_count.saturating_add(1);
            return true;
        }
        false
    }

    /// Clear the lockout window and counters, keeping the lockout count
    pub fn clear_lockout(&mut self) {
        self.current_attempt = 0;
        self.lockout_started_at = None;
    }
}
