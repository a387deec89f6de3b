//! Lockout policy for exhausted unlock attempts
//!
//! Once `max_attempts` consecutive failures are recorded, verification is
//! refused for a cooldown. Consecutive lockouts (no success in between)
//! walk down the cooldown list, staying on the last entry:
//!
//! - default: 5 attempts, 30 second cooldown every time
//! - progressive: 30 seconds, 1 minute, 5 minutes, then 30 minutes

use std::time::Duration;

use keyguard_core::{DEFAULT_COOLDOWN_SECS, DEFAULT_MAX_ATTEMPTS};
use serde::{Deserialize, Serialize};

/// Attempt limit and cooldown schedule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutPolicy {
    /// Failed attempts allowed before a lockout (0 = unlimited)
    pub max_attempts: u32,
    /// Cooldown for the 1st, 2nd, ... consecutive lockout (in seconds)
    pub cooldowns_secs: Vec<u64>,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cooldowns_secs: vec![DEFAULT_COOLDOWN_SECS],
        }
    }
}

impl LockoutPolicy {
    /// Escalating cooldowns for repeated lockouts
    pub fn progressive() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cooldowns_secs: vec![
                30,   // 1st lockout: 30 seconds
                60,   // 2nd lockout: 1 minute
                300,  // 3rd lockout: 5 minutes
                1800, // 4th+ lockout: 30 minutes
            ],
        }
    }

    /// No attempt limit, never locks out
    pub fn unlimited() -> Self {
        Self {
            max_attempts: 0,
            cooldowns_secs: Vec::new(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Cooldown applied for the given consecutive lockout (1-based)
    pub fn cooldown(&self, lockout_count: u32) -> Duration {
        let index = (lockout_count.max(1) - 1) as usize;
        let secs = self
            .cooldowns_secs
            .get(index)
            .or_else(|| self.cooldowns_secs.last())
            .copied()
            .unwrap_or(DEFAULT_COOLDOWN_SECS);
        Duration::from_secs(secs)
    }

    /// Human-readable cooldown, e.g. "5 minutes"
    pub fn describe_cooldown(&self, lockout_count: u32) -> String {
        let secs = self.cooldown(lockout_count).as_secs();
        if secs < 60 {
            format!("{} seconds", secs)
        } else if secs < 3600 {
            format!("{} minutes", secs / 60)
        } else {
            format!("{} hours", secs / 3600)
        }
    }
}
