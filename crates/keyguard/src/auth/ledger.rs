//! Persistent failed-attempt ledger
//!
//! The ledger is the only component allowed to read-modify-write the
//! attempt counters. Each mutation is persisted before it returns.

use keyguard_core::AttemptState;
use tracing::{debug, info, warn};

use super::LockoutPolicy;
use crate::error::Result;
use crate::settings::SettingsStore;

/// Settings key holding the serialized `AttemptState`
pub const LEDGER_KEY: &str = "keyguard.attempts";

/// Attempt counters and lockout window backed by a settings store
pub struct AttemptLedger {
    store: Box<dyn SettingsStore>,
    policy: LockoutPolicy,
}

impl AttemptLedger {
    pub fn new(store: Box<dyn SettingsStore>, policy: LockoutPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Read the persisted state
    ///
    /// An unreadable store yields an unlimited state rather than an error,
    /// so a storage fault never locks the user out.
    pub fn get_state(&self) -> AttemptState {
        match self.load() {
            Ok(Some(state)) => self.normalize(state),
            Ok(None) => AttemptState::fresh(self.policy.max_attempts),
            Err(e) => {
                warn!("Attempt ledger unreadable, allowing unlimited attempts: {}", e);
                AttemptState::fresh(0)
            }
        }
    }

    /// Count a failed attempt, starting a lockout when attempts run out
    pub fn record_failure(&mut self, now: u64) -> Result<AttemptState> {
        let mut state = self.get_state();
        if state.register_failure(now) {
            warn!(
                "Unlock attempts exhausted, locking out for {}",
                self.policy.describe_cooldown(state.lockout_count)
            );
        }
        self.save(&state)?;
        debug!(
            "Recorded failed attempt {}/{}",
            state.current_attempt, state.max_attempt
        );
        Ok(state)
    }

    /// Reset counters after a successful unlock
    pub fn record_success(&mut self) -> Result<()> {
        self.save(&AttemptState::fresh(self.policy.max_attempts))
    }

    /// Seconds left in the current lockout window (0 if none)
    pub fn lockout_remaining_seconds(&self, now: u64) -> u64 {
        let state = self.get_state();
        self.remaining_for(&state, now)
    }

    /// Close the lockout window once it has elapsed
    ///
    /// A window that starts after `now` (the clock was set back) is moved to
    /// start at `now`, so it still closes one cooldown later. Returns true if
    /// a lockout was cleared.
    pub fn expire_lockout(&mut self, now: u64) -> Result<bool> {
        let mut state = self.get_state();
        let Some(started_at) = state.lockout_started_at else {
            return Ok(false);
        };
        if started_at > now {
            warn!(
                "Clock moved back {}s during lockout, restarting the window",
                started_at - now
            );
            state.lockout_started_at = Some(now);
            self.save(&state)?;
            return Ok(false);
        }
        if self.remaining_for(&state, now) > 0 {
            return Ok(false);
        }
        state.clear_lockout();
        self.save(&state)?;
        info!("Lockout window elapsed, unlock attempts restored");
        Ok(true)
    }

    /// Apply a changed attempt limit from settings
    pub fn set_max_attempts(&mut self, max_attempts: u32) -> Result<()> {
        self.policy.max_attempts = max_attempts;
        let state = self.get_state();
        self.save(&state)
    }

    fn remaining_for(&self, state: &AttemptState, now: u64) -> u64 {
        let Some(started_at) = state.lockout_started_at else {
            return 0;
        };
        let cooldown = self.policy.cooldown(state.lockout_count).as_secs();
        // Never report more than one cooldown, even before the window is rebased
        started_at
            .saturating_add(cooldown)
            .saturating_sub(now)
            .min(cooldown)
    }

    fn normalize(&self, mut state: AttemptState) -> AttemptState {
        state.max_attempt = self.policy.max_attempts;
        if state.max_attempt != 0 {
            state.current_attempt = state.current_attempt.min(state.max_attempt);
        } else {
            state.lockout_started_at = None;
        }
        state
    }

    fn load(&self) -> Result<Option<AttemptState>> {
        match self.store.get(LEDGER_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, state: &AttemptState) -> Result<()> {
        let raw = serde_json::to_string(state)?;
        self.store.set(LEDGER_KEY, &raw)
    }
}
