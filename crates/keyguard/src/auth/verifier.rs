//! Credential verifier shared by the device and SIM paths
//!
//! One parameterized verifier replaces separate simple-PIN and
//! complex-password flows. The same contract serves the SIM PIN/PUK path
//! through a different backend.

use keyguard_core::{AttemptState, Secret};
use tracing::{debug, warn};

use super::{RejectReason, SecretPolicy, Verdict};
use crate::error::Result;
use crate::events::{EventBus, SubscriptionId};

/// Raw answer from a credential backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendVerdict {
    pub matched: bool,
    /// Counters after this check
    pub state: AttemptState,
    /// Lockout running after this check, 0 if none
    pub lockout_secs: u64,
}

/// Platform credential check
pub trait CredentialBackend {
    /// Current counters, without side effects
    fn attempt_state(&self) -> AttemptState;

    /// Seconds left in a running lockout
    ///
    /// Closes the window first if it has elapsed at `now`.
    fn poll_lockout(&mut self, now: u64) -> Result<u64>;

    /// Check `secret` and update the counters
    fn check(&mut self, secret: &Secret, now: u64) -> Result<BackendVerdict>;

    /// Apply a changed attempt limit from settings
    ///
    /// Backends whose counters are owned elsewhere keep the default no-op.
    fn set_max_attempts(&mut self, _max_attempts: u32) -> Result<()> {
        Ok(())
    }
}

/// Policy-layer notifications raised alongside verification results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyEvent {
    /// All attempts consumed; a lockout (or PUK/blocking for SIM) follows
    AttemptsExceeded { lockout_secs: u64, lockout_count: u32 },
}

/// Validates input, consults a backend and maps attempt counters
pub struct CredentialVerifier {
    name: &'static str,
    policy: SecretPolicy,
    events: EventBus<PolicyEvent>,
}

impl CredentialVerifier {
    pub fn new(name: &'static str, policy: SecretPolicy) -> Self {
        Self {
            name,
            policy,
            events: EventBus::new(),
        }
    }

    pub fn policy(&self) -> &SecretPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: SecretPolicy) {
        self.policy = policy;
    }

    /// Observe `PolicyEvent`s (lockout banner, factory-reset warning, ...)
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&PolicyEvent) + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn verify(
        &mut self,
        backend: &mut dyn CredentialBackend,
        secret: &Secret,
        now: u64,
    ) -> Verdict {
        let policy = self.policy.clone();
        self.verify_with(&policy, backend, secret, now)
    }

    /// Verify against an explicit input policy (e.g. PUK on the SIM verifier)
    pub fn verify_with(
        &mut self,
        policy: &SecretPolicy,
        backend: &mut dyn CredentialBackend,
        secret: &Secret,
        now: u64,
    ) -> Verdict {
        if let Err(reason) = policy.validate(secret) {
            debug!("{} verifier rejected input: {}", self.name, reason);
            return Verdict::Rejected(reason);
        }

        match backend.poll_lockout(now) {
            Ok(0) => {}
            Ok(remaining_secs) => {
                debug!("{} verifier in cooldown for {}s", self.name, remaining_secs);
                return Verdict::Rejected(RejectReason::CooldownActive { remaining_secs });
            }
            Err(e) => {
                warn!("{} lockout check failed: {}", self.name, e);
                return Verdict::Error(e.to_string());
            }
        }

        let result = match backend.check(secret, now) {
            Ok(result) => result,
            Err(e) => {
                warn!("{} credential check failed: {}", self.name, e);
                return Verdict::Error(e.to_string());
            }
        };

        if result.matched {
            return Verdict::Success;
        }

        let attempts_left = result.state.attempts_left();
        if result.state.is_exhausted() {
            self.events.emit(PolicyEvent::AttemptsExceeded {
                lockout_secs: result.lockout_secs,
                lockout_count: result.state.lockout_count,
            });
        }

        Verdict::Failed {
            attempts_left,
            lockout_secs: result.lockout_secs,
        }
    }
}
