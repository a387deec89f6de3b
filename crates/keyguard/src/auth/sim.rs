//! SIM PIN/PUK credential backend
//!
//! Counters belong to the telephony stack; this adapter only maps its
//! answers onto `AttemptState`. There is no cooldown: running out of PIN
//! attempts moves the card to PUK, running out of PUK attempts blocks it.

use keyguard_core::{AttemptState, Secret, SIM_PIN_MAX_ATTEMPTS, SIM_PUK_MAX_ATTEMPTS};

use super::{BackendVerdict, CredentialBackend};
use crate::error::Result;
use crate::telephony::Telephony;

enum SimCode<'a> {
    Pin,
    Puk { new_pin: &'a Secret },
}

/// One SIM slot seen through the credential backend contract
pub struct SimCredential<'a> {
    telephony: &'a mut dyn Telephony,
    slot: usize,
    code: SimCode<'a>,
}

impl<'a> SimCredential<'a> {
    /// Check the slot's PIN
    pub fn pin(telephony: &'a mut dyn Telephony, slot: usize) -> Self {
        Self {
            telephony,
            slot,
            code: SimCode::Pin,
        }
    }

    /// Check the slot's PUK, replacing the PIN with `new_pin` on success
    pub fn puk(telephony: &'a mut dyn Telephony, slot: usize, new_pin: &'a Secret) -> Self {
        Self {
            telephony,
            slot,
            code: SimCode::Puk { new_pin },
        }
    }

    fn max_attempts(&self) -> u32 {
        match self.code {
            SimCode::Pin => SIM_PIN_MAX_ATTEMPTS,
            SimCode::Puk { .. } => SIM_PUK_MAX_ATTEMPTS,
        }
    }

    fn state_for(&self, remaining: u32) -> AttemptState {
        let max = self.max_attempts();
        AttemptState {
            current_attempt: max.saturating_sub(remaining),
            max_attempt: max,
            lockout_started_at: None,
            lockout_count: 0,
        }
    }
}

impl CredentialBackend for SimCredential<'_> {
    fn attempt_state(&self) -> AttemptState {
        let remaining = self
            .telephony
            .slots()
            .into_iter()
            .find(|info| info.slot == self.slot)
            .map(|info| info.remaining_attempts)
            .unwrap_or(0);
        self.state_for(remaining)
    }

    fn poll_lockout(&mut self, _now: u64) -> Result<u64> {
        Ok(0)
    }

    fn check(&mut self, secret: &Secret, _now: u64) -> Result<BackendVerdict> {
        let response = match self.code {
            SimCode::Pin => self.telephony.verify_pin(self.slot, secret)?,
            SimCode::Puk { new_pin } => self.telephony.verify_puk(self.slot, secret, new_pin)?,
        };
        let state = if response.accepted {
            AttemptState::fresh(self.max_attempts())
        } else {
            self.state_for(response.remaining_attempts)
        };
        Ok(BackendVerdict {
            matched: response.accepted,
            state,
            lockout_secs: 0,
        })
    }
}
