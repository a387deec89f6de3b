//! Credential verification and attempt accounting
//!
//! # Outcome taxonomy
//!
//! - `Rejected`: malformed input or an active cooldown; no attempt consumed
//! - `Failed`: wrong credential; consumes an attempt, may start a lockout
//! - `Error`: platform or storage failure; no attempt consumed, never
//!   retried automatically

mod device;
mod ledger;
mod lockout;
mod secret_policy;
mod sim;
pub(crate) mod verifier;

pub use device::{DeviceCredential, CREDENTIAL_KEY};
pub use ledger::{AttemptLedger, LEDGER_KEY};
pub use lockout::LockoutPolicy;
pub use secret_policy::{Charset, SecretPolicy};
pub use sim::SimCredential;
pub use verifier::{BackendVerdict, CredentialBackend, CredentialVerifier, PolicyEvent};

use keyguard_core::AuthResult;

/// Why a secret was refused without consulting the credential
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("No secret entered")]
    Empty,

    #[error("Secret must be at least {min} characters")]
    TooShort { min: usize },

    #[error("Secret must be at most {max} characters")]
    TooLong { max: usize },

    #[error("Secret contains invalid characters")]
    InvalidCharacters,

    #[error("Too many attempts, try again in {remaining_secs} seconds")]
    CooldownActive { remaining_secs: u64 },

    #[error("Device is not locked")]
    NotLocked,

    #[error("SIM slot is not waiting for this code")]
    SimNotLocked,
}

/// Result of one verification request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failed {
        /// Attempts left, `UNLIMITED_ATTEMPTS` when unlimited
        attempts_left: i32,
        /// Lockout started by this failure, 0 if none
        lockout_secs: u64,
    },
    Rejected(RejectReason),
    Error(String),
}

impl Verdict {
    /// Platform-level result, `None` for rejected input
    pub fn auth_result(&self) -> Option<AuthResult> {
        match self {
            Verdict::Success => Some(AuthResult::Success),
            Verdict::Failed { .. } => Some(AuthResult::Failed),
            Verdict::Error(_) => Some(AuthResult::Error),
            Verdict::Rejected(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }

    pub fn attempts_left(&self) -> Option<i32> {
        match self {
            Verdict::Failed { attempts_left, .. } => Some(*attempts_left),
            _ => None,
        }
    }

    /// Remaining cooldown if the request was refused for one
    pub fn cooldown_secs(&self) -> Option<u64> {
        match self {
            Verdict::Rejected(RejectReason::CooldownActive { remaining_secs }) => {
                Some(*remaining_secs)
            }
            _ => None,
        }
    }
}
