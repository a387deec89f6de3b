//! Length and charset rules checked before any credential is consulted

use keyguard_core::Secret;
use serde::{Deserialize, Serialize};

use super::RejectReason;

/// Characters a secret may contain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Charset {
    /// ASCII digits only
    Digits,
    /// Any character except control characters
    Printable,
}

/// Input constraints for one kind of secret
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPolicy {
    pub min_len: usize,
    pub max_len: usize,
    pub charset: Charset,
}

impl SecretPolicy {
    /// Device PIN: 4-16 digits
    pub fn pin() -> Self {
        Self {
            min_len: 4,
            max_len: 16,
            charset: Charset::Digits,
        }
    }

    /// Device password: 4-16 printable characters
    pub fn password() -> Self {
        Self {
            min_len: 4,
            max_len: 16,
            charset: Charset::Printable,
        }
    }

    /// SIM PIN: 4-8 digits
    pub fn sim_pin() -> Self {
        Self {
            min_len: 4,
            max_len: 8,
            charset: Charset::Digits,
        }
    }

    /// SIM PUK: exactly 8 digits
    pub fn sim_puk() -> Self {
        Self {
            min_len: 8,
            max_len: 8,
            charset: Charset::Digits,
        }
    }

    pub fn validate(&self, secret: &Secret) -> Result<(), RejectReason> {
        if secret.is_empty() {
            return Err(RejectReason::Empty);
        }

        let len = secret.len();
        if len < self.min_len {
            return Err(RejectReason::TooShort { min: self.min_len });
        }
        if len > self.max_len {
            return Err(RejectReason::TooLong { max: self.max_len });
        }

        let valid = match self.charset {
            Charset::Digits => secret.expose().chars().all(|c| c.is_ascii_digit()),
            Charset::Printable => secret.expose().chars().all(|c| !c.is_control()),
        };
        if !valid {
            return Err(RejectReason::InvalidCharacters);
        }

        Ok(())
    }
}
