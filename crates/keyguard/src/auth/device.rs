//! Device PIN/password credential
//!
//! The secret is hashed with Argon2id and stored in the settings store
//! together with the lock type it was enrolled for. Counters live in the
//! attempt ledger.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use keyguard_core::{AttemptState, LockType, Secret};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{AttemptLedger, BackendVerdict, CredentialBackend, RejectReason, SecretPolicy};
use crate::config::KeyguardConfig;
use crate::error::{KeyguardError, Result};
use crate::settings::{JsonFileSettings, SettingsStore};

/// Settings key holding the enrolled credential
pub const CREDENTIAL_KEY: &str = "keyguard.credential";

/// Enrolled credential record
#[derive(Serialize, Deserialize)]
struct CredentialRecord {
    lock_type: LockType,
    /// Argon2id PHC string
    hash: String,
    /// Version for future migrations
    version: u32,
}

/// Device credential backed by a settings store and the attempt ledger
pub struct DeviceCredential {
    store: Box<dyn SettingsStore>,
    ledger: AttemptLedger,
    record: Option<CredentialRecord>,
}

impl DeviceCredential {
    /// Load any enrolled credential from `store`
    pub fn new(store: Box<dyn SettingsStore>, ledger: AttemptLedger) -> Result<Self> {
        let record = match store.get(CREDENTIAL_KEY)? {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                KeyguardError::Storage(format!("Failed to parse credential record: {}", e))
            })?),
            None => None,
        };
        Ok(Self {
            store,
            ledger,
            record,
        })
    }

    /// Open the file stores under the configured data directory
    pub fn open(config: &KeyguardConfig) -> Result<Self> {
        config.ensure_directories()?;
        let ledger = AttemptLedger::new(
            Box::new(JsonFileSettings::open(config.attempts_path())?),
            config.lockout.clone(),
        );
        Self::new(
            Box::new(JsonFileSettings::open(config.credential_path())?),
            ledger,
        )
    }

    /// Credential with nothing enrolled, ignoring whatever `store` holds
    pub fn unenrolled(store: Box<dyn SettingsStore>, ledger: AttemptLedger) -> Self {
        Self {
            store,
            ledger,
            record: None,
        }
    }

    pub fn is_set(&self) -> bool {
        self.record.is_some()
    }

    /// Lock type of the enrolled credential, `None` if nothing is enrolled
    pub fn lock_type(&self) -> LockType {
        self.record
            .as_ref()
            .map(|r| r.lock_type)
            .unwrap_or(LockType::None)
    }

    /// Enroll a new secret (first setup or change)
    ///
    /// Enrolling `LockType::None` clears the credential.
    pub fn enroll(
        &mut self,
        lock_type: LockType,
        secret: &Secret,
        policy: &SecretPolicy,
    ) -> Result<()> {
        if !lock_type.requires_secret() {
            return self.clear();
        }
        policy.validate(secret).map_err(|reason: RejectReason| {
            KeyguardError::Config(format!("Cannot enroll secret: {}", reason))
        })?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(secret.expose().as_bytes(), &salt)
            .map_err(|e| KeyguardError::Crypto(format!("Failed to hash secret: {}", e)))?
            .to_string();

        let record = CredentialRecord {
            lock_type,
            hash,
            version: 1,
        };
        self.store
            .set(CREDENTIAL_KEY, &serde_json::to_string(&record)?)?;
        self.record = Some(record);
        self.ledger.record_success()?;

        info!("Enrolled {} credential", lock_type);
        Ok(())
    }

    /// Remove the credential; the device falls back to swipe
    pub fn clear(&mut self) -> Result<()> {
        self.store.remove(CREDENTIAL_KEY)?;
        self.record = None;
        self.ledger.record_success()?;
        info!("Device credential cleared");
        Ok(())
    }

    fn matches(&self, secret: &Secret) -> Result<bool> {
        let record = self
            .record
            .as_ref()
            .ok_or(keyguard_core::Error::NotEnrolled)?;
        let parsed = PasswordHash::new(&record.hash)
            .map_err(|e| KeyguardError::Crypto(format!("Invalid stored hash: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(secret.expose().as_bytes(), &parsed)
            .is_ok())
    }
}

impl CredentialBackend for DeviceCredential {
    fn attempt_state(&self) -> AttemptState {
        self.ledger.get_state()
    }

    fn set_max_attempts(&mut self, max_attempts: u32) -> Result<()> {
        self.ledger.set_max_attempts(max_attempts)
    }

    fn poll_lockout(&mut self, now: u64) -> Result<u64> {
        self.ledger.expire_lockout(now)?;
        Ok(self.ledger.lockout_remaining_seconds(now))
    }

    fn check(&mut self, secret: &Secret, now: u64) -> Result<BackendVerdict> {
        let matched = self.matches(secret)?;
        let state = if matched {
            // A counter that cannot be reset must not keep the owner out
            if let Err(e) = self.ledger.record_success() {
                warn!("Failed to reset attempt counter after unlock: {}", e);
            }
            AttemptState::fresh(self.ledger.policy().max_attempts)
        } else {
            self.ledger.record_failure(now)?
        };
        Ok(BackendVerdict {
            matched,
            state,
            lockout_secs: self.ledger.lockout_remaining_seconds(now),
        })
    }
}
