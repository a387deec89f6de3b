//! Keyguard configuration

use std::path::{Path, PathBuf};

use keyguard_core::LockType;
use serde::{Deserialize, Serialize};

use crate::auth::{LockoutPolicy, SecretPolicy};
use crate::error::{KeyguardError, Result};
use crate::telephony::SimSlotConfig;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "KEYGUARD_CONFIG";

/// Keyguard configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyguardConfig {
    /// Directory holding the credential and attempt ledger stores
    pub data_dir: PathBuf,

    /// Attempt limit and cooldown schedule
    #[serde(default)]
    pub lockout: LockoutPolicy,

    /// Input rules for a device PIN
    #[serde(default = "SecretPolicy::pin")]
    pub pin_policy: SecretPolicy,

    /// Input rules for a device password
    #[serde(default = "SecretPolicy::password")]
    pub password_policy: SecretPolicy,

    /// Emulated SIM cards for the development harness
    #[serde(default)]
    pub sim_slots: Vec<SimSlotConfig>,
}

impl Default for KeyguardConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            lockout: LockoutPolicy::default(),
            pin_policy: SecretPolicy::pin(),
            password_policy: SecretPolicy::password(),
            sim_slots: Vec::new(),
        }
    }
}

impl KeyguardConfig {
    /// Default config file path (`$KEYGUARD_CONFIG` wins)
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("keyguard")
                    .join("config.json")
            })
    }

    fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keyguard")
    }

    /// Config rooted at `data_dir` with default policies
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, or write and return the default if missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save(path)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create directories if they don't exist
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    pub fn credential_path(&self) -> PathBuf {
        self.data_dir.join("credential.json")
    }

    pub fn attempts_path(&self) -> PathBuf {
        self.data_dir.join("attempts.json")
    }

    /// Input rules for the given device lock type
    pub fn policy_for(&self, lock_type: LockType) -> SecretPolicy {
        policy_for(lock_type, &self.pin_policy, &self.password_policy).clone()
    }

    fn validate(&self) -> Result<()> {
        let policies = [
            ("pin_policy", &self.pin_policy),
            ("password_policy", &self.password_policy),
        ];
        for (name, policy) in policies {
            if policy.min_len == 0 || policy.min_len > policy.max_len {
                return Err(KeyguardError::Config(format!(
                    "{}: invalid length range {}..={}",
                    name, policy.min_len, policy.max_len
                )));
            }
        }
        Ok(())
    }
}

/// Pick the device input rules for `lock_type`
pub fn policy_for<'a>(
    lock_type: LockType,
    pin: &'a SecretPolicy,
    password: &'a SecretPolicy,
) -> &'a SecretPolicy {
    match lock_type {
        LockType::Password => password,
        LockType::Pin | LockType::None => pin,
    }
}
