//! Error types for the keyguard crate

use thiserror::Error;

/// Result type alias for keyguard operations
pub type Result<T> = std::result::Result<T, KeyguardError>;

/// Errors surfaced by stores, backends and configuration
///
/// These never cross the event boundary: the lock state machine turns them
/// into `Verdict::Error` or a degraded lock type.
#[derive(Debug, Error)]
pub enum KeyguardError {
    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] keyguard_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Settings store error
    #[error("Settings store error: {0}")]
    Storage(String),

    /// Password hashing or verification error
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Telephony backend error
    #[error("Telephony error: {0}")]
    Telephony(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for KeyguardError {
    fn from(e: serde_json::Error) -> Self {
        KeyguardError::Serialization(e.to_string())
    }
}
