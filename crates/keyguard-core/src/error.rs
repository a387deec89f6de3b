//! Error types for the Keyguard core library

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential backend error: {0}")]
    Backend(String),

    #[error("Invalid SIM slot: {0}")]
    InvalidSlot(usize),

    #[error("No credential enrolled")]
    NotEnrolled,
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
