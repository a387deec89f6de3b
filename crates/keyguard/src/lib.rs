//! Keyguard - Lockscreen unlock authentication and request coordination
//!
//! This crate provides the unlock core of the lockscreen:
//! - Attempt ledger with lockout/backoff policy
//! - Credential verification for the device secret and SIM PIN/PUK
//! - Single-slot unlock request broker
//! - Lock state machine raising lifecycle events to view controllers
//!
//! Everything runs on the caller's event loop. Events are delivered
//! synchronously to all subscribers, in subscription order, before the
//! triggering call returns.

pub mod auth;
pub mod broker;
pub mod config;
pub mod console;
pub mod error;
pub mod events;
pub mod lock;
pub mod settings;
pub mod telephony;

pub use auth::{
    AttemptLedger, BackendVerdict, CredentialBackend, CredentialVerifier, DeviceCredential,
    LockoutPolicy, PolicyEvent, RejectReason, SecretPolicy, SimCredential, Verdict,
};
pub use broker::{BrokerResponse, CancelResponse, UnlockBroker};
pub use config::KeyguardConfig;
pub use error::{KeyguardError, Result};
pub use events::{EventBus, LockEvent, SubscriptionId};
pub use lock::{LockState, LockStateMachine};
pub use settings::{JsonFileSettings, MemorySettings, SettingsStore};
pub use telephony::{MemoryTelephony, SimResponse, Telephony};
