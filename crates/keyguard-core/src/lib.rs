//! Keyguard Core - Shared types for the lockscreen unlock state machine
//!
//! This crate provides the data model shared by the attempt ledger, the
//! credential verifiers, the unlock request broker and the lock state
//! machine in the `keyguard` crate.

pub mod attempt;
pub mod clock;
pub mod error;
pub mod sim;
pub mod types;

pub use attempt::AttemptState;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use sim::{SimCardInfo, SimPinType, SimRequirement, SimStatus};
pub use types::{AuthResult, LaunchEvent, LockType, Secret, UnlockContext};

/// Reported as `attempts_left` when no attempt limit is configured
pub const UNLIMITED_ATTEMPTS: i32 = -1;

/// Default number of device unlock attempts before a lockout
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout cooldown in seconds
pub const DEFAULT_COOLDOWN_SECS: u64 = 30;

/// SIM PIN attempts granted by the card before PUK is required
pub const SIM_PIN_MAX_ATTEMPTS: u32 = 3;

/// SIM PUK attempts granted by the card before it is blocked
pub const SIM_PUK_MAX_ATTEMPTS: u32 = 10;
