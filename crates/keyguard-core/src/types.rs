//! Lock types, unlock contexts and the secret wrapper

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Credential challenge configured for the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockType {
    /// Swipe only, no credential
    #[default]
    None,
    /// Numeric PIN
    Pin,
    /// Alphanumeric password
    Password,
}

impl LockType {
    /// Whether this lock type presents a credential challenge
    pub fn requires_secret(&self) -> bool {
        !matches!(self, LockType::None)
    }
}

impl fmt::Display for LockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockType::None => write!(f, "none"),
            LockType::Pin => write!(f, "pin"),
            LockType::Password => write!(f, "password"),
        }
    }
}

impl std::str::FromStr for LockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "swipe" => Ok(LockType::None),
            "pin" => Ok(LockType::Pin),
            "password" => Ok(LockType::Password),
            other => Err(format!("unknown lock type: {}", other)),
        }
    }
}

/// Outcome of a single platform credential check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    Success,
    Failed,
    Error,
}

/// Application launch deferred until the device is unlocked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchEvent {
    /// Application to launch
    pub app_id: String,
    /// Notification that triggered the launch, if any
    pub notification_id: Option<i64>,
    /// Extra launch arguments, in key order
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

impl LaunchEvent {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            notification_id: None,
            args: BTreeMap::new(),
        }
    }

    pub fn with_notification(mut self, id: i64) -> Self {
        self.notification_id = Some(id);
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// What should happen automatically once the device is unlocked
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnlockContext {
    /// Nothing to run after unlock
    #[default]
    None,
    /// Launch an application (e.g. the one that posted a tapped notification)
    LaunchEvent(LaunchEvent),
}

impl UnlockContext {
    pub fn launch(event: LaunchEvent) -> Self {
        UnlockContext::LaunchEvent(event)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, UnlockContext::None)
    }

    pub fn launch_event(&self) -> Option<&LaunchEvent> {
        match self {
            UnlockContext::LaunchEvent(event) => Some(event),
            UnlockContext::None => None,
        }
    }
}

/// Candidate credential entered by the user
///
/// The buffer is zeroized on drop and never printed.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Secret::new(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<{} chars>)", self.len())
    }
}
