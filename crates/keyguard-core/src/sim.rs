//! SIM card lock status
//!
//! SIM counters are maintained by the telephony stack; the core only reads
//! them to decide whether a SIM challenge must come before the device one.

use serde::{Deserialize, Serialize};

/// Lock status of one SIM slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimStatus {
    PinRequired,
    PukRequired,
    /// PUK attempts exhausted; only the operator can recover the card
    Blocked,
    Ready,
    Absent,
}

/// Which SIM code the challenge asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimPinType {
    Pin,
    Puk,
}

/// Snapshot of one physical SIM slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimCardInfo {
    pub slot: usize,
    pub status: SimStatus,
    /// Attempts left for the code the card currently asks for
    pub remaining_attempts: u32,
}

impl SimCardInfo {
    pub fn new(slot: usize, status: SimStatus, remaining_attempts: u32) -> Self {
        Self {
            slot,
            status,
            remaining_attempts,
        }
    }

    /// Code type this slot is waiting for, if locked
    pub fn pin_type(&self) -> Option<SimPinType> {
        match self.status {
            SimStatus::PinRequired => Some(SimPinType::Pin),
            SimStatus::PukRequired => Some(SimPinType::Puk),
            _ => None,
        }
    }
}

/// Projection answering "must a SIM challenge be shown?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimRequirement {
    /// Number of slots waiting for a PIN or PUK
    pub count: usize,
    /// Lowest slot waiting for a code
    pub first_locked_slot: Option<usize>,
    /// Code the first locked slot asks for
    pub pin_type: Option<SimPinType>,
}

impl SimRequirement {
    pub fn from_slots(slots: &[SimCardInfo]) -> Self {
        let mut locked: Vec<&SimCardInfo> =
            slots.iter().filter(|s| s.pin_type().is_some()).collect();
        locked.sort_by_key(|s| s.slot);

        let first = locked.first();
        Self {
            count: locked.len(),
            first_locked_slot: first.map(|s| s.slot),
            pin_type: first.and_then(|s| s.pin_type()),
        }
    }

    pub fn is_required(&self) -> bool {
        self.count > 0
    }
}
