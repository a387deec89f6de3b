//! Telephony seam for SIM PIN/PUK checks
//!
//! The telephony stack owns the SIM counters. `MemoryTelephony` emulates a
//! set of cards and backs the tests and the development harness.

use keyguard_core::{Secret, SimCardInfo, SimStatus, SIM_PIN_MAX_ATTEMPTS, SIM_PUK_MAX_ATTEMPTS};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{KeyguardError, Result};

/// Telephony answer to a PIN or PUK entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimResponse {
    pub accepted: bool,
    /// Attempts left for the code the card asks for after this entry
    pub remaining_attempts: u32,
    pub status: SimStatus,
}

/// SIM operations provided by the platform telephony service
pub trait Telephony {
    fn slots(&self) -> Vec<SimCardInfo>;
    fn verify_pin(&mut self, slot: usize, pin: &Secret) -> Result<SimResponse>;
    fn verify_puk(&mut self, slot: usize, puk: &Secret, new_pin: &Secret) -> Result<SimResponse>;
}

/// Seed for one emulated card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimSlotConfig {
    pub pin: String,
    pub puk: String,
    /// Card starts waiting for its PIN
    #[serde(default = "default_locked")]
    pub locked: bool,
}

fn default_locked() -> bool {
    true
}

#[derive(Debug, Clone)]
struct EmulatedCard {
    status: SimStatus,
    pin: String,
    puk: String,
    pin_attempts: u32,
    puk_attempts: u32,
}

impl EmulatedCard {
    fn info(&self, slot: usize) -> SimCardInfo {
        let remaining = match self.status {
            SimStatus::PukRequired | SimStatus::Blocked => self.puk_attempts,
            _ => self.pin_attempts,
        };
        SimCardInfo::new(slot, self.status, remaining)
    }

    fn response(&self, accepted: bool) -> SimResponse {
        let remaining_attempts = match self.status {
            SimStatus::PukRequired | SimStatus::Blocked => self.puk_attempts,
            _ => self.pin_attempts,
        };
        SimResponse {
            accepted,
            remaining_attempts,
            status: self.status,
        }
    }
}

/// In-memory telephony emulating one card per slot (`None` = empty slot)
#[derive(Debug, Clone, Default)]
pub struct MemoryTelephony {
    cards: Vec<Option<EmulatedCard>>,
}

impl MemoryTelephony {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(slots: &[SimSlotConfig]) -> Self {
        let mut telephony = Self::new();
        for slot in slots {
            telephony = telephony.with_card(&slot.pin, &slot.puk, slot.locked);
        }
        telephony
    }

    /// Add a card in the next slot
    pub fn with_card(mut self, pin: &str, puk: &str, locked: bool) -> Self {
        self.cards.push(Some(EmulatedCard {
            status: if locked {
                SimStatus::PinRequired
            } else {
                SimStatus::Ready
            },
            pin: pin.to_string(),
            puk: puk.to_string(),
            pin_attempts: SIM_PIN_MAX_ATTEMPTS,
            puk_attempts: SIM_PUK_MAX_ATTEMPTS,
        }));
        self
    }

    /// Leave the next slot empty
    pub fn with_empty_slot(mut self) -> Self {
        self.cards.push(None);
        self
    }

    fn card_mut(&mut self, slot: usize) -> Result<&mut EmulatedCard> {
        self.cards
            .get_mut(slot)
            .and_then(Option::as_mut)
            .ok_or(KeyguardError::Core(keyguard_core::Error::InvalidSlot(slot)))
    }
}

impl Telephony for MemoryTelephony {
    fn slots(&self) -> Vec<SimCardInfo> {
        self.cards
            .iter()
            .enumerate()
            .map(|(slot, card)| match card {
                Some(card) => card.info(slot),
                None => SimCardInfo::new(slot, SimStatus::Absent, 0),
            })
            .collect()
    }

    fn verify_pin(&mut self, slot: usize, pin: &Secret) -> Result<SimResponse> {
        let card = self.card_mut(slot)?;
        if card.status != SimStatus::PinRequired {
            return Err(KeyguardError::Telephony(format!(
                "SIM {} is not waiting for a PIN ({:?})",
                slot, card.status
            )));
        }

        if pin.expose() == card.pin {
            card.status = SimStatus::Ready;
            card.pin_attempts = SIM_PIN_MAX_ATTEMPTS;
            info!("SIM {} PIN accepted", slot);
            return Ok(card.response(true));
        }

        card.pin_attempts = card.pin_attempts.saturating_sub(1);
        if card.pin_attempts == 0 {
            card.status = SimStatus::PukRequired;
            warn!("SIM {} PIN attempts exhausted, PUK required", slot);
            // Report the exhausted PIN counter for this entry
            return Ok(SimResponse {
                accepted: false,
                remaining_attempts: 0,
                status: card.status,
            });
        }
        Ok(card.response(false))
    }

    fn verify_puk(&mut self, slot: usize, puk: &Secret, new_pin: &Secret) -> Result<SimResponse> {
        let card = self.card_mut(slot)?;
        if card.status != SimStatus::PukRequired {
            return Err(KeyguardError::Telephony(format!(
                "SIM {} is not waiting for a PUK ({:?})",
                slot, card.status
            )));
        }

        if puk.expose() == card.puk {
            card.status = SimStatus::Ready;
            card.pin = new_pin.expose().to_string();
            card.pin_attempts = SIM_PIN_MAX_ATTEMPTS;
            card.puk_attempts = SIM_PUK_MAX_ATTEMPTS;
            info!("SIM {} PUK accepted, PIN replaced", slot);
            return Ok(card.response(true));
        }

        card.puk_attempts = card.puk_attempts.saturating_sub(1);
        if card.puk_attempts == 0 {
            card.status = SimStatus::Blocked;
            warn!("SIM {} blocked", slot);
        }
        Ok(card.response(false))
    }
}
