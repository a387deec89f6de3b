//! Single-slot unlock request broker
//!
//! Only one caller may own the unlock UI at a time. A request made while
//! another is pending is answered `Busy` and is not queued; callers must
//! not retry in a loop. The stored context is handed to exactly one
//! `Unlocked` or `UnlockCancelled` event and then dropped.

use keyguard_core::{LockType, UnlockContext};
use tracing::debug;

use crate::events::{EventBus, LockEvent};

/// Answer to an unlock request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerResponse {
    Ok,
    /// Someone else already owns the unlock flow
    Busy,
}

/// Answer to a cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelResponse {
    Ok,
    NotPending,
}

/// The unlock mutex: `Idle` when `pending` is empty
#[derive(Debug, Default)]
pub struct UnlockBroker {
    pending: Option<UnlockContext>,
}

impl UnlockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Context of the pending request, if any
    pub fn pending_context(&self) -> Option<&UnlockContext> {
        self.pending.as_ref()
    }

    /// Take the slot and ask for a `lock_type` challenge
    pub fn request_unlock(
        &mut self,
        context: &UnlockContext,
        lock_type: LockType,
        bus: &mut EventBus<LockEvent>,
    ) -> BrokerResponse {
        if self.pending.is_some() {
            debug!("Unlock request refused, another request is pending");
            return BrokerResponse::Busy;
        }

        self.pending = Some(context.clone());
        debug!("Unlock slot taken, {} challenge requested", lock_type);
        bus.emit(LockEvent::UnlockRequested {
            context: context.clone(),
            lock_type,
        });
        BrokerResponse::Ok
    }

    /// Unlock at once when no challenge is needed
    ///
    /// The slot is never occupied, but a pending request still wins.
    pub fn grant_immediately(
        &mut self,
        context: &UnlockContext,
        bus: &mut EventBus<LockEvent>,
    ) -> BrokerResponse {
        if self.pending.is_some() {
            return BrokerResponse::Busy;
        }
        bus.emit(LockEvent::Unlocked {
            context: context.clone(),
        });
        BrokerResponse::Ok
    }

    /// Abandon the pending request
    pub fn cancel(&mut self, bus: &mut EventBus<LockEvent>) -> CancelResponse {
        match self.pending.take() {
            Some(context) => {
                debug!("Pending unlock request cancelled");
                bus.emit(LockEvent::UnlockCancelled { context });
                CancelResponse::Ok
            }
            None => CancelResponse::NotPending,
        }
    }

    /// Finish the pending request after a successful authentication
    ///
    /// Returns false (and emits nothing) when no request was pending.
    pub fn complete_on_success(&mut self, bus: &mut EventBus<LockEvent>) -> bool {
        match self.pending.take() {
            Some(context) => {
                debug!("Pending unlock request completed");
                bus.emit(LockEvent::Unlocked { context });
                true
            }
            None => false,
        }
    }
}
