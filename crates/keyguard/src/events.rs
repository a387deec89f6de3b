//! Synchronous observer lists and the lifecycle events they carry
//!
//! `emit` takes the event by value, lends it to every subscriber in
//! subscription order, then drops it. A subscriber that wants to keep any
//! part of an event past its callback must clone it.

use std::fmt;

use keyguard_core::{LockType, SimPinType, UnlockContext};
use tracing::debug;

/// Handle returned by `subscribe`, used to unsubscribe
pub type SubscriptionId = u64;

/// Events raised by the lock state machine and the unlock broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    /// A caller owns the unlock flow; exactly one view renders the challenge
    UnlockRequested {
        context: UnlockContext,
        lock_type: LockType,
    },
    /// Terminal: the lock UI is torn down and `context` may be acted on
    Unlocked { context: UnlockContext },
    /// The pending unlock request was abandoned
    UnlockCancelled { context: UnlockContext },
    /// Wrong device credential
    AttemptFailed {
        attempts_left: i32,
        /// Lockout started by this failure, 0 if none
        lockout_secs: u64,
        /// Only one attempt remains before a lockout
        final_warning: bool,
    },
    /// A verification was refused because a lockout is running
    LockedOut { remaining_secs: u64 },
    /// The lockout window elapsed; attempts are available again
    LockoutExpired,
    /// Platform failure during verification; the user may retry
    AuthError { reason: String },
    /// The device was relocked
    Locked { lock_type: LockType },
    /// Settings changed the configured lock type
    LockTypeChanged { from: LockType, to: LockType },
    SimUnlocked { slot: usize },
    SimIncorrect {
        slot: usize,
        attempts_left: i32,
        /// Code the slot asks for now (PUK once PIN attempts ran out)
        pin_type: Option<SimPinType>,
    },
    SimBlocked { slot: usize },
}

type Callback<E> = Box<dyn FnMut(&E)>;

/// Ordered list of event subscribers
pub struct EventBus<E> {
    next_id: SubscriptionId,
    subscribers: Vec<(SubscriptionId, Callback<E>)>,
}

impl<E: fmt::Debug> EventBus<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&E) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    /// Deliver `event` to every current subscriber, then drop it
    pub fn emit(&mut self, event: E) {
        debug!(
            "Dispatching {:?} to {} subscribers",
            event,
            self.subscribers.len()
        );
        for (_, callback) in self.subscribers.iter_mut() {
            callback(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<E: fmt::Debug> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
