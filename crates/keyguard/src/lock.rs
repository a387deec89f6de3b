//! Lock state machine
//!
//! Owns the lock type and the challenge state, consults the credential
//! verifiers and raises lifecycle events for the view controllers.
//!
//! ```text
//! Locked(type) --challenge--> Challenging(type) --unlock--> Unlocked
//!      ^                            |
//!      +----------cancel------------+          (lock: any state -> Locked)
//! ```
//!
//! # SIM unlock
//!
//! The SIM path never touches the broker and cannot be cancelled: a locked
//! SIM blocks telephony whatever the user wants. Device unlock, by contrast,
//! is brokered and cancellable.

use keyguard_core::{
    Clock, LockType, Secret, SimCardInfo, SimRequirement, SimStatus, SystemClock, UnlockContext,
};
use tracing::{debug, info, warn};

use crate::auth::{
    AttemptLedger, CredentialBackend, CredentialVerifier, DeviceCredential, PolicyEvent,
    RejectReason, SecretPolicy, SimCredential, Verdict,
};
use crate::broker::{BrokerResponse, CancelResponse, UnlockBroker};
use crate::config::{policy_for, KeyguardConfig};
use crate::events::{EventBus, LockEvent, SubscriptionId};
use crate::settings::MemorySettings;
use crate::telephony::Telephony;

/// Lock screen state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked(LockType),
    /// A credential challenge is shown
    Challenging(LockType),
    Unlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// Present (or keep presenting) the challenge
    Challenge,
    /// Authentication succeeded
    Unlock,
    Cancel,
    /// Relock request
    Lock,
}

/// Lock state transition table, keyed by state and configured lock type
fn transition(state: LockState, lock_type: LockType, trigger: Trigger) -> LockState {
    use LockState::*;

    match (state, lock_type, trigger) {
        (_, t, Trigger::Lock) => Locked(t),
        (Unlocked, _, _) => Unlocked,
        // Swipe-only devices need no challenge
        (Locked(_) | Challenging(_), LockType::None, Trigger::Challenge) => Unlocked,
        (Locked(_) | Challenging(_), t, Trigger::Challenge) => Challenging(t),
        (Locked(_) | Challenging(_), _, Trigger::Unlock) => Unlocked,
        (Locked(_) | Challenging(_), t, Trigger::Cancel) => Locked(t),
    }
}

/// The unlock core: broker, verifiers and lifecycle events
pub struct LockStateMachine {
    lock_type: LockType,
    state: LockState,
    broker: UnlockBroker,
    device: Box<dyn CredentialBackend>,
    device_verifier: CredentialVerifier,
    pin_policy: SecretPolicy,
    password_policy: SecretPolicy,
    telephony: Box<dyn Telephony>,
    sim_verifier: CredentialVerifier,
    sim_slots: Vec<SimCardInfo>,
    clock: Box<dyn Clock>,
    events: EventBus<LockEvent>,
}

impl LockStateMachine {
    /// Create a machine locked with `lock_type`
    pub fn new(
        lock_type: LockType,
        device: Box<dyn CredentialBackend>,
        telephony: Box<dyn Telephony>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let pin_policy = SecretPolicy::pin();
        let password_policy = SecretPolicy::password();
        let device_policy = policy_for(lock_type, &pin_policy, &password_policy).clone();
        let sim_slots = telephony.slots();

        Self {
            lock_type,
            state: LockState::Locked(lock_type),
            broker: UnlockBroker::new(),
            device,
            device_verifier: CredentialVerifier::new("device", device_policy),
            pin_policy,
            password_policy,
            telephony,
            sim_verifier: CredentialVerifier::new("sim", SecretPolicy::sim_pin()),
            sim_slots,
            clock,
            events: EventBus::new(),
        }
    }

    /// Override the device PIN and password input rules
    pub fn with_policies(mut self, pin: SecretPolicy, password: SecretPolicy) -> Self {
        self.pin_policy = pin;
        self.password_policy = password;
        self.device_verifier.set_policy(self.device_policy());
        self
    }

    /// Build from configuration, degrading to no lock on any store failure
    ///
    /// The lock type comes from the enrolled credential. A store that
    /// cannot be opened, or a missing enrollment, yields `LockType::None`
    /// rather than a device nobody can unlock.
    pub fn open(config: &KeyguardConfig, telephony: Box<dyn Telephony>) -> Self {
        let (device, lock_type) = match DeviceCredential::open(config) {
            Ok(device) => {
                let lock_type = device.lock_type();
                (device, lock_type)
            }
            Err(e) => {
                warn!("Credential store unavailable, running without a lock: {}", e);
                (Self::fallback_device(config), LockType::None)
            }
        };
        info!("Keyguard starting with {} lock", lock_type);

        Self::new(lock_type, Box::new(device), telephony, Box::new(SystemClock))
            .with_policies(config.pin_policy.clone(), config.password_policy.clone())
    }

    fn fallback_device(config: &KeyguardConfig) -> DeviceCredential {
        let ledger = AttemptLedger::new(Box::new(MemorySettings::new()), config.lockout.clone());
        DeviceCredential::unenrolled(Box::new(MemorySettings::new()), ledger)
    }

    fn device_policy(&self) -> SecretPolicy {
        policy_for(self.lock_type, &self.pin_policy, &self.password_policy).clone()
    }

    pub fn current_lock_type(&self) -> LockType {
        self.lock_type
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == LockState::Unlocked
    }

    pub fn broker(&self) -> &UnlockBroker {
        &self.broker
    }

    /// Subscribe to lifecycle events
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&LockEvent) + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Subscribe to the device verifier's policy events
    pub fn subscribe_policy<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&PolicyEvent) + 'static,
    {
        self.device_verifier.subscribe(callback)
    }

    /// Subscribe to the SIM verifier's policy events
    pub fn subscribe_sim_policy<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&PolicyEvent) + 'static,
    {
        self.sim_verifier.subscribe(callback)
    }

    /// Attempts left on the device credential, `-1` when unlimited
    pub fn attempts_left(&self) -> i32 {
        self.device.attempt_state().attempts_left()
    }

    /// Seconds left in a running device lockout
    pub fn lockout_remaining(&mut self) -> u64 {
        let now = self.clock.now();
        match self.device.poll_lockout(now) {
            Ok(remaining) => remaining,
            Err(e) => {
                warn!("Failed to read lockout window: {}", e);
                0
            }
        }
    }

    /// Check the device secret entered on the challenge UI
    pub fn authenticate(&mut self, secret: &Secret) -> Verdict {
        if self.state == LockState::Unlocked {
            return Verdict::Rejected(RejectReason::NotLocked);
        }
        if !self.lock_type.requires_secret() {
            self.finish_unlock();
            return Verdict::Success;
        }

        self.state = transition(self.state, self.lock_type, Trigger::Challenge);
        let now = self.clock.now();
        let verdict = self
            .device_verifier
            .verify(self.device.as_mut(), secret, now);
        debug!("Device check result: {:?}", verdict.auth_result());

        match &verdict {
            Verdict::Success => self.finish_unlock(),
            Verdict::Failed {
                attempts_left,
                lockout_secs,
            } => {
                warn!(
                    "Wrong {} entered, {} attempts left",
                    self.lock_type, attempts_left
                );
                self.events.emit(LockEvent::AttemptFailed {
                    attempts_left: *attempts_left,
                    lockout_secs: *lockout_secs,
                    final_warning: *attempts_left == 1,
                });
                if *lockout_secs > 0 {
                    self.events.emit(LockEvent::LockedOut {
                        remaining_secs: *lockout_secs,
                    });
                }
            }
            Verdict::Rejected(RejectReason::CooldownActive { remaining_secs }) => {
                self.events.emit(LockEvent::LockedOut {
                    remaining_secs: *remaining_secs,
                });
            }
            Verdict::Rejected(reason) => {
                debug!("Input rejected: {}", reason);
            }
            Verdict::Error(reason) => {
                self.events.emit(LockEvent::AuthError {
                    reason: reason.clone(),
                });
            }
        }

        verdict
    }

    /// Ask for the device to be unlocked on behalf of a caller that does
    /// not render its own challenge (camera, notification tap, app-control)
    pub fn unlock_request(&mut self, context: &UnlockContext) -> BrokerResponse {
        if self.state == LockState::Unlocked || !self.lock_type.requires_secret() {
            let response = self.broker.grant_immediately(context, &mut self.events);
            if response == BrokerResponse::Ok {
                self.state = transition(self.state, self.lock_type, Trigger::Challenge);
                info!("Device unlocked without challenge");
            }
            return response;
        }

        let response = self
            .broker
            .request_unlock(context, self.lock_type, &mut self.events);
        if response == BrokerResponse::Ok {
            self.state = transition(self.state, self.lock_type, Trigger::Challenge);
        }
        response
    }

    /// Abandon the pending unlock request and close the challenge
    pub fn cancel(&mut self) -> CancelResponse {
        let response = self.broker.cancel(&mut self.events);
        self.state = transition(self.state, self.lock_type, Trigger::Cancel);
        response
    }

    /// Relock the device (display off, app-control "lock")
    ///
    /// Returns false if it was already locked with no challenge open.
    pub fn lock(&mut self) -> bool {
        self.broker.cancel(&mut self.events);
        let next = transition(self.state, self.lock_type, Trigger::Lock);
        if next == self.state {
            return false;
        }
        self.state = next;
        info!("Device locked");
        self.events.emit(LockEvent::Locked {
            lock_type: self.lock_type,
        });
        true
    }

    /// Injected settings change of the configured lock type
    pub fn settings_changed(&mut self, lock_type: LockType) {
        if lock_type == self.lock_type {
            return;
        }
        let from = self.lock_type;
        self.lock_type = lock_type;
        self.device_verifier.set_policy(self.device_policy());

        // An open challenge was for the old credential
        self.broker.cancel(&mut self.events);
        if self.state != LockState::Unlocked {
            self.state = LockState::Locked(lock_type);
        }

        info!("Lock type changed from {} to {}", from, lock_type);
        self.events.emit(LockEvent::LockTypeChanged { from, to: lock_type });
    }

    /// Injected settings change of the device attempt limit (0 = unlimited)
    pub fn attempt_limit_changed(&mut self, max_attempts: u32) {
        match self.device.set_max_attempts(max_attempts) {
            Ok(()) => info!("Device attempt limit set to {}", max_attempts),
            Err(e) => warn!("Failed to apply attempt limit {}: {}", max_attempts, e),
        }
    }

    /// Lockout timer; returns true when a lockout window just closed
    pub fn tick(&mut self) -> bool {
        if !self.device.attempt_state().is_locked_out() {
            return false;
        }
        let now = self.clock.now();
        match self.device.poll_lockout(now) {
            Ok(0) if !self.device.attempt_state().is_locked_out() => {
                self.events.emit(LockEvent::LockoutExpired);
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!("Failed to expire lockout: {}", e);
                false
            }
        }
    }

    /// Injected SIM status change
    pub fn sim_status_changed(&mut self, slots: Vec<SimCardInfo>) {
        debug!("SIM status changed: {:?}", slots);
        self.sim_slots = slots;
    }

    pub fn sim_slots(&self) -> &[SimCardInfo] {
        &self.sim_slots
    }

    /// Whether a SIM challenge must precede the device challenge
    pub fn sim_pin_required(&self) -> SimRequirement {
        SimRequirement::from_slots(&self.sim_slots)
    }

    /// Check a SIM PIN
    pub fn authenticate_sim(&mut self, slot: usize, pin: &Secret) -> Verdict {
        if let Some(verdict) = self.sim_precheck(slot, SimStatus::PinRequired) {
            return verdict;
        }
        let now = self.clock.now();
        let mut backend = SimCredential::pin(self.telephony.as_mut(), slot);
        let verdict = self.sim_verifier.verify(&mut backend, pin, now);
        self.finish_sim(slot, &verdict);
        verdict
    }

    /// Check a SIM PUK and replace the PIN with `new_pin`
    pub fn authenticate_sim_puk(
        &mut self,
        slot: usize,
        puk: &Secret,
        new_pin: &Secret,
    ) -> Verdict {
        if let Some(verdict) = self.sim_precheck(slot, SimStatus::PukRequired) {
            return verdict;
        }
        if let Err(reason) = SecretPolicy::sim_pin().validate(new_pin) {
            return Verdict::Rejected(reason);
        }
        let now = self.clock.now();
        let mut backend = SimCredential::puk(self.telephony.as_mut(), slot, new_pin);
        let verdict = self
            .sim_verifier
            .verify_with(&SecretPolicy::sim_puk(), &mut backend, puk, now);
        self.finish_sim(slot, &verdict);
        verdict
    }

    fn sim_precheck(&self, slot: usize, expected: SimStatus) -> Option<Verdict> {
        match self.sim_slots.iter().find(|info| info.slot == slot) {
            Some(info) if info.status == expected => None,
            Some(_) => Some(Verdict::Rejected(RejectReason::SimNotLocked)),
            None => Some(Verdict::Error(format!("No SIM in slot {}", slot))),
        }
    }

    fn finish_sim(&mut self, slot: usize, verdict: &Verdict) {
        debug!("SIM {} check result: {:?}", slot, verdict.auth_result());
        self.sim_slots = self.telephony.slots();
        let status = self
            .sim_slots
            .iter()
            .find(|info| info.slot == slot)
            .copied();

        match verdict {
            Verdict::Success => {
                info!("SIM {} unlocked", slot);
                self.events.emit(LockEvent::SimUnlocked { slot });
            }
            Verdict::Failed { attempts_left, .. } => {
                if status.map(|s| s.status) == Some(SimStatus::Blocked) {
                    warn!("SIM {} blocked", slot);
                    self.events.emit(LockEvent::SimBlocked { slot });
                } else {
                    self.events.emit(LockEvent::SimIncorrect {
                        slot,
                        attempts_left: *attempts_left,
                        pin_type: status.and_then(|s| s.pin_type()),
                    });
                }
            }
            Verdict::Error(reason) => {
                self.events.emit(LockEvent::AuthError {
                    reason: reason.clone(),
                });
            }
            Verdict::Rejected(_) => {}
        }
    }

    fn finish_unlock(&mut self) {
        self.state = transition(self.state, self.lock_type, Trigger::Unlock);
        info!("Device unlocked");
        if !self.broker.complete_on_success(&mut self.events) {
            self.events.emit(LockEvent::Unlocked {
                context: UnlockContext::None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verifier::tests::FixedBackend;
    use crate::auth::LockoutPolicy;
    use crate::error::{KeyguardError, Result};
    use crate::settings::SettingsStore;
    use crate::telephony::MemoryTelephony;
    use keyguard_core::{LaunchEvent, ManualClock, SimPinType};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Memory store whose writes can be switched off
    #[derive(Clone, Default)]
    struct FlakyStore {
        inner: MemorySettings,
        read_only: Rc<Cell<bool>>,
    }

    impl SettingsStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }
        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            if self.read_only.get() {
                return Err(KeyguardError::Storage("no space left on device".into()));
            }
            self.inner.set(key, value)
        }
        fn remove(&mut self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    /// Argon2-backed machine with its attempt counters on a `FlakyStore`
    fn enrolled_machine(
        max_attempts: u32,
    ) -> (LockStateMachine, FlakyStore, Rc<RefCell<Vec<LockEvent>>>, ManualClock) {
        let attempts = FlakyStore::default();
        let ledger = AttemptLedger::new(
            Box::new(attempts.clone()),
            LockoutPolicy::default().with_max_attempts(max_attempts),
        );
        let mut device = DeviceCredential::new(Box::new(MemorySettings::new()), ledger).unwrap();
        device
            .enroll(LockType::Pin, &Secret::new("2580"), &SecretPolicy::pin())
            .unwrap();

        let clock = ManualClock::new(1_000_000);
        let mut machine = LockStateMachine::new(
            LockType::Pin,
            Box::new(device),
            Box::new(MemoryTelephony::new()),
            Box::new(clock.clone()),
        );
        let events = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::clone(&events);
        machine.subscribe(move |event| e.borrow_mut().push(event.clone()));
        (machine, attempts, events, clock)
    }

    struct Harness {
        machine: LockStateMachine,
        events: Rc<RefCell<Vec<LockEvent>>>,
        clock: ManualClock,
    }

    fn harness(lock_type: LockType, telephony: MemoryTelephony) -> Harness {
        let clock = ManualClock::new(10_000);
        let mut machine = LockStateMachine::new(
            lock_type,
            Box::new(FixedBackend::new("1234", 5)),
            Box::new(telephony),
            Box::new(clock.clone()),
        );
        let events = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::clone(&events);
        machine.subscribe(move |event| e.borrow_mut().push(event.clone()));
        Harness {
            machine,
            events,
            clock,
        }
    }

    fn pin_harness() -> Harness {
        harness(LockType::Pin, MemoryTelephony::new())
    }

    #[test]
    fn test_transition_table() {
        use LockState::*;
        assert_eq!(
            transition(Locked(LockType::Pin), LockType::Pin, Trigger::Challenge),
            Challenging(LockType::Pin)
        );
        assert_eq!(
            transition(Locked(LockType::None), LockType::None, Trigger::Challenge),
            Unlocked
        );
        assert_eq!(
            transition(Challenging(LockType::Pin), LockType::Pin, Trigger::Cancel),
            Locked(LockType::Pin)
        );
        assert_eq!(
            transition(Unlocked, LockType::Pin, Trigger::Cancel),
            Unlocked
        );
        assert_eq!(
            transition(Unlocked, LockType::Password, Trigger::Lock),
            Locked(LockType::Password)
        );
    }

    #[test]
    fn test_correct_pin_unlocks_once() {
        let mut h = pin_harness();
        assert_eq!(h.machine.authenticate(&Secret::new("1234")), Verdict::Success);
        assert!(h.machine.is_unlocked());
        assert_eq!(
            *h.events.borrow(),
            vec![LockEvent::Unlocked {
                context: UnlockContext::None
            }]
        );
    }

    #[test]
    fn test_wrong_pin_stays_challenging() {
        let mut h = pin_harness();
        let verdict = h.machine.authenticate(&Secret::new("0000"));
        assert_eq!(verdict.attempts_left(), Some(4));
        assert_eq!(h.machine.state(), LockState::Challenging(LockType::Pin));
        assert_eq!(
            h.events.borrow()[0],
            LockEvent::AttemptFailed {
                attempts_left: 4,
                lockout_secs: 0,
                final_warning: false
            }
        );
    }

    #[test]
    fn test_lockout_then_expiry_tick() {
        let mut h = pin_harness();
        for _ in 0..5 {
            h.machine.authenticate(&Secret::new("0000"));
        }
        let verdict = h.machine.authenticate(&Secret::new("1234"));
        assert_eq!(verdict.cooldown_secs(), Some(30));
        assert_eq!(
            h.events.borrow().last(),
            Some(&LockEvent::LockedOut { remaining_secs: 30 })
        );

        h.clock.advance(10);
        assert!(!h.machine.tick());
        assert_eq!(h.machine.lockout_remaining(), 20);

        h.clock.advance(20);
        assert!(h.machine.tick());
        assert_eq!(h.events.borrow().last(), Some(&LockEvent::LockoutExpired));
        assert_eq!(h.machine.attempts_left(), 5);
        assert!(!h.machine.tick());
    }

    #[test]
    fn test_malformed_input_emits_nothing() {
        let mut h = pin_harness();
        let verdict = h.machine.authenticate(&Secret::new("12"));
        assert_eq!(verdict, Verdict::Rejected(RejectReason::TooShort { min: 4 }));
        assert!(h.events.borrow().is_empty());
        assert_eq!(h.machine.attempts_left(), 5);
    }

    #[test]
    fn test_authenticate_when_unlocked_rejected() {
        let mut h = pin_harness();
        h.machine.authenticate(&Secret::new("1234"));
        assert_eq!(
            h.machine.authenticate(&Secret::new("1234")),
            Verdict::Rejected(RejectReason::NotLocked)
        );
    }

    #[test]
    fn test_request_then_unlock_delivers_context() {
        let mut h = pin_harness();
        let ctx = UnlockContext::launch(LaunchEvent::new("org.example.mail"));
        assert_eq!(h.machine.unlock_request(&ctx), BrokerResponse::Ok);
        assert_eq!(h.machine.state(), LockState::Challenging(LockType::Pin));

        h.machine.authenticate(&Secret::new("1234"));
        let events = h.events.borrow();
        assert_eq!(
            *events,
            vec![
                LockEvent::UnlockRequested {
                    context: ctx.clone(),
                    lock_type: LockType::Pin
                },
                LockEvent::Unlocked { context: ctx },
            ]
        );
    }

    #[test]
    fn test_cancel_returns_to_locked() {
        let mut h = pin_harness();
        h.machine.unlock_request(&UnlockContext::None);
        assert_eq!(h.machine.cancel(), CancelResponse::Ok);
        assert_eq!(h.machine.state(), LockState::Locked(LockType::Pin));
        assert_eq!(h.machine.cancel(), CancelResponse::NotPending);
        let cancelled = h
            .events
            .borrow()
            .iter()
            .filter(|e| matches!(e, LockEvent::UnlockCancelled { .. }))
            .count();
        assert_eq!(cancelled, 1);
    }

    #[test]
    fn test_lock_after_unlock() {
        let mut h = pin_harness();
        h.machine.authenticate(&Secret::new("1234"));
        assert!(h.machine.lock());
        assert_eq!(h.machine.state(), LockState::Locked(LockType::Pin));
        assert!(!h.machine.lock());
        assert_eq!(
            h.events.borrow().last(),
            Some(&LockEvent::Locked {
                lock_type: LockType::Pin
            })
        );
    }

    #[test]
    fn test_lock_cancels_pending_request() {
        let mut h = pin_harness();
        h.machine.unlock_request(&UnlockContext::None);
        assert!(h.machine.lock());
        assert!(!h.machine.broker().is_pending());
        assert!(h
            .events
            .borrow()
            .iter()
            .any(|e| matches!(e, LockEvent::UnlockCancelled { .. })));
    }

    #[test]
    fn test_settings_change_to_none_allows_swipe() {
        let mut h = pin_harness();
        h.machine.unlock_request(&UnlockContext::None);
        h.machine.settings_changed(LockType::None);
        assert_eq!(h.machine.state(), LockState::Locked(LockType::None));
        assert!(h.events.borrow().contains(&LockEvent::LockTypeChanged {
            from: LockType::Pin,
            to: LockType::None
        }));

        assert_eq!(
            h.machine.unlock_request(&UnlockContext::None),
            BrokerResponse::Ok
        );
        assert!(h.machine.is_unlocked());
    }

    #[test]
    fn test_settings_change_switches_input_policy() {
        let mut h = pin_harness();
        h.machine.settings_changed(LockType::Password);
        // Letters are fine for a password; the fixed backend just says no
        let verdict = h.machine.authenticate(&Secret::new("abcd"));
        assert_eq!(verdict.attempts_left(), Some(4));
    }

    #[test]
    fn test_backend_error_surfaced() {
        let clock = ManualClock::new(0);
        let mut backend = FixedBackend::new("1234", 5);
        backend.fail_with = Some("credential service gone".into());
        let mut machine = LockStateMachine::new(
            LockType::Pin,
            Box::new(backend),
            Box::new(MemoryTelephony::new()),
            Box::new(clock),
        );
        let verdict = machine.authenticate(&Secret::new("1234"));
        assert!(matches!(verdict, Verdict::Error(_)));
        assert_eq!(machine.state(), LockState::Challenging(LockType::Pin));
        assert_eq!(machine.attempts_left(), 5);
    }

    #[test]
    fn test_sim_requirement_and_unlock() {
        let telephony = MemoryTelephony::new()
            .with_card("1111", "11111111", true)
            .with_card("2222", "22222222", false);
        let mut h = harness(LockType::Pin, telephony);

        let req = h.machine.sim_pin_required();
        assert_eq!(req.count, 1);
        assert_eq!(req.first_locked_slot, Some(0));

        let verdict = h.machine.authenticate_sim(0, &Secret::new("0000"));
        assert_eq!(verdict.attempts_left(), Some(2));
        assert_eq!(h.machine.authenticate_sim(0, &Secret::new("1111")), Verdict::Success);
        assert!(!h.machine.sim_pin_required().is_required());

        assert_eq!(
            *h.events.borrow(),
            vec![
                LockEvent::SimIncorrect {
                    slot: 0,
                    attempts_left: 2,
                    pin_type: Some(SimPinType::Pin)
                },
                LockEvent::SimUnlocked { slot: 0 },
            ]
        );
        // SIM unlock never unlocks the device or touches the broker
        assert_eq!(h.machine.state(), LockState::Locked(LockType::Pin));
    }

    #[test]
    fn test_sim_puk_and_block() {
        let telephony = MemoryTelephony::new().with_card("1111", "11111111", true);
        let mut h = harness(LockType::None, telephony);

        for _ in 0..3 {
            h.machine.authenticate_sim(0, &Secret::new("0000"));
        }
        assert_eq!(h.machine.sim_pin_required().pin_type, Some(SimPinType::Puk));
        assert_eq!(
            h.machine.authenticate_sim(0, &Secret::new("1111")),
            Verdict::Rejected(RejectReason::SimNotLocked)
        );

        for _ in 0..10 {
            h.machine
                .authenticate_sim_puk(0, &Secret::new("00000000"), &Secret::new("4321"));
        }
        assert_eq!(h.events.borrow().last(), Some(&LockEvent::SimBlocked { slot: 0 }));
        assert!(!h.machine.sim_pin_required().is_required());
    }

    #[test]
    fn test_sim_unknown_slot() {
        let mut h = pin_harness();
        assert!(matches!(
            h.machine.authenticate_sim(3, &Secret::new("1111")),
            Verdict::Error(_)
        ));
    }

    #[test]
    fn test_open_degrades_without_enrollment() {
        let dir = tempfile::tempdir().unwrap();
        let config = KeyguardConfig::with_data_dir(dir.path());
        let mut machine = LockStateMachine::open(&config, Box::new(MemoryTelephony::new()));
        assert_eq!(machine.current_lock_type(), LockType::None);
        assert_eq!(
            machine.unlock_request(&UnlockContext::None),
            BrokerResponse::Ok
        );
        assert!(machine.is_unlocked());
    }

    #[test]
    fn test_open_degrades_on_corrupt_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = KeyguardConfig::with_data_dir(dir.path());
        std::fs::write(config.credential_path(), "{{{").unwrap();
        let machine = LockStateMachine::open(&config, Box::new(MemoryTelephony::new()));
        assert_eq!(machine.current_lock_type(), LockType::None);
    }

    #[test]
    fn test_open_uses_enrolled_lock_type() {
        let dir = tempfile::tempdir().unwrap();
        let config = KeyguardConfig::with_data_dir(dir.path());
        {
            let mut device = DeviceCredential::open(&config).unwrap();
            device
                .enroll(LockType::Password, &Secret::new("s3cret!"), &config.password_policy)
                .unwrap();
        }
        let mut machine = LockStateMachine::open(&config, Box::new(MemoryTelephony::new()));
        assert_eq!(machine.current_lock_type(), LockType::Password);
        assert!(machine.authenticate(&Secret::new("s3cret!")).is_success());
    }

    #[test]
    fn test_unwritable_counters_still_unlock() {
        let (mut machine, attempts, events, _) = enrolled_machine(5);
        machine.authenticate(&Secret::new("0000"));
        attempts.read_only.set(true);

        assert_eq!(machine.authenticate(&Secret::new("2580")), Verdict::Success);
        assert!(machine.is_unlocked());
        assert_eq!(
            events.borrow().last(),
            Some(&LockEvent::Unlocked {
                context: UnlockContext::None
            })
        );
    }

    #[test]
    fn test_unwritable_counters_on_failure_is_error() {
        let (mut machine, attempts, events, _) = enrolled_machine(5);
        attempts.read_only.set(true);

        let verdict = machine.authenticate(&Secret::new("0000"));
        assert!(matches!(verdict, Verdict::Error(_)));
        assert_eq!(machine.state(), LockState::Challenging(LockType::Pin));
        assert_eq!(machine.attempts_left(), 5);
        assert!(matches!(
            events.borrow().last(),
            Some(LockEvent::AuthError { .. })
        ));

        // Storage back: the owner's PIN works and nothing was consumed
        attempts.read_only.set(false);
        assert!(machine.authenticate(&Secret::new("2580")).is_success());
    }

    #[test]
    fn test_lockout_expires_after_clock_set_back() {
        let (mut machine, _, events, clock) = enrolled_machine(1);
        machine.authenticate(&Secret::new("0000"));
        assert_eq!(machine.lockout_remaining(), 30);

        clock.set(1_000_000 - 86_400);
        assert!(!machine.tick());
        assert_eq!(machine.lockout_remaining(), 30);

        clock.advance(29);
        assert!(!machine.tick());
        clock.advance(1);
        assert!(machine.tick());
        assert_eq!(events.borrow().last(), Some(&LockEvent::LockoutExpired));
        assert!(machine.authenticate(&Secret::new("2580")).is_success());
    }

    #[test]
    fn test_lockout_remaining_fails_soft() {
        let (mut machine, attempts, _, clock) = enrolled_machine(1);
        machine.authenticate(&Secret::new("0000"));
        attempts.read_only.set(true);

        // Rebasing the window after a clock step back needs a write
        clock.set(1_000_000 - 3_600);
        assert_eq!(machine.lockout_remaining(), 0);
    }

    #[test]
    fn test_attempt_limit_change_applies_to_counter() {
        let mut h = pin_harness();
        h.machine.authenticate(&Secret::new("0000"));
        h.machine.authenticate(&Secret::new("0000"));
        assert_eq!(h.machine.attempts_left(), 3);

        h.machine.attempt_limit_changed(3);
        assert_eq!(h.machine.attempts_left(), 1);
        let verdict = h.machine.authenticate(&Secret::new("0000"));
        assert_eq!(
            verdict,
            Verdict::Failed {
                attempts_left: 0,
                lockout_secs: 30
            }
        );

        h.machine.attempt_limit_changed(0);
        assert_eq!(h.machine.attempts_left(), -1);
        assert_eq!(h.machine.lockout_remaining(), 0);
    }

    #[test]
    fn test_sim_policy_events_observable() {
        let telephony = MemoryTelephony::new().with_card("1111", "11111111", true);
        let mut h = harness(LockType::Pin, telephony);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        h.machine
            .subscribe_sim_policy(move |event| s.borrow_mut().push(event.clone()));

        for _ in 0..3 {
            h.machine.authenticate_sim(0, &Secret::new("0000"));
        }
        assert_eq!(seen.borrow().len(), 1);
        assert!(matches!(
            seen.borrow()[0],
            PolicyEvent::AttemptsExceeded { .. }
        ));
    }
}
