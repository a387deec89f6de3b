//! End-to-end lockscreen scenarios
//!
//! Each test wires the real device credential, attempt ledger, broker and
//! emulated telephony into a lock state machine and plays the part of the
//! view controllers and the launch handler.

use std::cell::RefCell;
use std::rc::Rc;

use keyguard::{
    AttemptLedger, BrokerResponse, DeviceCredential, KeyguardConfig, LockEvent, LockState,
    LockStateMachine, LockoutPolicy, MemorySettings, MemoryTelephony, PolicyEvent, RejectReason,
    SecretPolicy, Verdict,
};
use keyguard_core::{
    LaunchEvent, LockType, ManualClock, Secret, SimCardInfo, SimPinType, SimStatus, UnlockContext,
};

type Recorded = Rc<RefCell<Vec<LockEvent>>>;

fn enrolled_device(lock_type: LockType, secret: &str, max_attempts: u32) -> DeviceCredential {
    let ledger = AttemptLedger::new(
        Box::new(MemorySettings::new()),
        LockoutPolicy::default().with_max_attempts(max_attempts),
    );
    let mut device = DeviceCredential::new(Box::new(MemorySettings::new()), ledger).unwrap();
    let policy = match lock_type {
        LockType::Password => SecretPolicy::password(),
        _ => SecretPolicy::pin(),
    };
    device.enroll(lock_type, &Secret::new(secret), &policy).unwrap();
    device
}

fn machine_with(
    device: DeviceCredential,
    telephony: MemoryTelephony,
) -> (LockStateMachine, Recorded) {
    let lock_type = device.lock_type();
    let mut machine = LockStateMachine::new(
        lock_type,
        Box::new(device),
        Box::new(telephony),
        Box::new(ManualClock::new(1_700_000_000)),
    );
    let events: Recorded = Rc::new(RefCell::new(Vec::new()));
    let e = Rc::clone(&events);
    machine.subscribe(move |event| e.borrow_mut().push(event.clone()));
    (machine, events)
}

/// Launch handler: starts the app carried by an `Unlocked` context
fn attach_launcher(machine: &mut LockStateMachine) -> Rc<RefCell<Vec<String>>> {
    let launched = Rc::new(RefCell::new(Vec::new()));
    let l = Rc::clone(&launched);
    machine.subscribe(move |event| {
        if let LockEvent::Unlocked { context } = event {
            if let Some(launch) = context.launch_event() {
                l.borrow_mut().push(launch.app_id.clone());
            }
        }
    });
    launched
}

fn unlocked_contexts(events: &Recorded) -> Vec<UnlockContext> {
    events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            LockEvent::Unlocked { context } => Some(context.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_wrong_pins_count_down_to_lockout() {
    let (mut machine, events) =
        machine_with(enrolled_device(LockType::Pin, "2580", 5), MemoryTelephony::new());
    let exceeded = Rc::new(RefCell::new(Vec::new()));
    let x = Rc::clone(&exceeded);
    machine.subscribe_policy(move |event| x.borrow_mut().push(event.clone()));

    for _ in 0..5 {
        machine.authenticate(&Secret::new("1111"));
    }

    let failures: Vec<(i32, u64)> = events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            LockEvent::AttemptFailed {
                attempts_left,
                lockout_secs,
                ..
            } => Some((*attempts_left, *lockout_secs)),
            _ => None,
        })
        .collect();
    assert_eq!(failures, vec![(4, 0), (3, 0), (2, 0), (1, 0), (0, 30)]);
    assert_eq!(
        events.borrow().last(),
        Some(&LockEvent::LockedOut { remaining_secs: 30 })
    );
    assert_eq!(
        *exceeded.borrow(),
        vec![PolicyEvent::AttemptsExceeded {
            lockout_secs: 30,
            lockout_count: 1
        }]
    );

    // Even the right PIN waits out the cooldown
    let verdict = machine.authenticate(&Secret::new("2580"));
    assert_eq!(
        verdict,
        Verdict::Rejected(RejectReason::CooldownActive { remaining_secs: 30 })
    );
    assert!(!machine.is_unlocked());
}

#[test]
fn test_final_attempt_warning() {
    let (mut machine, events) =
        machine_with(enrolled_device(LockType::Pin, "2580", 2), MemoryTelephony::new());
    machine.authenticate(&Secret::new("1111"));
    assert!(events.borrow().contains(&LockEvent::AttemptFailed {
        attempts_left: 1,
        lockout_secs: 0,
        final_warning: true
    }));
}

#[test]
fn test_camera_unlocks_swipe_device_without_challenge() {
    let ledger = AttemptLedger::new(Box::new(MemorySettings::new()), LockoutPolicy::default());
    let device = DeviceCredential::new(Box::new(MemorySettings::new()), ledger).unwrap();
    let (mut machine, events) = machine_with(device, MemoryTelephony::new());
    assert_eq!(machine.current_lock_type(), LockType::None);

    assert_eq!(
        machine.unlock_request(&UnlockContext::None),
        BrokerResponse::Ok
    );

    // Delivered before unlock_request returned, and nothing else was raised
    assert_eq!(
        *events.borrow(),
        vec![LockEvent::Unlocked {
            context: UnlockContext::None
        }]
    );
    assert_eq!(machine.state(), LockState::Unlocked);
    assert!(!machine.broker().is_pending());
}

#[test]
fn test_notification_launch_after_password() {
    let (mut machine, events) = machine_with(
        enrolled_device(LockType::Password, "hunter22", 5),
        MemoryTelephony::new(),
    );
    let launched = attach_launcher(&mut machine);
    let context = UnlockContext::launch(
        LaunchEvent::new("org.example.messages")
            .with_notification(42)
            .with_arg("thread", "7"),
    );

    assert_eq!(machine.unlock_request(&context), BrokerResponse::Ok);
    assert_eq!(
        events.borrow()[0],
        LockEvent::UnlockRequested {
            context: context.clone(),
            lock_type: LockType::Password
        }
    );

    assert!(machine.authenticate(&Secret::new("hunter22")).is_success());
    assert_eq!(unlocked_contexts(&events), vec![context]);
    assert_eq!(*launched.borrow(), vec!["org.example.messages".to_string()]);

    // Nothing re-delivers the launch
    assert_eq!(
        machine.authenticate(&Secret::new("hunter22")),
        Verdict::Rejected(RejectReason::NotLocked)
    );
    assert_eq!(launched.borrow().len(), 1);
}

#[test]
fn test_second_request_busy_while_pending() {
    let (mut machine, events) =
        machine_with(enrolled_device(LockType::Pin, "2580", 5), MemoryTelephony::new());
    let launched = attach_launcher(&mut machine);
    let context = UnlockContext::launch(LaunchEvent::new("org.example.calendar"));

    assert_eq!(machine.unlock_request(&context), BrokerResponse::Ok);
    assert_eq!(
        machine.unlock_request(&UnlockContext::None),
        BrokerResponse::Busy
    );
    let requested = events
        .borrow()
        .iter()
        .filter(|event| matches!(event, LockEvent::UnlockRequested { .. }))
        .count();
    assert_eq!(requested, 1);

    assert!(machine.authenticate(&Secret::new("2580")).is_success());
    assert_eq!(unlocked_contexts(&events), vec![context]);
    assert_eq!(*launched.borrow(), vec!["org.example.calendar".to_string()]);
}

#[test]
fn test_cancelled_request_frees_the_slot() {
    let (mut machine, events) =
        machine_with(enrolled_device(LockType::Pin, "2580", 5), MemoryTelephony::new());
    let first = UnlockContext::launch(LaunchEvent::new("org.example.first"));

    machine.unlock_request(&first);
    machine.cancel();
    assert_eq!(machine.state(), LockState::Locked(LockType::Pin));
    assert!(events.borrow().contains(&LockEvent::UnlockCancelled {
        context: first.clone()
    }));

    let second = UnlockContext::launch(LaunchEvent::new("org.example.second"));
    assert_eq!(machine.unlock_request(&second), BrokerResponse::Ok);
    machine.authenticate(&Secret::new("2580"));
    assert_eq!(unlocked_contexts(&events), vec![second]);
}

#[test]
fn test_sim_requirement_reports_first_locked_slot() {
    let telephony = MemoryTelephony::new()
        .with_card("1234", "12345678", true)
        .with_card("4321", "87654321", false);
    let (mut machine, _) = machine_with(enrolled_device(LockType::Pin, "2580", 5), telephony);

    let requirement = machine.sim_pin_required();
    assert_eq!(requirement.count, 1);
    assert_eq!(requirement.first_locked_slot, Some(0));
    assert_eq!(requirement.pin_type, Some(SimPinType::Pin));

    // Telephony reports slot 1 dropping back to PIN as well
    machine.sim_status_changed(vec![
        SimCardInfo::new(0, SimStatus::PinRequired, 3),
        SimCardInfo::new(1, SimStatus::PinRequired, 3),
    ]);
    assert_eq!(machine.sim_pin_required().count, 2);
    assert_eq!(machine.sim_pin_required().first_locked_slot, Some(0));
}

#[test]
fn test_sim_unlock_then_device_unlock() {
    let telephony = MemoryTelephony::new().with_card("1234", "12345678", true);
    let (mut machine, events) = machine_with(enrolled_device(LockType::Pin, "2580", 5), telephony);

    assert!(machine.authenticate_sim(0, &Secret::new("1234")).is_success());
    assert!(!machine.sim_pin_required().is_required());
    assert_eq!(machine.state(), LockState::Locked(LockType::Pin));

    assert!(machine.authenticate(&Secret::new("2580")).is_success());
    assert_eq!(
        *events.borrow(),
        vec![
            LockEvent::SimUnlocked { slot: 0 },
            LockEvent::Unlocked {
                context: UnlockContext::None
            },
        ]
    );
}

#[test]
fn test_lockout_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = KeyguardConfig::with_data_dir(dir.path());
    config.lockout = LockoutPolicy::default().with_max_attempts(2);

    DeviceCredential::open(&config)
        .unwrap()
        .enroll(LockType::Pin, &Secret::new("2580"), &config.pin_policy)
        .unwrap();

    let mut machine = LockStateMachine::open(&config, Box::new(MemoryTelephony::new()));
    assert_eq!(machine.current_lock_type(), LockType::Pin);
    machine.authenticate(&Secret::new("1111"));
    let verdict = machine.authenticate(&Secret::new("1111"));
    assert_eq!(verdict.attempts_left(), Some(0));
    drop(machine);

    let mut machine = LockStateMachine::open(&config, Box::new(MemoryTelephony::new()));
    let verdict = machine.authenticate(&Secret::new("2580"));
    assert!(matches!(
        verdict,
        Verdict::Rejected(RejectReason::CooldownActive { .. })
    ));
    assert!(machine.lockout_remaining() > 0);
}
