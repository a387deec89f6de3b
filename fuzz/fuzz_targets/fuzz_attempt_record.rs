#![no_main]

use arbitrary::Arbitrary;
use keyguard::auth::LEDGER_KEY;
use keyguard::{AttemptLedger, LockoutPolicy, MemorySettings, SettingsStore};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    /// Whatever ended up in the settings store
    record: &'a str,
    max_attempts: u8,
    failures: u8,
    now: u64,
}

fuzz_target!(|input: Input| {
    let mut store = MemorySettings::new();
    store.set(LEDGER_KEY, input.record).unwrap();

    let max = u32::from(input.max_attempts % 16);
    let mut ledger = AttemptLedger::new(
        Box::new(store),
        LockoutPolicy::progressive().with_max_attempts(max),
    );

    // Any stored record reads back within bounds
    let state = ledger.get_state();
    if state.max_attempt != 0 {
        assert!(state.current_attempt <= state.max_attempt);
    }
    assert!(ledger.lockout_remaining_seconds(input.now) <= 1800);

    for i in 0..input.failures % 32 {
        let state = ledger
            .record_failure(input.now.saturating_add(u64::from(i)))
            .unwrap();
        if max != 0 {
            assert!(state.current_attempt <= max);
        }
    }

    ledger.record_success().unwrap();
    let state = ledger.get_state();
    assert_eq!(state.current_attempt, 0);
    assert!(!state.is_locked_out());
});
