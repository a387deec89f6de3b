#![no_main]

use keyguard::auth::{Charset, SecretPolicy};
use keyguard_core::Secret;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: &str| {
    let secret = Secret::new(input);
    for policy in [
        SecretPolicy::pin(),
        SecretPolicy::password(),
        SecretPolicy::sim_pin(),
        SecretPolicy::sim_puk(),
    ] {
        if policy.validate(&secret).is_ok() {
            let len = input.chars().count();
            assert!(len >= policy.min_len && len <= policy.max_len);
            if policy.charset == Charset::Digits {
                assert!(input.chars().all(|c| c.is_ascii_digit()));
            }
        }
    }
});
