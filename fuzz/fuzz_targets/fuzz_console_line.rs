#![no_main]

use keyguard::console::{parse_line, ConsoleCommand};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|line: &str| {
    match parse_line(line) {
        Ok(None) => assert!(line.trim().is_empty()),
        Ok(Some(ConsoleCommand::Auth { secret })) => {
            // Secrets are single words taken verbatim from the line
            assert!(line.contains(secret.expose()));
            assert!(!secret.expose().contains(char::is_whitespace));
        }
        Ok(Some(_)) | Err(_) => {}
    }
});
