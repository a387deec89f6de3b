//! Line-oriented command console for the development harness
//!
//! Each input line is parsed into a `ConsoleCommand` and dispatched to the
//! lock state machine; the reply is a single human-readable line.

use keyguard_core::{LaunchEvent, Secret, UnlockContext};

use crate::auth::Verdict;
use crate::broker::{BrokerResponse, CancelResponse};
use crate::lock::LockStateMachine;

/// A console request
#[derive(Debug, Clone)]
pub enum ConsoleCommand {
    /// Request an unlock, optionally on behalf of an app launch
    Unlock { app_id: Option<String> },
    Cancel,
    Auth { secret: Secret },
    Sim { slot: usize, pin: Secret },
    Puk {
        slot: usize,
        puk: Secret,
        new_pin: Secret,
    },
    Lock,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "commands: unlock [app_id] | cancel | auth <secret> | sim <slot> <pin> \
                        | puk <slot> <puk> <new_pin> | lock | status | help | quit";

/// Parse one input line; `Ok(None)` for a blank line
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb, args.as_slice()) {
        ("unlock", []) => ConsoleCommand::Unlock { app_id: None },
        ("unlock", [app_id]) => ConsoleCommand::Unlock {
            app_id: Some(app_id.to_string()),
        },
        ("cancel", []) => ConsoleCommand::Cancel,
        ("auth", [secret]) => ConsoleCommand::Auth {
            secret: Secret::new(*secret),
        },
        ("sim", [slot, pin]) => ConsoleCommand::Sim {
            slot: parse_slot(slot)?,
            pin: Secret::new(*pin),
        },
        ("puk", [slot, puk, new_pin]) => ConsoleCommand::Puk {
            slot: parse_slot(slot)?,
            puk: Secret::new(*puk),
            new_pin: Secret::new(*new_pin),
        },
        ("lock", []) => ConsoleCommand::Lock,
        ("status", []) => ConsoleCommand::Status,
        ("help", []) => ConsoleCommand::Help,
        ("quit" | "exit", []) => ConsoleCommand::Quit,
        ("unlock" | "cancel" | "auth" | "sim" | "puk" | "lock" | "status" | "help" | "quit"
        | "exit", _) => return Err(format!("wrong arguments for '{}'\n{}", verb, HELP)),
        _ => return Err(format!("unknown command '{}'\n{}", verb, HELP)),
    };
    Ok(Some(command))
}

fn parse_slot(s: &str) -> Result<usize, String> {
    s.parse().map_err(|_| format!("invalid slot '{}'", s))
}

/// Run a command against the machine and describe the outcome
pub fn handle_command(machine: &mut LockStateMachine, command: ConsoleCommand) -> String {
    match command {
        ConsoleCommand::Unlock { app_id } => {
            let context = match app_id {
                Some(app_id) => UnlockContext::launch(LaunchEvent::new(app_id)),
                None => UnlockContext::None,
            };
            match machine.unlock_request(&context) {
                BrokerResponse::Ok if machine.is_unlocked() => "unlocked".to_string(),
                BrokerResponse::Ok => format!("enter {}", machine.current_lock_type()),
                BrokerResponse::Busy => "busy: another unlock request is pending".to_string(),
            }
        }
        ConsoleCommand::Cancel => match machine.cancel() {
            CancelResponse::Ok => "cancelled".to_string(),
            CancelResponse::NotPending => "nothing to cancel".to_string(),
        },
        ConsoleCommand::Auth { secret } => describe_verdict(&machine.authenticate(&secret)),
        ConsoleCommand::Sim { slot, pin } => {
            describe_verdict(&machine.authenticate_sim(slot, &pin))
        }
        ConsoleCommand::Puk { slot, puk, new_pin } => {
            describe_verdict(&machine.authenticate_sim_puk(slot, &puk, &new_pin))
        }
        ConsoleCommand::Lock => {
            if machine.lock() {
                "locked".to_string()
            } else {
                "already locked".to_string()
            }
        }
        ConsoleCommand::Status => describe_status(machine),
        ConsoleCommand::Help => HELP.to_string(),
        ConsoleCommand::Quit => "bye".to_string(),
    }
}

fn describe_verdict(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Success => "accepted".to_string(),
        Verdict::Failed {
            attempts_left,
            lockout_secs,
        } => match (*attempts_left, *lockout_secs) {
            (_, secs) if secs > 0 => format!("wrong, locked out for {}s", secs),
            (left, _) if left < 0 => "wrong".to_string(),
            (left, _) => format!("wrong, {} attempts left", left),
        },
        Verdict::Rejected(reason) => format!("rejected: {}", reason),
        Verdict::Error(reason) => format!("error: {}", reason),
    }
}

fn describe_status(machine: &mut LockStateMachine) -> String {
    let mut status = format!(
        "state: {:?}, lock type: {}",
        machine.state(),
        machine.current_lock_type()
    );
    match machine.attempts_left() {
        left if left < 0 => status.push_str(", attempts: unlimited"),
        left => status.push_str(&format!(", attempts left: {}", left)),
    }
    let lockout = machine.lockout_remaining();
    if lockout > 0 {
        status.push_str(&format!(", locked out for {}s", lockout));
    }
    let sim = machine.sim_pin_required();
    if let (Some(slot), Some(pin_type)) = (sim.first_locked_slot, sim.pin_type) {
        status.push_str(&format!(
            ", SIM {} needs {:?} ({} locked)",
            slot, pin_type, sim.count
        ));
    }
    status
}
