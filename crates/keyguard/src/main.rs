//! Keyguard daemon - development harness for the unlock core
//!
//! Enrolls a device credential and drives the lock state machine from
//! stdin, the way the lockscreen view controllers would.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyguard::console::{self, ConsoleCommand};
use keyguard::{DeviceCredential, KeyguardConfig, LockEvent, LockStateMachine, MemoryTelephony};
use keyguard_core::{LockType, Secret};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "keyguardd")]
#[command(about = "Lockscreen unlock core development harness", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to $KEYGUARD_CONFIG or the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll the device credential
    Enroll {
        /// pin, password or none
        #[arg(short, long)]
        lock_type: LockType,

        /// New secret (ignored for none)
        #[arg(short, long, default_value = "")]
        secret: String,
    },

    /// Remove the device credential
    Clear,

    /// Show lock type, attempt counters and SIM state
    Status,

    /// Run the interactive lockscreen loop
    Run,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyguard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(KeyguardConfig::default_path);
    let config = KeyguardConfig::load_or_create(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    debug!("Using config {:?}", config_path);

    match cli.command {
        Commands::Enroll { lock_type, secret } => enroll(&config, lock_type, &Secret::new(secret)),
        Commands::Clear => {
            DeviceCredential::open(&config)?.clear()?;
            println!("Credential cleared, device unlocks with a swipe");
            Ok(())
        }
        Commands::Status => {
            let mut machine = build_machine(&config);
            println!("{}", console::handle_command(&mut machine, ConsoleCommand::Status));
            Ok(())
        }
        Commands::Run => run(&config).await,
    }
}

fn enroll(config: &KeyguardConfig, lock_type: LockType, secret: &Secret) -> Result<()> {
    let mut device = DeviceCredential::open(config)?;
    device.enroll(lock_type, secret, &config.policy_for(lock_type))?;
    println!("Enrolled {} lock", lock_type);
    Ok(())
}

fn build_machine(config: &KeyguardConfig) -> LockStateMachine {
    let telephony = MemoryTelephony::from_config(&config.sim_slots);
    LockStateMachine::open(config, Box::new(telephony))
}

async fn run(config: &KeyguardConfig) -> Result<()> {
    let mut machine = build_machine(config);
    machine.subscribe(print_event);
    machine.subscribe_policy(|event| println!("! {:?}", event));

    info!("Keyguard running, type 'help' for commands");
    println!("{}", console::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed");
                    break;
                };
                match console::parse_line(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(command)) => {
                        println!("{}", console::handle_command(&mut machine, command));
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
            _ = ticker.tick() => {
                machine.tick();
            }
        }
    }

    info!("Keyguard shutting down");
    Ok(())
}

fn print_event(event: &LockEvent) {
    match event {
        LockEvent::Unlocked { context } => match context.launch_event() {
            Some(launch) => println!("* unlocked, launching {}", launch.app_id),
            None => println!("* unlocked"),
        },
        LockEvent::UnlockRequested { lock_type, .. } => {
            println!("* {} challenge shown", lock_type)
        }
        LockEvent::AttemptFailed {
            final_warning: true,
            ..
        } => println!("* last attempt before lockout"),
        LockEvent::LockedOut { remaining_secs } => {
            println!("* locked out, try again in {}s", remaining_secs)
        }
        LockEvent::LockoutExpired => println!("* lockout over"),
        other => println!("* {:?}", other),
    }
}
