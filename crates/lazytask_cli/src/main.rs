//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `lazytask_core` linkage.
//! - `check <db_path> [threshold_minutes]` runs one reminder pass against a
//!   task database and prints the alerts it would show.

use lazytask_core::{
    QueuedAlertDispatcher, ReminderConfig, ReminderScheduler, SqliteTaskSource, SystemClock,
    TaskSnapshotSource,
};
use std::process::ExitCode;
use std::sync::Arc;

const USAGE: &str = "usage: lazytask_cli [check <db_path> [threshold_minutes]]";

fn main() -> ExitCode {
    println!("lazytask_core ping={}", lazytask_core::ping());
    println!("lazytask_core version={}", lazytask_core::core_version());

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    match args.first().map(String::as_str) {
        None => ExitCode::SUCCESS,
        Some("check") => match run_check(&args[1..]) {
            Ok(()) => ExitCode::SUCCESS,
            Err(message) => {
                eprintln!("check failed: {message}");
                ExitCode::FAILURE
            }
        },
        Some(_) => {
            eprintln!("{USAGE}");
            ExitCode::from(2)
        }
    }
}

fn run_check(args: &[String]) -> Result<(), String> {
    let db_path = args.first().ok_or_else(|| USAGE.to_string())?;
    let mut config = ReminderConfig::default();
    if let Some(raw) = args.get(1) {
        let minutes = raw
            .parse::<i64>()
            .map_err(|_| format!("threshold_minutes must be an integer, got `{raw}`"))?;
        config.threshold_ms = minutes.saturating_mul(60_000);
    }
    config.validate().map_err(|err| err.to_string())?;

    let source = SqliteTaskSource::new(db_path);
    // Surface store errors directly; the scheduler would only log them.
    let task_count = source.snapshot().map_err(|err| err.to_string())?.len();

    let alerts = Arc::new(QueuedAlertDispatcher::new(config.threshold_ms));
    let mut scheduler = ReminderScheduler::new(source, Arc::clone(&alerts), SystemClock, config);
    scheduler.start().map_err(|err| err.to_string())?;
    scheduler.stop();

    let messages = alerts.drain();
    println!(
        "check tasks={task_count} alerts={} threshold_minutes={}",
        messages.len(),
        config.threshold_minutes()
    );
    for message in messages {
        println!();
        println!("[{}] {}", message.kind.as_str(), message.title);
        println!("{}", message.body);
    }
    Ok(())
}
