//! Command handlers mapping user intents onto the blocklist engine.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use smsguard_core::snapshot;
use smsguard_core::{
    BlockOutcome, BlocklistEngine, Error, InterceptionGate, SqliteRetentionStore, Sweeper,
    Verdict, days_remaining, retention_days,
};

use crate::config::Config;

/// Engine as wired by the binary.
pub type Engine = BlocklistEngine<SqliteRetentionStore>;

/// How a command ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The request was carried out.
    Done,
    /// The engine refused the request; the user was told why.
    Rejected,
    /// The gate would drop a message from this sender.
    Suppressed,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => Self::SUCCESS,
            Outcome::Rejected => Self::from(3u8),
            Outcome::Suppressed => Self::from(1u8),
        }
    }
}

/// Open the configured database and build the engine.
pub async fn open_engine(database_path: &Path) -> anyhow::Result<Arc<Engine>> {
    if let Some(dir) = database_path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let path = database_path
        .to_str()
        .context("database path is not valid UTF-8")?;
    let store = SqliteRetentionStore::new(path)
        .await
        .with_context(|| format!("failed to open database {path}"))?;

    Ok(Arc::new(BlocklistEngine::with_system_clock(store)))
}

/// Block a number indefinitely.
pub async fn block(engine: &Engine, identifier: &str) -> anyhow::Result<Outcome> {
    match engine.block(identifier).await {
        Ok(BlockOutcome::Blocked) => println!("Blocked: {identifier}"),
        Ok(BlockOutcome::AlreadyBlocked) => println!("Already blocked: {identifier}"),
        Err(Error::InvalidArgument(_)) => return Ok(missing_identifier()),
        Err(e) => return Err(e.into()),
    }
    Ok(Outcome::Done)
}

/// Remove a number's block immediately.
pub async fn unblock(engine: &Engine, identifier: &str) -> anyhow::Result<Outcome> {
    match engine.unblock_now(identifier).await {
        Ok(true) => println!("Unblocked: {identifier}"),
        Ok(false) => println!("Not blocked: {identifier}"),
        Err(Error::InvalidArgument(_)) => return Ok(missing_identifier()),
        Err(e) => return Err(e.into()),
    }
    Ok(Outcome::Done)
}

fn missing_identifier() -> Outcome {
    println!("Enter a phone number");
    Outcome::Rejected
}

/// Schedule a number to be unblocked after `days`.
pub async fn unblock_after(
    engine: &Engine,
    identifier: &str,
    days: i64,
) -> anyhow::Result<Outcome> {
    match engine.schedule_unblock(identifier, retention_days(days)).await {
        Ok(scheduled) => {
            println!("{}", scheduled.description());
            Ok(Outcome::Done)
        }
        Err(Error::RetentionAlreadySet { unblock_at, .. }) => {
            let days = days_remaining(unblock_at - engine.now());
            println!("Deletion period is already set ({days} days remaining)");
            Ok(Outcome::Rejected)
        }
        Err(Error::InvalidArgument(reason)) => {
            println!("Enter a valid positive number of days ({reason})");
            Ok(Outcome::Rejected)
        }
        Err(e) => Err(e.into()),
    }
}

/// Report whether a number is blocked and for how long.
pub async fn status(engine: &Engine, identifier: &str) -> anyhow::Result<Outcome> {
    let record = match engine.status(identifier).await {
        Ok(record) => record,
        Err(Error::InvalidArgument(_)) => return Ok(missing_identifier()),
        Err(e) => return Err(e.into()),
    };

    match record {
        Some(record) => match record.time_remaining(engine.now()) {
            Some(remaining) => println!(
                "{identifier} is blocked (unblocks in {} days)",
                days_remaining(remaining)
            ),
            None => println!("{identifier} is blocked"),
        },
        None => println!("{identifier} is not blocked"),
    }
    Ok(Outcome::Done)
}

/// Print active blocks, newest first.
pub async fn list(engine: &Engine) -> anyhow::Result<Outcome> {
    let records = engine.list_active_records().await?;
    if records.is_empty() {
        println!("Block list is empty");
        return Ok(Outcome::Done);
    }

    let now = engine.now();
    for record in records.iter().rev() {
        match record.time_remaining(now) {
            Some(remaining) => println!(
                "{}\t(unblocks in {} days)",
                record.identifier,
                days_remaining(remaining)
            ),
            None => println!("{}", record.identifier),
        }
    }
    Ok(Outcome::Done)
}

/// Run the gate once for `identifier`.
pub async fn check(engine: Arc<Engine>, identifier: &str) -> Outcome {
    let gate = InterceptionGate::new(engine);
    if gate.should_suppress(identifier).await {
        println!("suppress {identifier}");
        Outcome::Suppressed
    } else {
        println!("deliver {identifier}");
        Outcome::Done
    }
}

/// Act as the inbound transport: gate every sender read from stdin.
pub async fn receive(engine: Arc<Engine>, config: &Config) -> anyhow::Result<Outcome> {
    let sweeper = (config.sweep_interval_secs > 0).then(|| {
        Sweeper::spawn(
            Arc::clone(&engine),
            StdDuration::from_secs(config.sweep_interval_secs),
        )
    });
    let gate = InterceptionGate::new(engine);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        println!("{}", gate_line(&gate, &line).await);
    }

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }
    Ok(Outcome::Done)
}

/// Gate one input line. The sender is passed on as received, minus the line ending.
async fn gate_line(gate: &InterceptionGate<SqliteRetentionStore>, line: &str) -> String {
    let sender = line.trim_end_matches('\r');
    let verdict = if gate.should_suppress(sender).await {
        Verdict::Suppress
    } else {
        Verdict::Deliver
    };
    format!("{verdict} {sender}")
}

/// Remove lapsed blocks now.
pub async fn sweep(engine: &Engine) -> anyhow::Result<Outcome> {
    let removed = engine.sweep_expired().await?;
    println!("Removed {removed} expired blocks");
    Ok(Outcome::Done)
}

/// Export active numbers. Nothing is written when the list is empty.
pub async fn export(
    engine: &Engine,
    path: Option<PathBuf>,
    config: &Config,
) -> anyhow::Result<Outcome> {
    let entries = snapshot::export_entries(engine).await?;
    if entries.is_empty() {
        println!("No blocked numbers to export");
        return Ok(Outcome::Done);
    }

    let path = path.unwrap_or_else(|| PathBuf::from(&config.export_file_name));
    snapshot::write_entries(&path, &entries)
        .await
        .with_context(|| format!("export to {} failed", path.display()))?;

    println!("Exported {} numbers to {}", entries.len(), path.display());
    Ok(Outcome::Done)
}

/// Block every number in a snapshot file.
pub async fn import(engine: &Engine, path: &Path) -> anyhow::Result<Outcome> {
    let report = snapshot::import_from_file(engine, path)
        .await
        .with_context(|| format!("import from {} failed", path.display()))?;

    println!(
        "Imported {} numbers ({} already blocked, {} skipped)",
        report.imported, report.already_blocked, report.skipped
    );
    Ok(Outcome::Done)
}
