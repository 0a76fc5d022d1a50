//! `SMSGuard` - personal SMS blocklist with scheduled automatic unblocking.
//!
//! Command line front end over `smsguard-core`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod commands;
mod config;

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command, ConfigAction};
use commands::Outcome;
use config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = <Cli as clap::Parser>::parse();

    // Initialize logging; stdout is reserved for command output
    let level = cli.log_level();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("smsguard={level},smsguard_core={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path).await?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    tracing::debug!("Using database {:?}", config.database_path);

    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(Outcome::Done)
            }
            ConfigAction::Init => {
                if config_path.exists() {
                    println!("Config already exists at {}", config_path.display());
                    return Ok(Outcome::Rejected);
                }
                Config::default().save(&config_path).await?;
                println!("Wrote {}", config_path.display());
                Ok(Outcome::Done)
            }
        };
    }

    let engine = commands::open_engine(&config.database_path).await?;

    match cli.command {
        Command::Block { identifier } => commands::block(&engine, &identifier).await,
        Command::Unblock {
            identifier,
            after_days: None,
        } => commands::unblock(&engine, &identifier).await,
        Command::Unblock {
            identifier,
            after_days: Some(days),
        } => commands::unblock_after(&engine, &identifier, days).await,
        Command::Status { identifier } => commands::status(&engine, &identifier).await,
        Command::List => commands::list(&engine).await,
        Command::Check { identifier } => Ok(commands::check(engine, &identifier).await),
        Command::Receive => commands::receive(engine, &config).await,
        Command::Sweep => commands::sweep(&engine).await,
        Command::Export { path } => commands::export(&engine, path, &config).await,
        Command::Import { path } => commands::import(&engine, &path).await,
        Command::Config { .. } => Ok(Outcome::Done),
    }
}
