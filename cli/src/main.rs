mod config;
mod logging;
mod render;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::Result;
use joule_snapshot::{RefreshEngine, RefreshError, Snapshot};
use tracing::{error, info};

use config::{LogLevel, UserConfig};
use logging::LogMode;

/// Battery health snapshots from the host's telemetry provider
#[derive(Debug, Parser)]
#[command(name = "joule", version)]
struct Cli {
    /// Refresh interval (e.g. 5s, 2m)
    #[arg(short, long)]
    interval: Option<humantime::Duration>,

    /// Capture a single snapshot and exit
    #[arg(short = '1', long)]
    once: bool,

    /// Emit snapshots as JSON, one document per refresh
    #[arg(short, long)]
    json: bool,

    /// Timeout for the provider round-trip (e.g. 10s)
    #[arg(long)]
    fetch_timeout: Option<humantime::Duration>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the config file path and exit
    #[arg(long)]
    config_path: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    if cli.config_path {
        println!("{}", config::config_path().display());
        return Ok(());
    }

    let config = UserConfig::load();
    let log_override = cli.log_level.as_deref().map(LogLevel::from_str);
    let mode = if config.log_to_file {
        LogMode::File
    } else {
        LogMode::Stderr
    };
    let _guard = logging::init(config.log_level, mode, log_override);

    let source = joule_source::system_source()?;
    let fetch_timeout = cli
        .fetch_timeout
        .map(Into::into)
        .unwrap_or(Duration::from_secs(config.fetch_timeout_secs));
    let engine = RefreshEngine::with_timeout(Arc::from(source), fetch_timeout);

    if cli.once {
        let snapshot = engine.refresh()?;
        return print_snapshot(&snapshot, cli.json);
    }

    let interval = cli
        .interval
        .map(Into::into)
        .unwrap_or(Duration::from_secs(config.refresh_secs));
    run_watch(&engine, interval, cli.json)
}

fn run_watch(engine: &RefreshEngine, interval: Duration, json: bool) -> Result<()> {
    info!(
        machine = engine.machine_name(),
        interval_secs = interval.as_secs(),
        "starting refresh loop"
    );

    loop {
        match engine.refresh() {
            Ok(snapshot) => print_snapshot(&snapshot, json)?,
            // a trigger that lands mid-refresh is dropped, not queued
            Err(RefreshError::InFlight) => {}
            Err(e) => {
                error!(error = %e, "refresh failed");
                report_failure(engine, &e);
            }
        }

        std::thread::sleep(interval);
    }
}

fn report_failure(engine: &RefreshEngine, error: &RefreshError) {
    match engine.age() {
        Some(age) => {
            let age = Duration::from_secs(age.as_secs());
            eprintln!(
                "refresh failed: {} (last good snapshot is {} old)",
                error,
                humantime::format_duration(age)
            );
        }
        None => eprintln!("refresh failed: {} (no snapshot captured yet)", error),
    }
}

fn print_snapshot(snapshot: &Snapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
    } else {
        print!("{}", render::render(snapshot));
    }
    Ok(())
}
