//! sched-send - Background daemon for scheduled posting
//!
//! Monitors the post queue and publishes content when it comes due.

use clap::Parser;
use libschedcast::adapters::CommandAdapter;
use libschedcast::engine::{Engine, PollReport, RetryPolicy};
use libschedcast::error::ConfigError;
use libschedcast::{Config, Database, Result, SchedcastError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "sched-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled posting")]
#[command(long_about = "\
sched-send - Background daemon for scheduled posting

DESCRIPTION:
    sched-send is a long-running daemon that monitors the Schedcast
    queue and publishes posts when they come due.

    Each poll it claims due posts, checks the posting quota for every
    target platform, dispatches content through the configured adapter
    command, and records per-platform delivery results. Failed posts
    are retried with exponential backoff; quota-limited posts are left
    untouched until their window resets.

USAGE:
    # Run in foreground (logs to stderr)
    sched-send

    # Run with custom poll interval
    sched-send --poll-interval 30

    # Enable verbose logging
    sched-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current poll)

CONFIGURATION:
    Configuration file: ~/.config/schedcast/config.toml

    [adapter]
    command = \"schedcast-publish\"   # receives platform, content, media

    [scheduling]
    poll_interval = 60      # seconds between polls
    max_retries = 3         # publish attempts per post
    retry_delay = 300       # base backoff in seconds
    max_retry_delay = 21600 # backoff cap in seconds

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Run one poll and exit (for testing)
    #[arg(long, hide = true)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    libschedcast::logging::init(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    let adapter_config = config
        .adapter
        .as_ref()
        .ok_or_else(|| ConfigError::MissingField("adapter.command".to_string()))?;

    let engine = Engine::new(
        db,
        Arc::new(CommandAdapter::from_config(adapter_config)),
        config.accounts.clone(),
        RetryPolicy::from_config(&config.scheduling),
    );

    info!("sched-send daemon starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let poll_interval = cli.poll_interval.unwrap_or(config.scheduling.poll_interval);
    info!("Poll interval: {}s", poll_interval);

    if cli.once {
        let report = engine.poll(chrono::Utc::now()).await?;
        log_report(&report);
        println!("{}", serde_json::to_string(&report_json(&report)).unwrap());
        info!("sched-send: polled once, exiting");
    } else {
        run_daemon_loop(&engine, poll_interval, shutdown).await;
    }

    info!("sched-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| SchedcastError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}

/// Main daemon loop
async fn run_daemon_loop(engine: &Engine, poll_interval: u64, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        match engine.poll(chrono::Utc::now()).await {
            Ok(report) => log_report(&report),
            Err(e) => error!("Poll failed: {}", e),
        }

        // Sleep until next poll, checking for shutdown every second
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

fn log_report(report: &PollReport) {
    if report.published + report.retried + report.failed + report.deferred + report.skipped == 0 {
        return;
    }
    info!(
        published = report.published,
        retried = report.retried,
        failed = report.failed,
        deferred = report.deferred,
        skipped = report.skipped,
        "poll complete"
    );
}

fn report_json(report: &PollReport) -> serde_json::Value {
    serde_json::json!({
        "published": report.published,
        "retried": report.retried,
        "failed": report.failed,
        "deferred": report.deferred,
        "skipped": report.skipped,
    })
}
