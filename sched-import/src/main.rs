//! sched-import - Bulk import scheduled posts from CSV

use clap::Parser;
use libschedcast::{BatchImporter, Config, Database, Result, SchedcastError};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sched-import")]
#[command(version)]
#[command(about = "Bulk import scheduled posts from CSV")]
#[command(long_about = "\
sched-import - Bulk import scheduled posts from CSV

DESCRIPTION:
    sched-import reads a CSV file of posts and enqueues every valid row.
    The file is parsed and validated in full before anything is written:
    a structurally broken file (unreadable, missing the 'content'
    column) aborts without touching the queue, while individual bad
    rows are reported and skipped.

    Rows are deduplicated by content, platforms and schedule, so
    re-importing the same file is safe and skips rows that are already
    queued.

CSV FORMAT:
    content,platforms,scheduled_time,media_paths,alt_text,hashtags,link

    content         required; the post text
    platforms       comma-separated within quotes; \"all\" for every
                    configured platform
    scheduled_time  schedule expression (empty = post immediately)
    media_paths     comma-separated file paths
    hashtags        comma-separated tags

USAGE EXAMPLES:
    # Import a batch
    sched-import posts.csv

    # Validate without enqueuing anything
    sched-import posts.csv --dry-run

    # Machine-readable report
    sched-import posts.csv --format json

EXIT CODES:
    0 - Import finished (individual rows may still have been rejected)
    1 - Operation failed
    2 - Database or configuration error
    3 - Structural CSV error; nothing was imported
")]
struct Cli {
    /// CSV file to import
    csv_file: PathBuf,

    /// Parse and validate only; enqueue nothing
    #[arg(long)]
    dry_run: bool,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
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
    if cli.format != "text" && cli.format != "json" {
        return Err(SchedcastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            cli.format
        )));
    }

    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    let importer = BatchImporter::new(&db, config.configured_platforms());
    let now = chrono::Local::now();
    let report = importer
        .import_path(&cli.csv_file, &now, cli.dry_run)
        .await?;

    if cli.format == "json" {
        let json = serde_json::json!({
            "dry_run": report.dry_run,
            "accepted": report.accepted.iter().map(|p| p.id.clone()).collect::<Vec<_>>(),
            "skipped_duplicates": report.skipped_duplicates,
            "rejected": report.rejected.iter().map(|r| {
                serde_json::json!({ "row": r.row, "problems": r.problems })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap());
    } else {
        let verb = if report.dry_run { "Would import" } else { "Imported" };
        println!(
            "{} {} post(s), skipped {} duplicate(s), rejected {} row(s)",
            verb,
            report.accepted.len(),
            report.skipped_duplicates,
            report.rejected.len()
        );
        for rejection in &report.rejected {
            for problem in &rejection.problems {
                println!("  row {}: {}", rejection.row, problem);
            }
        }
    }

    Ok(())
}
