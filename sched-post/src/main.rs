//! sched-post - Enqueue a post for scheduled publishing

use clap::Parser;
use libschedcast::types::parse_platform_list;
use libschedcast::{Config, Database, Result, SchedcastError};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sched-post")]
#[command(version)]
#[command(about = "Enqueue a post for scheduled publishing")]
#[command(long_about = "\
sched-post - Enqueue a post for scheduled publishing

DESCRIPTION:
    sched-post validates a post against its target platforms and places
    it in the Schedcast queue. The sched-send daemon picks it up when
    its scheduled time arrives. With no schedule, the post becomes due
    immediately.

SCHEDULE EXPRESSIONS:
    2024-03-18 08:00          absolute (local time)
    in 2 hours                relative (minutes/hours/days/weeks)
    tomorrow at 09:00         named day
    today at 17:30            named day (must still be in the future)

USAGE EXAMPLES:
    # Post to twitter right away
    sched-post \"Hello world\" --platforms twitter

    # Schedule for all configured platforms
    sched-post \"Launch!\" --platforms all --schedule \"tomorrow at 09:00\"

    # Read content from stdin
    echo \"Hello\" | sched-post --platforms li,ig --schedule \"in 3 hours\"

CONFIGURATION:
    Configuration file: ~/.config/schedcast/config.toml
    Database location: ~/.local/share/schedcast/posts.db

    Override with environment variables:
        SCHEDCAST_CONFIG   - Path to config file

EXIT CODES:
    0 - Post enqueued
    1 - Operation failed
    2 - Database or configuration error
    3 - Invalid input (validation failure, bad schedule expression)
")]
struct Cli {
    /// Content to post (reads from stdin if not provided)
    content: Option<String>,

    /// Target platform(s), comma-separated; "all" expands to every
    /// configured platform
    #[arg(short, long, default_value = "all")]
    platforms: String,

    /// Schedule expression (omit to post immediately)
    #[arg(short, long)]
    schedule: Option<String>,

    /// Media file paths (repeatable)
    #[arg(short, long)]
    media: Vec<PathBuf>,

    /// Hashtags to append, comma-separated (leading '#' optional)
    #[arg(long)]
    hashtags: Option<String>,

    /// Alt text for media attachments
    #[arg(long)]
    alt_text: Option<String>,

    /// Link to include
    #[arg(long)]
    link: Option<String>,

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

    let content = match cli.content {
        Some(content) => content,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| SchedcastError::InvalidInput(format!("Failed to read stdin: {}", e)))?;
            buffer.trim_end().to_string()
        }
    };

    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    let platforms = parse_platform_list(&cli.platforms, &config.configured_platforms())
        .map_err(SchedcastError::InvalidInput)?;

    let now = chrono::Local::now();
    let scheduled_at = match cli.schedule.as_deref() {
        Some(expr) => libschedcast::schedule::resolve(expr, &now)?,
        None => now.with_timezone(&chrono::Utc),
    };

    let mut post = libschedcast::Post::new(content, platforms);
    post.scheduled_at = scheduled_at.timestamp();
    post.media_paths = cli.media;
    post.hashtags = cli
        .hashtags
        .map(|h| {
            h.split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();
    post.alt_text = cli.alt_text;
    post.link = cli.link;

    let report = libschedcast::validate::validate(&post, now.timestamp());
    if !report.is_ok() {
        let problems: Vec<String> = report.violations.iter().map(|v| v.to_string()).collect();
        return Err(SchedcastError::InvalidInput(problems.join("; ")));
    }

    db.enqueue(&mut post, now.timestamp()).await?;

    if cli.format == "json" {
        let json = serde_json::json!({
            "id": post.id,
            "state": post.state.as_str(),
            "scheduled_at": post.scheduled_at,
            "platforms": post.platforms,
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap());
    } else {
        let when = chrono::DateTime::from_timestamp(post.scheduled_at, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| post.scheduled_at.to_string());
        println!("Enqueued {} ({}) for {}", post.id, post.state, when);
    }

    Ok(())
}
