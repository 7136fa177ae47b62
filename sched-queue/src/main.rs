//! sched-queue - Manage the scheduled post queue

use clap::{Parser, Subcommand};
use libschedcast::types::PostState;
use libschedcast::{Config, Database, Post, Result, SchedcastError};

#[derive(Parser, Debug)]
#[command(name = "sched-queue")]
#[command(version)]
#[command(about = "Manage the scheduled post queue")]
#[command(long_about = "\
sched-queue - Manage the scheduled post queue

DESCRIPTION:
    sched-queue is a Unix-style tool for inspecting and managing queued
    posts. Use it to list posts, view delivery history, cancel posts
    that have not gone out yet, requeue failed posts, or view queue
    statistics.

COMMANDS:
    list        List queued posts
    show        Show a post with its delivery history
    cancel      Cancel a pending or due post
    retry       Requeue a failed post with a fresh retry budget
    stats       Show queue statistics

USAGE EXAMPLES:
    # List everything still waiting to go out
    sched-queue list --state pending

    # List posts in JSON format
    sched-queue list --format json

    # Inspect one post and its per-platform deliveries
    sched-queue show <POST_ID>

    # Cancel a specific post
    sched-queue cancel <POST_ID>

    # Give a failed post another run
    sched-queue retry <POST_ID>

    # View queue statistics
    sched-queue stats

CONFIGURATION:
    Configuration file: ~/.config/schedcast/config.toml

    Override with environment variables:
        SCHEDCAST_CONFIG    - Path to config file

EXIT CODES:
    0 - Success
    1 - Operation failed (unknown post, post not cancellable, etc.)
    2 - Database or configuration error
    3 - Invalid input (bad format or state name)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List queued posts
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Filter by state (pending, due, posting, posted, failed, cancelled)
        #[arg(short, long)]
        state: Option<String>,

        /// Maximum number of posts to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show a post with its delivery history
    Show {
        /// Post ID to show
        post_id: String,
    },

    /// Cancel a pending or due post
    Cancel {
        /// Post ID to cancel
        post_id: String,
    },

    /// Requeue a failed post
    Retry {
        /// Post ID to retry
        post_id: String,
    },

    /// Show queue statistics
    Stats {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
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

    match cli.command {
        Commands::List {
            format,
            state,
            limit,
        } => {
            cmd_list(&db, &format, state.as_deref(), limit).await?;
        }
        Commands::Show { post_id } => {
            cmd_show(&db, &post_id).await?;
        }
        Commands::Cancel { post_id } => {
            cmd_cancel(&db, &post_id).await?;
        }
        Commands::Retry { post_id } => {
            cmd_retry(&db, &post_id).await?;
        }
        Commands::Stats { format } => {
            cmd_stats(&db, &format).await?;
        }
    }

    Ok(())
}

fn validate_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(SchedcastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}

/// List queued posts
async fn cmd_list(db: &Database, format: &str, state: Option<&str>, limit: usize) -> Result<()> {
    validate_format(format)?;

    let state = match state {
        Some(s) => Some(s.parse::<PostState>().map_err(SchedcastError::InvalidInput)?),
        None => None,
    };

    let posts = db.list_posts(state, limit).await?;

    if format == "json" {
        output_list_json(&posts);
    } else {
        output_list_text(&posts);
    }

    Ok(())
}

fn post_json(post: &Post) -> serde_json::Value {
    serde_json::json!({
        "id": post.id,
        "content": post.content,
        "platforms": post.platforms.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        "scheduled_at": post.scheduled_at,
        "state": post.state.to_string(),
        "attempt_count": post.attempt_count,
        "last_error": post.last_error,
        "created_at": post.created_at,
    })
}

/// Output posts as JSON
fn output_list_json(posts: &[Post]) {
    let json: Vec<serde_json::Value> = posts.iter().map(post_json).collect();
    println!("{}", serde_json::to_string_pretty(&json).unwrap());
}

/// Output posts as human-readable text
fn output_list_text(posts: &[Post]) {
    use chrono::Utc;

    if posts.is_empty() {
        return;
    }

    let now = Utc::now().timestamp();

    for post in posts {
        let content_preview = truncate_content(&post.content, 50);
        let platforms = post
            .platforms
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let when = match post.state {
            PostState::Pending | PostState::Due => format_time_until(now, post.scheduled_at),
            _ => post.state.to_string(),
        };

        println!(
            "{} | {} | {} | {}",
            post.id, platforms, content_preview, when
        );
    }
}

/// Truncate content to max length with ellipsis
fn truncate_content(content: &str, max_len: usize) -> String {
    if content.chars().count() <= max_len {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(max_len).collect();
        format!("{}...", truncated)
    }
}

/// Format time until scheduled time in human-readable format
fn format_time_until(now: i64, scheduled_at: i64) -> String {
    let diff = scheduled_at - now;

    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}

/// Show one post with its per-platform delivery history
async fn cmd_show(db: &Database, post_id: &str) -> Result<()> {
    use libschedcast::error::QueueError;

    let post = db
        .get_post(post_id)
        .await?
        .ok_or_else(|| QueueError::NotFound(post_id.to_string()))?;
    let deliveries = db.deliveries_for(post_id).await?;

    let json = serde_json::json!({
        "post": post_json(&post),
        "deliveries": deliveries.iter().map(|d| {
            serde_json::json!({
                "platform": d.platform.as_str(),
                "success": d.success,
                "platform_post_id": d.platform_post_id,
                "error_message": d.error_message,
                "posted_at": d.posted_at,
            })
        }).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&json).unwrap());

    Ok(())
}

/// Cancel a pending or due post
async fn cmd_cancel(db: &Database, post_id: &str) -> Result<()> {
    db.cancel(post_id).await?;
    println!("Cancelled post {}", post_id);
    Ok(())
}

/// Requeue a failed post with a fresh retry budget
async fn cmd_retry(db: &Database, post_id: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    db.retry_failed(post_id, now).await?;
    println!("Requeued post {}", post_id);
    Ok(())
}

/// Show queue statistics
async fn cmd_stats(db: &Database, format: &str) -> Result<()> {
    validate_format(format)?;

    let stats = db.stats().await?;

    if format == "json" {
        let json = serde_json::json!({
            "pending": stats.pending,
            "due": stats.due,
            "posting": stats.posting,
            "posted": stats.posted,
            "failed": stats.failed,
            "cancelled": stats.cancelled,
            "total": stats.total(),
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap());
    } else {
        println!("Pending:   {}", stats.pending);
        println!("Due:       {}", stats.due);
        println!("Posting:   {}", stats.posting);
        println!("Posted:    {}", stats.posted);
        println!("Failed:    {}", stats.failed);
        println!("Cancelled: {}", stats.cancelled);
        println!("Total:     {}", stats.total());
    }

    Ok(())
}
