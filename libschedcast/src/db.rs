//! Database operations for Schedcast
//!
//! The posts table is the queue. All state changes go through
//! compare-and-set updates (`WHERE id = ? AND state = ?`) so concurrent
//! pollers cannot claim the same post twice.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, QueueError, Result};
use crate::types::{Delivery, Platform, Post, PostState, QueueStats};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Use forward slashes for SQLite URL (works on both Windows and Unix)
        // Use mode=rwc to allow creating the database file if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a post into the queue. The initial state is Pending when
    /// the post is scheduled in the future, Due when its time has
    /// already arrived; `post.state` is updated to match.
    ///
    /// A post carrying an idempotency key that is already enqueued is
    /// rejected with `QueueError::DuplicateContent`.
    pub async fn enqueue(&self, post: &mut Post, now: i64) -> Result<()> {
        if let Some(key) = &post.idempotency_key {
            let existing = sqlx::query("SELECT id FROM posts WHERE idempotency_key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::SqlxError)?;
            if existing.is_some() {
                return Err(QueueError::DuplicateContent(key.clone()).into());
            }
        }

        post.state = if post.scheduled_at > now {
            PostState::Pending
        } else {
            PostState::Due
        };

        let platforms = serde_json::to_string(&post.platforms)
            .map_err(|e| DbError::Corrupt(e.to_string()))?;
        let media_paths = serde_json::to_string(&post.media_paths)
            .map_err(|e| DbError::Corrupt(e.to_string()))?;
        let hashtags = serde_json::to_string(&post.hashtags)
            .map_err(|e| DbError::Corrupt(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, content, platforms, media_paths, hashtags, alt_text, link,
                               scheduled_at, state, attempt_count, last_error, idempotency_key, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.content)
        .bind(platforms)
        .bind(media_paths)
        .bind(hashtags)
        .bind(&post.alt_text)
        .bind(&post.link)
        .bind(post.scheduled_at)
        .bind(post.state.as_str())
        .bind(post.attempt_count as i64)
        .bind(&post.last_error)
        .bind(&post.idempotency_key)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.map(|r| post_from_row(&r)).transpose()
    }

    /// Posts whose scheduled time has arrived and that are still
    /// waiting to run, oldest schedule first. Ties break on enqueue
    /// time, then ID, so the order is deterministic.
    pub async fn due_before(&self, instant: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM posts
            WHERE state IN ('pending', 'due') AND scheduled_at <= ?
            ORDER BY scheduled_at ASC, created_at ASC, id ASC
            "#,
        )
        .bind(instant)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(post_from_row).collect()
    }

    /// Compare-and-set state transition. Fails with `StaleTransition`
    /// when the post is no longer in `from`, so of two racing pollers
    /// exactly one wins the claim.
    pub async fn transition(&self, post_id: &str, from: PostState, to: PostState) -> Result<()> {
        if from.is_terminal() {
            return Err(QueueError::TerminalState {
                id: post_id.to_string(),
                state: from,
            }
            .into());
        }

        let result = sqlx::query("UPDATE posts SET state = ? WHERE id = ? AND state = ?")
            .bind(to.as_str())
            .bind(post_id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(self.stale(post_id, from).await?.into());
        }
        Ok(())
    }

    /// Push a Posting post back to Due for a later retry, recording the
    /// new attempt count and the error that caused it.
    pub async fn retry_later(
        &self,
        post_id: &str,
        scheduled_at: i64,
        attempt_count: u32,
        last_error: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET state = 'due', scheduled_at = ?, attempt_count = ?, last_error = ?
            WHERE id = ? AND state = 'posting'
            "#,
        )
        .bind(scheduled_at)
        .bind(attempt_count as i64)
        .bind(last_error)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(self.stale(post_id, PostState::Posting).await?.into());
        }
        Ok(())
    }

    /// Move a Posting post to its terminal Failed state.
    pub async fn mark_failed(
        &self,
        post_id: &str,
        attempt_count: u32,
        last_error: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET state = 'failed', attempt_count = ?, last_error = ?
            WHERE id = ? AND state = 'posting'
            "#,
        )
        .bind(attempt_count as i64)
        .bind(last_error)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(self.stale(post_id, PostState::Posting).await?.into());
        }
        Ok(())
    }

    /// Mark a Posting post fully delivered.
    pub async fn mark_posted(&self, post_id: &str) -> Result<()> {
        self.transition(post_id, PostState::Posting, PostState::Posted)
            .await
    }

    /// Requeue a Failed post. Attempt count and error are reset so the
    /// engine starts a fresh retry budget.
    pub async fn retry_failed(&self, post_id: &str, now: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET state = 'due', scheduled_at = ?, attempt_count = 0, last_error = NULL
            WHERE id = ? AND state = 'failed'
            "#,
        )
        .bind(now)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(self.stale(post_id, PostState::Failed).await?.into());
        }
        Ok(())
    }

    /// Cancel a Pending or Due post. Anything further along (running,
    /// delivered, failed) cannot be cancelled.
    pub async fn cancel(&self, post_id: &str) -> Result<()> {
        let post = self
            .get_post(post_id)
            .await?
            .ok_or_else(|| QueueError::NotFound(post_id.to_string()))?;

        match post.state {
            PostState::Pending | PostState::Due => {
                self.transition(post_id, post.state, PostState::Cancelled)
                    .await
            }
            state => Err(QueueError::InvalidCancellation {
                id: post_id.to_string(),
                state,
            }
            .into()),
        }
    }

    /// List posts, optionally filtered by state, soonest schedule first.
    pub async fn list_posts(&self, state: Option<PostState>, limit: usize) -> Result<Vec<Post>> {
        let rows = match state {
            Some(state) => {
                sqlx::query(
                    "SELECT * FROM posts WHERE state = ? ORDER BY scheduled_at ASC, created_at ASC LIMIT ?",
                )
                .bind(state.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM posts ORDER BY scheduled_at ASC, created_at ASC LIMIT ?")
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(DbError::SqlxError)?;

        rows.iter().map(post_from_row).collect()
    }

    /// Per-state queue counts.
    pub async fn stats(&self) -> Result<QueueStats> {
        let rows = sqlx::query("SELECT state, COUNT(*) AS count FROM posts GROUP BY state")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        let mut stats = QueueStats::default();
        for row in rows {
            let count: i64 = row.get("count");
            let count = count as u64;
            match row.get::<String, _>("state").as_str() {
                "pending" => stats.pending = count,
                "due" => stats.due = count,
                "posting" => stats.posting = count,
                "posted" => stats.posted = count,
                "failed" => stats.failed = count,
                "cancelled" => stats.cancelled = count,
                _ => {}
            }
        }
        Ok(stats)
    }

    /// Record one platform dispatch outcome.
    pub async fn record_delivery(&self, delivery: &Delivery) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO deliveries (post_id, platform, success, platform_post_id, error_message, posted_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&delivery.post_id)
        .bind(delivery.platform.as_str())
        .bind(if delivery.success { 1 } else { 0 })
        .bind(&delivery.platform_post_id)
        .bind(&delivery.error_message)
        .bind(delivery.posted_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// All delivery attempts for a post, oldest first.
    pub async fn deliveries_for(&self, post_id: &str) -> Result<Vec<Delivery>> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, platform, success, platform_post_id, error_message, posted_at
            FROM deliveries WHERE post_id = ? ORDER BY id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter()
            .map(|r| {
                let platform: String = r.get("platform");
                let platform = platform
                    .parse::<Platform>()
                    .map_err(DbError::Corrupt)?;
                Ok(Delivery {
                    id: r.get("id"),
                    post_id: r.get("post_id"),
                    platform,
                    success: r.get::<i32, _>("success") != 0,
                    platform_post_id: r.get("platform_post_id"),
                    error_message: r.get("error_message"),
                    posted_at: r.get("posted_at"),
                })
            })
            .collect()
    }

    /// Platforms a post has already been delivered to. The engine skips
    /// these on retry so a flaky platform cannot cause double posts on
    /// a healthy one.
    pub async fn delivered_platforms(&self, post_id: &str) -> Result<Vec<Platform>> {
        let deliveries = self.deliveries_for(post_id).await?;
        let mut platforms = Vec::new();
        for delivery in deliveries {
            if delivery.success && !platforms.contains(&delivery.platform) {
                platforms.push(delivery.platform);
            }
        }
        Ok(platforms)
    }

    async fn stale(&self, post_id: &str, expected: PostState) -> Result<QueueError> {
        match self.get_post(post_id).await? {
            Some(post) => Ok(QueueError::StaleTransition {
                id: post_id.to_string(),
                expected,
                actual: post.state,
            }),
            None => Ok(QueueError::NotFound(post_id.to_string())),
        }
    }
}

fn post_from_row(r: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let platforms: String = r.get("platforms");
    let media_paths: String = r.get("media_paths");
    let hashtags: String = r.get("hashtags");
    let state: String = r.get("state");

    Ok(Post {
        id: r.get("id"),
        content: r.get("content"),
        platforms: serde_json::from_str(&platforms).map_err(|e| DbError::Corrupt(e.to_string()))?,
        media_paths: serde_json::from_str(&media_paths)
            .map_err(|e| DbError::Corrupt(e.to_string()))?,
        hashtags: serde_json::from_str(&hashtags).map_err(|e| DbError::Corrupt(e.to_string()))?,
        alt_text: r.get("alt_text"),
        link: r.get("link"),
        scheduled_at: r.get("scheduled_at"),
        state: state.parse().map_err(DbError::Corrupt)?,
        attempt_count: r.get::<i64, _>("attempt_count") as u32,
        last_error: r.get("last_error"),
        idempotency_key: r.get("idempotency_key"),
        created_at: r.get("created_at"),
    })
}
