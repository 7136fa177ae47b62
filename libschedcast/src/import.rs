//! CSV batch import.
//!
//! Expected columns: `content` (required), `platforms`,
//! `scheduled_time`, `media_paths`, `alt_text`, `hashtags`, `link`.
//! Missing optional columns behave as empty.
//!
//! The whole file is parsed and validated before anything is enqueued:
//! a structural problem (unreadable CSV, missing `content` column)
//! aborts the import, while per-row problems are collected into the
//! report and the remaining rows proceed. Each accepted row gets an
//! idempotency key derived from its content, platform list and schedule
//! expression, so re-importing the same file skips rows that are
//! already queued instead of double-posting them.

use chrono::{DateTime, TimeZone};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ImportError, QueueError, Result, SchedcastError};
use crate::schedule;
use crate::types::{parse_platform_list, Platform, Post};
use crate::validate;
use crate::Database;

#[derive(Debug, Deserialize)]
struct CsvRow {
    content: String,
    #[serde(default)]
    platforms: String,
    #[serde(default)]
    scheduled_time: String,
    #[serde(default)]
    media_paths: String,
    #[serde(default)]
    alt_text: String,
    #[serde(default)]
    hashtags: String,
    #[serde(default)]
    link: String,
}

/// One rejected row with everything wrong about it.
#[derive(Debug, Clone)]
pub struct RowRejection {
    /// 1-based data row number (the header is not counted).
    pub row: usize,
    pub problems: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub accepted: Vec<Post>,
    pub rejected: Vec<RowRejection>,
    pub skipped_duplicates: usize,
    pub dry_run: bool,
}

impl ImportReport {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }
}

pub struct BatchImporter<'a> {
    db: &'a Database,
    configured: Vec<Platform>,
}

impl<'a> BatchImporter<'a> {
    /// `configured` is what "all" expands to in the platforms column.
    pub fn new(db: &'a Database, configured: Vec<Platform>) -> Self {
        Self { db, configured }
    }

    pub async fn import_path<Tz: TimeZone>(
        &self,
        path: &Path,
        now: &DateTime<Tz>,
        dry_run: bool,
    ) -> Result<ImportReport> {
        let file = std::fs::File::open(path)
            .map_err(|e| SchedcastError::InvalidInput(format!("{}: {}", path.display(), e)))?;
        self.import_reader(file, now, dry_run).await
    }

    pub async fn import_reader<R: std::io::Read, Tz: TimeZone>(
        &self,
        reader: R,
        now: &DateTime<Tz>,
        dry_run: bool,
    ) -> Result<ImportReport> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers().map_err(ImportError::Read)?;
        if !headers.iter().any(|h| h == "content") {
            return Err(ImportError::MissingColumn("content".to_string()).into());
        }

        // Parse and validate everything before touching the queue.
        let mut accepted: Vec<Post> = Vec::new();
        let mut rejected: Vec<RowRejection> = Vec::new();

        for (index, record) in csv_reader.deserialize::<CsvRow>().enumerate() {
            let row_number = index + 1;
            let record = record.map_err(ImportError::Read)?;

            match self.build_post(&record, now) {
                Ok(post) => accepted.push(post),
                Err(problems) => rejected.push(RowRejection {
                    row: row_number,
                    problems,
                }),
            }
        }

        let mut report = ImportReport {
            accepted: Vec::new(),
            rejected,
            skipped_duplicates: 0,
            dry_run,
        };
        let now_ts = now.with_timezone(&chrono::Utc).timestamp();

        for mut post in accepted {
            if dry_run {
                // Read-only duplicate probe so dry-run output matches
                // what a real import would do.
                if self.is_duplicate(&post).await? {
                    report.skipped_duplicates += 1;
                } else {
                    report.accepted.push(post);
                }
                continue;
            }

            match self.db.enqueue(&mut post, now_ts).await {
                Ok(()) => {
                    debug!(post_id = %post.id, scheduled_at = post.scheduled_at, "imported post");
                    report.accepted.push(post);
                }
                Err(SchedcastError::Queue(QueueError::DuplicateContent(_))) => {
                    report.skipped_duplicates += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            skipped = report.skipped_duplicates,
            dry_run,
            "import finished"
        );
        Ok(report)
    }

    /// Builds a queueable post from one CSV row, or the list of
    /// everything wrong with it.
    fn build_post<Tz: TimeZone>(
        &self,
        record: &CsvRow,
        now: &DateTime<Tz>,
    ) -> std::result::Result<Post, Vec<String>> {
        let mut problems = Vec::new();

        let platforms = match parse_platform_list(&record.platforms, &self.configured) {
            Ok(platforms) => platforms,
            Err(e) => {
                problems.push(e);
                Vec::new()
            }
        };

        let scheduled_at = match schedule::resolve(&record.scheduled_time, now) {
            Ok(instant) => instant.timestamp(),
            Err(e) => {
                problems.push(e.to_string());
                now.with_timezone(&chrono::Utc).timestamp()
            }
        };

        let mut post = Post::new(record.content.clone(), platforms);
        post.scheduled_at = scheduled_at;
        post.media_paths = split_list(&record.media_paths)
            .into_iter()
            .map(PathBuf::from)
            .collect();
        post.hashtags = split_list(&record.hashtags);
        post.alt_text = non_empty(&record.alt_text);
        post.link = non_empty(&record.link);
        post.idempotency_key = Some(idempotency_key(
            &record.content,
            &record.platforms,
            &record.scheduled_time,
        ));

        let report = validate::validate(&post, now.with_timezone(&chrono::Utc).timestamp());
        problems.extend(report.violations.iter().map(|v| v.to_string()));

        if problems.is_empty() {
            Ok(post)
        } else {
            Err(problems)
        }
    }

    async fn is_duplicate(&self, post: &Post) -> Result<bool> {
        use sqlx::Row;
        let Some(key) = &post.idempotency_key else {
            return Ok(false);
        };
        let row = sqlx::query("SELECT COUNT(*) AS count FROM posts WHERE idempotency_key = ?")
            .bind(key)
            .fetch_one(self.db.pool())
            .await
            .map_err(crate::error::DbError::SqlxError)?;
        Ok(row.get::<i64, _>("count") > 0)
    }
}

/// Hex SHA-256 over the raw row fields that identify a post.
pub fn idempotency_key(content: &str, platforms: &str, scheduled_time: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(b"|");
    hasher.update(platforms.as_bytes());
    hasher.update(b"|");
    hasher.update(scheduled_time.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    async fn test_db() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("posts.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        (dir, db)
    }

    fn fixed_now() -> chrono::DateTime<Utc> {
        // Friday 2024-03-15 12:00:00 UTC
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn all_platforms() -> Vec<Platform> {
        Platform::all().to_vec()
    }

    #[tokio::test]
    async fn test_import_single_row() {
        let (_dir, db) = test_db().await;
        let importer = BatchImporter::new(&db, all_platforms());
        let csv = "content,platforms,scheduled_time\n\
                   Monday post,twitter,2024-03-18 08:00\n";

        let report = importer
            .import_reader(csv.as_bytes(), &fixed_now(), false)
            .await
            .unwrap();

        assert_eq!(report.accepted_count(), 1);
        assert!(report.rejected.is_empty());

        let post = &report.accepted[0];
        assert_eq!(post.content, "Monday post");
        assert_eq!(post.platforms, vec![Platform::Twitter]);
        assert_eq!(
            post.scheduled_at,
            Utc.with_ymd_and_hms(2024, 3, 18, 8, 0, 0).unwrap().timestamp()
        );
        assert_eq!(post.state, crate::types::PostState::Pending);
    }

    #[tokio::test]
    async fn test_import_missing_content_column_fails_fast() {
        let (_dir, db) = test_db().await;
        let importer = BatchImporter::new(&db, all_platforms());
        let csv = "platforms,scheduled_time\ntwitter,2024-03-18 08:00\n";

        let result = importer
            .import_reader(csv.as_bytes(), &fixed_now(), false)
            .await;
        assert!(matches!(
            result,
            Err(SchedcastError::Import(ImportError::MissingColumn(_)))
        ));

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.total(), 0, "nothing may be enqueued on abort");
    }

    #[tokio::test]
    async fn test_import_bad_rows_rejected_good_rows_kept() {
        let (_dir, db) = test_db().await;
        let importer = BatchImporter::new(&db, all_platforms());
        let csv = format!(
            "content,platforms,scheduled_time\n\
             Good post,twitter,in 2 hours\n\
             {},twitter,in 2 hours\n\
             Bad platform,friendster,in 2 hours\n\
             Bad schedule,twitter,next blue moon\n",
            "a".repeat(300)
        );

        let report = importer
            .import_reader(csv.as_bytes(), &fixed_now(), false)
            .await
            .unwrap();

        assert_eq!(report.accepted_count(), 1);
        assert_eq!(report.rejected.len(), 3);

        assert_eq!(report.rejected[0].row, 2);
        assert!(report.rejected[0].problems[0].contains("280"));
        assert_eq!(report.rejected[1].row, 3);
        assert!(report.rejected[1].problems[0].contains("friendster"));
        assert_eq!(report.rejected[2].row, 4);
        assert!(report.rejected[2].problems[0].contains("Unresolvable"));
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let (_dir, db) = test_db().await;
        let importer = BatchImporter::new(&db, all_platforms());
        let csv = "content,platforms,scheduled_time\n\
                   First,twitter,2024-03-18 08:00\n\
                   Second,linkedin,2024-03-19 09:00\n";

        let first = importer
            .import_reader(csv.as_bytes(), &fixed_now(), false)
            .await
            .unwrap();
        assert_eq!(first.accepted_count(), 2);
        assert_eq!(first.skipped_duplicates, 0);

        let second = importer
            .import_reader(csv.as_bytes(), &fixed_now(), false)
            .await
            .unwrap();
        assert_eq!(second.accepted_count(), 0);
        assert_eq!(second.skipped_duplicates, 2);

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.total(), 2, "re-import must not create new posts");
    }

    #[tokio::test]
    async fn test_dry_run_enqueues_nothing() {
        let (_dir, db) = test_db().await;
        let importer = BatchImporter::new(&db, all_platforms());
        let csv = "content,platforms,scheduled_time\nDraft,twitter,in 1 day\n";

        let report = importer
            .import_reader(csv.as_bytes(), &fixed_now(), true)
            .await
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(report.accepted_count(), 1);

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.total(), 0);
    }

    #[tokio::test]
    async fn test_optional_columns_parsed() {
        let (_dir, db) = test_db().await;
        let importer = BatchImporter::new(&db, all_platforms());
        let csv = "content,platforms,scheduled_time,hashtags,link,alt_text\n\
                   Tagged,linkedin,in 1 hour,\"rust, release\",https://example.com,A chart\n";

        let report = importer
            .import_reader(csv.as_bytes(), &fixed_now(), false)
            .await
            .unwrap();

        let post = &report.accepted[0];
        assert_eq!(post.hashtags, vec!["rust".to_string(), "release".to_string()]);
        assert_eq!(post.link, Some("https://example.com".to_string()));
        assert_eq!(post.alt_text, Some("A chart".to_string()));
    }

    #[tokio::test]
    async fn test_all_expands_to_configured_platforms() {
        let (_dir, db) = test_db().await;
        let importer = BatchImporter::new(&db, vec![Platform::Twitter, Platform::Linkedin]);
        let csv = "content,platforms,scheduled_time\nEverywhere,all,in 1 hour\n";

        let report = importer
            .import_reader(csv.as_bytes(), &fixed_now(), false)
            .await
            .unwrap();
        assert_eq!(
            report.accepted[0].platforms,
            vec![Platform::Twitter, Platform::Linkedin]
        );
    }

    #[test]
    fn test_idempotency_key_is_stable_and_distinct() {
        let a = idempotency_key("hello", "twitter", "in 2 hours");
        let b = idempotency_key("hello", "twitter", "in 2 hours");
        let c = idempotency_key("hello", "linkedin", "in 2 hours");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
