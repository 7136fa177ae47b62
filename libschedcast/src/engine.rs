//! The execution engine: polls for due posts, claims them, and
//! dispatches them through the configured adapter.
//!
//! Claiming is a compare-and-set transition to Posting, so several
//! engine instances can poll the same database and each due post runs
//! exactly once. Dispatch is sequential per post and per platform; a
//! delivery row is written for every attempt, and retries republish
//! only to platforms without a successful delivery.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::adapters::Adapter;
use crate::config::SchedulingConfig;
use crate::error::{QueueError, Result, SchedcastError};
use crate::quota::{QuotaDecision, QuotaTracker};
use crate::types::{Account, Delivery, Platform, Post, PostState};
use crate::Database;

/// Retry behavior for failed dispatch cycles.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(300),
            max_delay: Duration::from_secs(6 * 3600),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &SchedulingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_secs(config.retry_delay),
            max_delay: Duration::from_secs(config.max_retry_delay),
        }
    }

    /// Exponential backoff: base * 2^attempt, capped at max_delay.
    pub fn backoff(&self, attempt_count: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt_count);
        let delay = self
            .base_delay
            .saturating_mul(factor.min(u32::MAX as u64) as u32);
        delay.min(self.max_delay)
    }
}

/// What one poll cycle did, for logging and `--once` output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub published: usize,
    pub retried: usize,
    pub failed: usize,
    pub deferred: usize,
    pub skipped: usize,
}

enum Outcome {
    Published,
    Retried,
    Failed,
    Deferred,
    Skipped,
}

pub struct Engine {
    db: Database,
    adapter: Arc<dyn Adapter>,
    accounts: HashMap<Platform, Account>,
    quota: QuotaTracker,
    retry: RetryPolicy,
}

impl Engine {
    /// Posts carry platforms, not identities, so the engine publishes
    /// through one account per platform. When the config lists several,
    /// the first wins and the rest are ignored with a warning.
    pub fn new(
        db: Database,
        adapter: Arc<dyn Adapter>,
        accounts: Vec<Account>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            db,
            adapter,
            accounts: accounts_by_platform(accounts),
            quota: QuotaTracker::new(),
            retry,
        }
    }

    /// Run one poll cycle as of `now`. Per-post failures are absorbed
    /// into the report; only store-level errors abort the cycle.
    pub async fn poll(&self, now: DateTime<Utc>) -> Result<PollReport> {
        let due = self.db.due_before(now.timestamp()).await?;
        debug!(count = due.len(), "due posts found");

        let mut report = PollReport::default();
        for post in due {
            match self.process_post(&post, now).await? {
                Outcome::Published => report.published += 1,
                Outcome::Retried => report.retried += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::Deferred => report.deferred += 1,
                Outcome::Skipped => report.skipped += 1,
            }
        }
        Ok(report)
    }

    async fn process_post(&self, post: &Post, now: DateTime<Utc>) -> Result<Outcome> {
        let delivered = self.db.delivered_platforms(&post.id).await?;
        let remaining: Vec<Platform> = post
            .platforms
            .iter()
            .copied()
            .filter(|p| !delivered.contains(p))
            .collect();

        // Quota is evaluated before the claim: a denied post stays
        // waiting untouched, with no attempt burned.
        for platform in &remaining {
            if let Some(account) = self.accounts.get(platform) {
                if let QuotaDecision::Denied { reset_at } =
                    self.quota.check(&self.db, account, now.timestamp()).await?
                {
                    info!(
                        post_id = %post.id,
                        platform = %platform,
                        reset_at,
                        "quota exhausted, deferring post"
                    );
                    return Ok(Outcome::Deferred);
                }
            }
        }

        if !self.claim(post).await? {
            return Ok(Outcome::Skipped);
        }

        // Interrupted earlier run: every platform already delivered,
        // only the terminal state is missing.
        if remaining.is_empty() {
            self.db.mark_posted(&post.id).await?;
            info!(post_id = %post.id, "post finalized, all platforms already delivered");
            return Ok(Outcome::Published);
        }

        let mut last_error = String::new();
        let mut all_delivered = true;

        for platform in remaining {
            let limit = platform.limit();
            let content = post.full_content(Some(limit.max_chars));

            match self
                .adapter
                .publish(platform, &content, &post.media_paths)
                .await
            {
                Ok(platform_post_id) => {
                    info!(
                        post_id = %post.id,
                        platform = %platform,
                        platform_post_id = %platform_post_id,
                        "published"
                    );
                    self.db
                        .record_delivery(&Delivery::succeeded(
                            post.id.clone(),
                            platform,
                            platform_post_id,
                        ))
                        .await?;
                    self.consume_quota(platform, now).await?;
                }
                Err(e) => {
                    warn!(post_id = %post.id, platform = %platform, error = %e, "publish failed");
                    last_error = e.to_string();
                    all_delivered = false;
                    self.db
                        .record_delivery(&Delivery::failed(
                            post.id.clone(),
                            platform,
                            last_error.clone(),
                        ))
                        .await?;
                }
            }
        }

        if all_delivered {
            self.db.mark_posted(&post.id).await?;
            return Ok(Outcome::Published);
        }

        let attempts = post.attempt_count + 1;
        if attempts < self.retry.max_retries {
            let delay = self.retry.backoff(attempts);
            let next = now.timestamp() + delay.as_secs() as i64;
            self.db
                .retry_later(&post.id, next, attempts, &last_error)
                .await?;
            info!(
                post_id = %post.id,
                attempt = attempts,
                retry_in_secs = delay.as_secs(),
                "dispatch incomplete, will retry"
            );
            Ok(Outcome::Retried)
        } else {
            self.db.mark_failed(&post.id, attempts, &last_error).await?;
            error!(post_id = %post.id, attempts, error = %last_error, "post failed permanently");
            Ok(Outcome::Failed)
        }
    }

    /// Claim the post for this engine instance. Pending posts whose
    /// time arrived are promoted to Due first, then Due -> Posting.
    /// Losing either race to a sibling poller is a skip, not an error.
    async fn claim(&self, post: &Post) -> Result<bool> {
        if post.state == PostState::Pending {
            match self
                .db
                .transition(&post.id, PostState::Pending, PostState::Due)
                .await
            {
                Ok(()) => {}
                Err(SchedcastError::Queue(QueueError::StaleTransition { .. })) => {}
                Err(e) => return Err(e),
            }
        }

        match self
            .db
            .transition(&post.id, PostState::Due, PostState::Posting)
            .await
        {
            Ok(()) => Ok(true),
            Err(SchedcastError::Queue(QueueError::StaleTransition { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Count a successful publish against the platform account. A
    /// denial here means another writer took the last slot after our
    /// pre-claim check; the post is already out, so just log it.
    async fn consume_quota(&self, platform: Platform, now: DateTime<Utc>) -> Result<()> {
        if let Some(account) = self.accounts.get(&platform) {
            if let QuotaDecision::Denied { reset_at } = self
                .quota
                .check_and_consume(&self.db, account, now.timestamp())
                .await?
            {
                warn!(
                    account = %account.key(),
                    reset_at,
                    "publish landed above quota, window already exhausted"
                );
            }
        }
        Ok(())
    }
}

fn accounts_by_platform(accounts: Vec<Account>) -> HashMap<Platform, Account> {
    let mut by_platform: HashMap<Platform, Account> = HashMap::new();
    for account in accounts {
        if let Some(kept) = by_platform.get(&account.platform) {
            warn!(
                platform = account.platform.as_str(),
                kept = %kept.identity,
                ignored = %account.identity,
                "multiple accounts configured for platform, using the first"
            );
            continue;
        }
        by_platform.insert(account.platform, account);
    }
    by_platform
}
