//! Free-tier usage quota tracking.
//!
//! Free accounts get a fixed number of posts per rolling window,
//! anchored at the first post of the window rather than a calendar
//! boundary. Premium accounts short-circuit to Allowed and never touch
//! the store. Expired windows reset lazily on the next consume.

use crate::error::{DbError, Result};
use crate::types::{Account, Tier};
use crate::Database;

/// Posts a free-tier account may publish per window.
pub const FREE_TIER_LIMIT: u32 = 5;

/// Rolling window length: 7 days.
pub const WINDOW_SECONDS: i64 = 7 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    /// Denied until `reset_at` (window start plus window length).
    Denied { reset_at: i64 },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed)
    }
}

pub struct QuotaTracker {
    limit: u32,
    window: i64,
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self {
            limit: FREE_TIER_LIMIT,
            window: WINDOW_SECONDS,
        }
    }

    /// Custom limit and window, for tests and future per-tier tuning.
    pub fn with_limit(limit: u32, window: i64) -> Self {
        Self { limit, window }
    }

    /// Read-only availability check. Used before claiming a due post so
    /// a denied post is deferred without burning an attempt.
    pub async fn check(&self, db: &Database, account: &Account, now: i64) -> Result<QuotaDecision> {
        if account.tier == Tier::Premium {
            return Ok(QuotaDecision::Allowed);
        }

        match self.window_row(db, &account.key()).await? {
            Some((window_start, posts_used)) => {
                if now >= window_start + self.window {
                    // Window expired; the next consume re-anchors it.
                    Ok(QuotaDecision::Allowed)
                } else if posts_used < self.limit {
                    Ok(QuotaDecision::Allowed)
                } else {
                    Ok(QuotaDecision::Denied {
                        reset_at: window_start + self.window,
                    })
                }
            }
            None => Ok(QuotaDecision::Allowed),
        }
    }

    /// Consume one quota slot if available. Called only after a
    /// successful publish so failed attempts never count against the
    /// window.
    pub async fn check_and_consume(
        &self,
        db: &Database,
        account: &Account,
        now: i64,
    ) -> Result<QuotaDecision> {
        if account.tier == Tier::Premium {
            return Ok(QuotaDecision::Allowed);
        }

        let key = account.key();
        match self.window_row(db, &key).await? {
            Some((window_start, _)) if now < window_start + self.window => {
                // Guarded increment: the WHERE clause re-checks the
                // count so two concurrent consumers cannot both take
                // the last slot.
                let result = sqlx::query(
                    r#"
                    UPDATE quota_windows SET posts_used = posts_used + 1
                    WHERE account = ? AND posts_used < ?
                    "#,
                )
                .bind(&key)
                .bind(self.limit as i64)
                .execute(db.pool())
                .await
                .map_err(DbError::SqlxError)?;

                if result.rows_affected() == 0 {
                    Ok(QuotaDecision::Denied {
                        reset_at: window_start + self.window,
                    })
                } else {
                    Ok(QuotaDecision::Allowed)
                }
            }
            _ => {
                // No window yet, or the previous one expired: anchor a
                // fresh window at this post.
                sqlx::query(
                    r#"
                    INSERT INTO quota_windows (account, window_start, posts_used)
                    VALUES (?, ?, 1)
                    ON CONFLICT(account)
                    DO UPDATE SET window_start = excluded.window_start, posts_used = 1
                    "#,
                )
                .bind(&key)
                .bind(now)
                .execute(db.pool())
                .await
                .map_err(DbError::SqlxError)?;

                Ok(QuotaDecision::Allowed)
            }
        }
    }

    /// Remaining slots in the current window, for status output.
    pub async fn remaining(&self, db: &Database, account: &Account, now: i64) -> Result<Option<u32>> {
        if account.tier == Tier::Premium {
            return Ok(None);
        }

        match self.window_row(db, &account.key()).await? {
            Some((window_start, posts_used)) if now < window_start + self.window => {
                Ok(Some(self.limit.saturating_sub(posts_used)))
            }
            _ => Ok(Some(self.limit)),
        }
    }

    async fn window_row(&self, db: &Database, key: &str) -> Result<Option<(i64, u32)>> {
        let row = sqlx::query_as::<_, (i64, i64)>(
            "SELECT window_start, posts_used FROM quota_windows WHERE account = ?",
        )
        .bind(key)
        .fetch_optional(db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|(start, used)| (start, used as u32)))
    }
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new()
    }
}
