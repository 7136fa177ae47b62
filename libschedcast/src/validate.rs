//! Post validation against platform constraints.
//!
//! Validation is advisory and exhaustive: every violation found is
//! reported, not just the first. Content length is checked against each
//! targeted platform so the report can name the platform whose limit is
//! exceeded. Length counts characters, not bytes.

use std::path::PathBuf;

use crate::types::{Platform, Post};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    NoPlatforms,
    EmptyContent,
    ContentTooLong {
        platform: Platform,
        limit: usize,
        length: usize,
    },
    TooManyMedia {
        platform: Platform,
        max: usize,
        count: usize,
    },
    ScheduledInPast {
        scheduled_at: i64,
    },
    MediaNotFound {
        path: PathBuf,
    },
    MediaEmpty {
        path: PathBuf,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::NoPlatforms => write!(f, "No target platforms specified"),
            Violation::EmptyContent => write!(f, "Content is empty"),
            Violation::ContentTooLong {
                platform,
                limit,
                length,
            } => write!(
                f,
                "Content exceeds {}'s {} character limit (current: {} characters)",
                platform, limit, length
            ),
            Violation::TooManyMedia {
                platform,
                max,
                count,
            } => write!(
                f,
                "Too many media attachments for {}: {} given, at most {} allowed",
                platform, count, max
            ),
            Violation::ScheduledInPast { scheduled_at } => {
                write!(f, "Scheduled time {} is in the past", scheduled_at)
            }
            Violation::MediaNotFound { path } => {
                write!(f, "Media file not found: {}", path.display())
            }
            Violation::MediaEmpty { path } => {
                write!(f, "Media file is empty: {}", path.display())
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Validate `post` as of `now` (Unix timestamp). Media files are
/// checked on the local filesystem.
pub fn validate(post: &Post, now: i64) -> ValidationReport {
    let mut violations = Vec::new();

    if post.platforms.is_empty() {
        violations.push(Violation::NoPlatforms);
    }

    if post.content.trim().is_empty() {
        violations.push(Violation::EmptyContent);
    } else {
        let length = post.content.chars().count();
        for platform in &post.platforms {
            let limit = platform.limit();
            if length > limit.max_chars {
                violations.push(Violation::ContentTooLong {
                    platform: *platform,
                    limit: limit.max_chars,
                    length,
                });
            }
        }
    }

    for platform in &post.platforms {
        let limit = platform.limit();
        if post.media_paths.len() > limit.max_media {
            violations.push(Violation::TooManyMedia {
                platform: *platform,
                max: limit.max_media,
                count: post.media_paths.len(),
            });
        }
    }

    if post.scheduled_at < now {
        violations.push(Violation::ScheduledInPast {
            scheduled_at: post.scheduled_at,
        });
    }

    for path in &post.media_paths {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() == 0 => {
                violations.push(Violation::MediaEmpty { path: path.clone() })
            }
            Ok(_) => {}
            Err(_) => violations.push(Violation::MediaNotFound { path: path.clone() }),
        }
    }

    ValidationReport { violations }
}
