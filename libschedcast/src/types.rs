//! Core types for Schedcast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle state of a queued post.
///
/// Pending -> Due -> Posting -> Posted | Failed
/// Pending | Due -> Cancelled
/// Failed -> Due (manual or automatic retry)
///
/// Posted, Failed and Cancelled are terminal for the execution engine;
/// Failed posts only leave that state through an explicit retry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostState {
    Pending,
    Due,
    Posting,
    Posted,
    Failed,
    Cancelled,
}

impl PostState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostState::Pending => "pending",
            PostState::Due => "due",
            PostState::Posting => "posting",
            PostState::Posted => "posted",
            PostState::Failed => "failed",
            PostState::Cancelled => "cancelled",
        }
    }

    /// Terminal states never transition again (Failed can be retried,
    /// which is modelled as an explicit Failed -> Due edge).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PostState::Posted | PostState::Failed | PostState::Cancelled
        )
    }

    pub fn all() -> &'static [PostState] {
        &[
            PostState::Pending,
            PostState::Due,
            PostState::Posting,
            PostState::Posted,
            PostState::Failed,
            PostState::Cancelled,
        ]
    }
}

impl std::fmt::Display for PostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PostState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PostState::Pending),
            "due" => Ok(PostState::Due),
            "posting" => Ok(PostState::Posting),
            "posted" => Ok(PostState::Posted),
            "failed" => Ok(PostState::Failed),
            "cancelled" => Ok(PostState::Cancelled),
            other => Err(format!("Unknown post state: {}", other)),
        }
    }
}

/// Target platforms. Publishing happens through web-automation adapters,
/// so this list is closed and carries per-platform content limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Linkedin,
    Instagram,
}

/// Content constraints for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformLimit {
    pub max_chars: usize,
    pub max_media: usize,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
            Platform::Instagram => "instagram",
        }
    }

    pub fn limit(&self) -> PlatformLimit {
        match self {
            Platform::Twitter => PlatformLimit {
                max_chars: 280,
                max_media: 4,
            },
            Platform::Linkedin => PlatformLimit {
                max_chars: 3000,
                max_media: 9,
            },
            Platform::Instagram => PlatformLimit {
                max_chars: 2200,
                max_media: 10,
            },
        }
    }

    pub fn all() -> &'static [Platform] {
        &[Platform::Twitter, Platform::Linkedin, Platform::Instagram]
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    /// Accepts the common short aliases users type on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim() {
            "twitter" | "x" | "t" => Ok(Platform::Twitter),
            "linkedin" | "li" => Ok(Platform::Linkedin),
            "instagram" | "ig" | "insta" => Ok(Platform::Instagram),
            other => Err(format!("Unknown platform: {}", other)),
        }
    }
}

/// Parses a comma-separated platform list, expanding "all" / "*" into
/// `configured`. Order is preserved and duplicates are dropped.
pub fn parse_platform_list(
    value: &str,
    configured: &[Platform],
) -> Result<Vec<Platform>, String> {
    let mut out: Vec<Platform> = Vec::new();
    let mut push = |p: Platform, out: &mut Vec<Platform>| {
        if !out.contains(&p) {
            out.push(p);
        }
    };

    for token in value.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if token == "all" || token == "*" {
            for p in configured {
                push(*p, &mut out);
            }
        } else {
            push(token.parse::<Platform>()?, &mut out);
        }
    }
    Ok(out)
}

/// Account tier, which decides whether quota tracking applies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Premium,
}

/// A configured platform account. The identity is whatever the web UI
/// knows the user as (handle, email), used only to key quota windows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub platform: Platform,
    pub identity: String,
    #[serde(default)]
    pub tier: Tier,
}

impl Account {
    /// Key used for quota windows: "platform:identity".
    pub fn key(&self) -> String {
        format!("{}:{}", self.platform.as_str(), self.identity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub platforms: Vec<Platform>,
    pub media_paths: Vec<PathBuf>,
    pub hashtags: Vec<String>,
    pub alt_text: Option<String>,
    pub link: Option<String>,
    /// Unix timestamp the post becomes due. Immediate posts carry their
    /// enqueue time here.
    pub scheduled_at: i64,
    pub state: PostState,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    /// Content fingerprint set by the batch importer to make re-imports
    /// idempotent. Interactive posts leave it unset.
    pub idempotency_key: Option<String>,
    pub created_at: i64,
}

impl Post {
    pub fn new(content: String, platforms: Vec<Platform>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            platforms,
            media_paths: Vec::new(),
            hashtags: Vec::new(),
            alt_text: None,
            link: None,
            scheduled_at: now,
            state: PostState::Pending,
            attempt_count: 0,
            last_error: None,
            idempotency_key: None,
            created_at: now,
        }
    }

    /// Content as dispatched: hashtags appended on their own paragraph,
    /// then truncated to `max_chars` with a "..." marker if needed.
    /// Truncation counts characters, not bytes.
    pub fn full_content(&self, max_chars: Option<usize>) -> String {
        let mut content = self.content.clone();

        if !self.hashtags.is_empty() {
            let tags: Vec<String> = self
                .hashtags
                .iter()
                .map(|t| format!("#{}", t.trim_start_matches('#')))
                .collect();
            content = format!("{}\n\n{}", content, tags.join(" "))
                .trim()
                .to_string();
        }

        if let Some(max) = max_chars {
            if content.chars().count() > max {
                let kept: String = content.chars().take(max.saturating_sub(3)).collect();
                content = format!("{}...", kept);
            }
        }

        content
    }
}

/// One platform dispatch outcome for a post. Retries consult these rows
/// so an already-delivered platform is never published to twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Option<i64>,
    pub post_id: String,
    pub platform: Platform,
    pub success: bool,
    pub platform_post_id: Option<String>,
    pub error_message: Option<String>,
    pub posted_at: Option<i64>,
}

impl Delivery {
    pub fn succeeded(post_id: String, platform: Platform, platform_post_id: String) -> Self {
        Self {
            id: None,
            post_id,
            platform,
            success: true,
            platform_post_id: Some(platform_post_id),
            error_message: None,
            posted_at: Some(chrono::Utc::now().timestamp()),
        }
    }

    pub fn failed(post_id: String, platform: Platform, error_message: String) -> Self {
        Self {
            id: None,
            post_id,
            platform,
            success: false,
            platform_post_id: None,
            error_message: Some(error_message),
            posted_at: None,
        }
    }
}

/// Per-state counts for `sched-queue stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub due: u64,
    pub posting: u64,
    pub posted: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl QueueStats {
    pub fn total(&self) -> u64 {
        self.pending + self.due + self.posting + self.posted + self.failed + self.cancelled
    }
}
