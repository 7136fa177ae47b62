//! Configuration management for Schedcast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::types::{Account, Platform};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    /// External automation command the execution engine publishes through.
    /// Absent means publishing is unavailable (sched-send refuses to start).
    pub adapter: Option<AdapterConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Seconds between execution engine poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Publish attempts before a post lands in Failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base retry backoff in seconds, doubled per attempt.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    /// Backoff ceiling in seconds.
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay: u64,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    300
}

fn default_max_retry_delay() -> u64 {
    21_600
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            max_retry_delay: default_max_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/schedcast/posts.db".to_string(),
            },
            accounts: Vec::new(),
            scheduling: SchedulingConfig::default(),
            adapter: None,
        }
    }

    /// Platforms with a configured account, in config order. This is what
    /// "all" expands to on the command line and in CSV rows.
    pub fn configured_platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        for account in &self.accounts {
            if !platforms.contains(&account.platform) {
                platforms.push(account.platform);
            }
        }
        platforms
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SCHEDCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("schedcast").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("schedcast"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tier;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[database]
path = "/tmp/schedcast/posts.db"

[[accounts]]
platform = "twitter"
identity = "alice"
tier = "free"

[[accounts]]
platform = "linkedin"
identity = "alice@example.com"
tier = "premium"

[scheduling]
poll_interval = 30
max_retries = 5

[adapter]
command = "schedcast-browser"
args = ["--headless"]
"#;
        let config: Config = toml::from_str(toml_str).unwrap();

        assert_eq!(config.database.path, "/tmp/schedcast/posts.db");
        assert_eq!(config.accounts.len(), 2);
        assert_eq!(config.accounts[0].platform, Platform::Twitter);
        assert_eq!(config.accounts[1].tier, Tier::Premium);
        assert_eq!(config.scheduling.poll_interval, 30);
        assert_eq!(config.scheduling.max_retries, 5);
        // unset fields fall back to defaults
        assert_eq!(config.scheduling.retry_delay, 300);
        assert_eq!(config.scheduling.max_retry_delay, 21_600);
        let adapter = config.adapter.unwrap();
        assert_eq!(adapter.command, "schedcast-browser");
        assert_eq!(adapter.args, vec!["--headless".to_string()]);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str("[database]\npath = \"posts.db\"").unwrap();

        assert!(config.accounts.is_empty());
        assert!(config.adapter.is_none());
        assert_eq!(config.scheduling.poll_interval, 60);
        assert_eq!(config.scheduling.max_retries, 3);
    }

    #[test]
    fn test_configured_platforms_dedupes() {
        let toml_str = r#"
[database]
path = "posts.db"

[[accounts]]
platform = "twitter"
identity = "work"

[[accounts]]
platform = "twitter"
identity = "personal"

[[accounts]]
platform = "instagram"
identity = "work"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.configured_platforms(),
            vec![Platform::Twitter, Platform::Instagram]
        );
    }

    #[test]
    fn test_default_config_round_trips() {
        let config = Config::default_config();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.database.path, config.database.path);
    }
}
