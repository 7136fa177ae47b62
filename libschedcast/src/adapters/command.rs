//! Adapter that shells out to an external automation command.
//!
//! The command is invoked once per platform dispatch as:
//!
//! ```text
//! <command> [args...] <platform> <content> [media paths...]
//! ```
//!
//! Exit code 0 means published; stdout (trimmed) is taken as the
//! platform post ID when non-empty. Any other exit code is a publish
//! failure carrying the tail of stderr.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use super::Adapter;
use crate::config::AdapterConfig;
use crate::error::AdapterError;
use crate::types::Platform;

pub struct CommandAdapter {
    program: String,
    args: Vec<String>,
}

impl CommandAdapter {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    pub fn from_config(config: &AdapterConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }
}

#[async_trait]
impl Adapter for CommandAdapter {
    async fn publish(
        &self,
        platform: Platform,
        content: &str,
        media: &[PathBuf],
    ) -> Result<String, AdapterError> {
        debug!(
            command = %self.program,
            platform = %platform,
            media_count = media.len(),
            "invoking automation command"
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(platform.as_str())
            .arg(content)
            .args(media.iter().map(|p| p.as_os_str()))
            .output()
            .await
            .map_err(|e| AdapterError::Unavailable(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(3)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AdapterError::Publish(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                tail.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            Ok(uuid::Uuid::new_v4().to_string())
        } else {
            Ok(stdout)
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}
