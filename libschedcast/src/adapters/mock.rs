//! Scriptable in-memory adapter for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use super::Adapter;
use crate::error::AdapterError;
use crate::types::Platform;

/// Records every publish call and can be scripted to fail the first N
/// attempts per platform, or to fail permanently.
pub struct MockAdapter {
    attempts: Mutex<HashMap<Platform, u32>>,
    published: Mutex<Vec<(Platform, String)>>,
    fail_first: u32,
    permanent_failure: bool,
}

impl MockAdapter {
    /// Succeeds on every call.
    pub fn succeeding() -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            published: Mutex::new(Vec::new()),
            fail_first: 0,
            permanent_failure: false,
        }
    }

    /// Fails the first `n` attempts per platform, then succeeds.
    pub fn failing_first(n: u32) -> Self {
        Self {
            fail_first: n,
            ..Self::succeeding()
        }
    }

    /// Fails every call.
    pub fn always_failing() -> Self {
        Self {
            permanent_failure: true,
            ..Self::succeeding()
        }
    }

    /// Attempts made against `platform` so far.
    pub fn attempts_for(&self, platform: Platform) -> u32 {
        *self.attempts.lock().unwrap().get(&platform).unwrap_or(&0)
    }

    /// Everything successfully published, in call order.
    pub fn published(&self) -> Vec<(Platform, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    async fn publish(
        &self,
        platform: Platform,
        content: &str,
        _media: &[PathBuf],
    ) -> Result<String, AdapterError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let entry = attempts.entry(platform).or_insert(0);
            *entry += 1;
            *entry
        };

        if self.permanent_failure {
            return Err(AdapterError::Publish("scripted permanent failure".into()));
        }
        if attempt <= self.fail_first {
            return Err(AdapterError::Publish(format!(
                "scripted failure on attempt {}",
                attempt
            )));
        }

        self.published
            .lock()
            .unwrap()
            .push((platform, content.to_string()));
        Ok(format!("{}-{}", platform, attempt))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_succeeding_mock_records_publishes() {
        let adapter = MockAdapter::succeeding();

        let id = adapter
            .publish(Platform::Twitter, "hello", &[])
            .await
            .unwrap();
        assert_eq!(id, "twitter-1");
        assert_eq!(
            adapter.published(),
            vec![(Platform::Twitter, "hello".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failing_first_then_succeeds() {
        let adapter = MockAdapter::failing_first(2);

        assert!(adapter.publish(Platform::Twitter, "x", &[]).await.is_err());
        assert!(adapter.publish(Platform::Twitter, "x", &[]).await.is_err());
        assert!(adapter.publish(Platform::Twitter, "x", &[]).await.is_ok());
        assert_eq!(adapter.attempts_for(Platform::Twitter), 3);
    }

    #[tokio::test]
    async fn test_failure_counters_are_per_platform() {
        let adapter = MockAdapter::failing_first(1);

        assert!(adapter.publish(Platform::Twitter, "x", &[]).await.is_err());
        // linkedin has its own counter, so its first attempt also fails
        assert!(adapter.publish(Platform::Linkedin, "x", &[]).await.is_err());
        assert!(adapter.publish(Platform::Twitter, "x", &[]).await.is_ok());
        assert!(adapter.publish(Platform::Linkedin, "x", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_always_failing_never_publishes() {
        let adapter = MockAdapter::always_failing();

        for _ in 0..3 {
            assert!(adapter.publish(Platform::Instagram, "x", &[]).await.is_err());
        }
        assert!(adapter.published().is_empty());
        assert_eq!(adapter.attempts_for(Platform::Instagram), 3);
    }
}
