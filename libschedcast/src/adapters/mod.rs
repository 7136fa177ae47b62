//! Publishing adapters.
//!
//! The engine never talks to a platform directly; everything goes
//! through this narrow capability trait. Production deployments use
//! [`CommandAdapter`] to drive an external web-automation tool; tests
//! use [`MockAdapter`].

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::AdapterError;
use crate::types::Platform;

mod command;
mod mock;

pub use command::CommandAdapter;
pub use mock::MockAdapter;

#[async_trait]
pub trait Adapter: Send + Sync {
    /// Publish `content` with `media` to `platform`. Returns an opaque
    /// platform post identifier on success.
    async fn publish(
        &self,
        platform: Platform,
        content: &str,
        media: &[PathBuf],
    ) -> Result<String, AdapterError>;

    /// Adapter name for log lines.
    fn name(&self) -> &str;
}
