use crate::errors::StoreError;
use async_trait::async_trait;
use std::time::Duration;

/// A string key-value backend.
///
/// Implementations forward to an external store; they do not retry and give no
/// guarantees beyond what the backend itself provides.
#[async_trait]
pub trait KvStore: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, expiring after `ttl` when one is given.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Total number of commands the backend has served so far. Drives quota
    /// based rotation in [`crate::BackendPool`].
    async fn commands_processed(&self) -> Result<u64, StoreError>;
}
