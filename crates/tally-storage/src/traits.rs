//! Storage trait definitions.

use crate::StorageResult;
use async_trait::async_trait;

/// Persistent key-value store for secrets.
///
/// Each call is atomic per key. Implementations must be private to the
/// application and survive process restarts (except the in-memory one).
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Store a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    async fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
