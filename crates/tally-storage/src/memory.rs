//! In-memory secret store.

use crate::{SecretStore, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Secret store backed by a process-local map.
///
/// Used by tests and by `--ephemeral` sessions that must leave nothing behind.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with initial entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let data = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            data: Mutex::new(data),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.data.lock().map(|data| data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.lock().map_err(poisoned)?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self.data.lock().map_err(poisoned)?;
        Ok(data.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut data = self.data.lock().map_err(poisoned)?;
        Ok(data.remove(key).is_some())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> crate::StorageError {
    crate::StorageError::Platform("memory store lock poisoned".to_string())
}
