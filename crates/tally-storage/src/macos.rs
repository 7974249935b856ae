//! macOS Keychain implementation.

use crate::{SecretStore, StorageError, StorageResult};
use async_trait::async_trait;
use security_framework::passwords::{
    delete_generic_password, get_generic_password, set_generic_password,
};
use tracing::debug;

/// errSecItemNotFound
const ITEM_NOT_FOUND: i32 = -25300;

/// Keychain-based store for macOS. Calls run on tokio's blocking pool.
pub struct KeychainStore {
    service_name: String,
}

impl KeychainStore {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
        }
    }

    async fn blocking<F, T>(&self, op: F) -> StorageResult<T>
    where
        F: FnOnce(&str) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let service_name = self.service_name.clone();
        tokio::task::spawn_blocking(move || op(&service_name))
            .await
            .map_err(|e| StorageError::Platform(format!("Keychain task failed: {}", e)))?
    }
}

#[async_trait]
impl SecretStore for KeychainStore {
    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, "Setting keychain item");
        let key = key.to_string();
        let value = value.to_string();

        self.blocking(move |service| {
            // set_generic_password updates in place when the item exists
            set_generic_password(service, &key, value.as_bytes()).map_err(|e| {
                StorageError::Platform(format!("Failed to set keychain item: {}", e))
            })
        })
        .await
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let key = key.to_string();

        self.blocking(move |service| match get_generic_password(service, &key) {
            Ok(data) => String::from_utf8(data)
                .map(Some)
                .map_err(|e| StorageError::Encoding(e.to_string())),
            Err(e) if e.code() == ITEM_NOT_FOUND => Ok(None),
            Err(e) => Err(StorageError::Platform(format!(
                "Failed to get keychain item: {}",
                e
            ))),
        })
        .await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting keychain item");
        let key = key.to_string();

        self.blocking(move |service| match delete_generic_password(service, &key) {
            Ok(()) => Ok(true),
            Err(e) if e.code() == ITEM_NOT_FOUND => Ok(false),
            Err(e) => Err(StorageError::Platform(format!(
                "Failed to delete keychain item: {}",
                e
            ))),
        })
        .await
    }
}
