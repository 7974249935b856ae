//! Linux Secret Service implementation.

use crate::{SecretStore, StorageError, StorageResult};
use async_trait::async_trait;
use secret_service::{blocking::SecretService, EncryptionType};
use std::collections::HashMap;
use tracing::debug;

/// Secret Service based store for Linux (GNOME Keyring / KWallet).
///
/// The D-Bus API is blocking, so every call runs on tokio's blocking pool.
pub struct SecretServiceStore {
    service_name: String,
}

impl SecretServiceStore {
    /// Connect once up front so an absent Secret Service is reported early.
    pub fn new(service_name: &str) -> StorageResult<Self> {
        SecretService::connect(EncryptionType::Dh).map_err(|e| {
            StorageError::Platform(format!("Failed to connect to Secret Service: {}", e))
        })?;

        Ok(Self {
            service_name: service_name.to_string(),
        })
    }

    async fn run<F, T>(&self, key: &str, op: F) -> StorageResult<T>
    where
        F: FnOnce(&secret_service::blocking::Collection, HashMap<&str, &str>, &str) -> StorageResult<T>
            + Send
            + 'static,
        T: Send + 'static,
    {
        let service_name = self.service_name.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let ss = SecretService::connect(EncryptionType::Dh)
                .map_err(|e| StorageError::Platform(e.to_string()))?;

            let collection = ss
                .get_default_collection()
                .map_err(|e| StorageError::Platform(e.to_string()))?;

            if collection.is_locked().unwrap_or(false) {
                collection.unlock().map_err(|e| {
                    StorageError::Platform(format!("Failed to unlock collection: {}", e))
                })?;
            }

            let mut attrs = HashMap::new();
            attrs.insert("service", service_name.as_str());
            attrs.insert("key", key.as_str());
            let label = format!("{}/{}", service_name, key);

            op(&collection, attrs, &label)
        })
        .await
        .map_err(|e| StorageError::Platform(format!("Secret Service task failed: {}", e)))?
    }
}

#[async_trait]
impl SecretStore for SecretServiceStore {
    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, "Setting secret");
        let value = value.to_string();

        self.run(key, move |collection, attrs, label| {
            collection
                .create_item(label, attrs, value.as_bytes(), true, "text/plain")
                .map_err(|e| StorageError::Platform(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.run(key, |collection, attrs, _label| {
            let items = collection
                .search_items(attrs)
                .map_err(|e| StorageError::Platform(e.to_string()))?;

            let Some(item) = items.first() else {
                return Ok(None);
            };

            let secret = item
                .get_secret()
                .map_err(|e| StorageError::Platform(e.to_string()))?;

            String::from_utf8(secret)
                .map(Some)
                .map_err(|e| StorageError::Encoding(e.to_string()))
        })
        .await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting secret");

        self.run(key, |collection, attrs, _label| {
            let items = collection
                .search_items(attrs)
                .map_err(|e| StorageError::Platform(e.to_string()))?;

            let Some(item) = items.first() else {
                return Ok(false);
            };

            item.delete()
                .map_err(|e| StorageError::Platform(e.to_string()))?;
            Ok(true)
        })
        .await
    }
}
