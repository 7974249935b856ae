//! High-level API for the access/refresh token pair.

use crate::{SecretStore, StorageKeys, StorageResult};
use std::fmt;
use std::sync::Arc;

/// Access and refresh token, always stored and cleared together.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// What the store currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialState {
    /// Neither token is stored.
    Empty,
    /// Exactly one token is stored; treated as no credentials.
    Partial,
    /// Both tokens are stored.
    Complete(CredentialPair),
}

/// Typed accessors over a [`SecretStore`].
///
/// The store is re-read on every call; nothing is cached in memory because a
/// concurrent refresh may have replaced the access token.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn SecretStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// The underlying secret store.
    pub fn secret_store(&self) -> &Arc<dyn SecretStore> {
        &self.store
    }

    pub async fn access_token(&self) -> StorageResult<Option<String>> {
        self.store.get(StorageKeys::ACCESS_TOKEN).await
    }

    pub async fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.store.get(StorageKeys::REFRESH_TOKEN).await
    }

    /// Replace the access token after a successful refresh.
    pub async fn set_access_token(&self, token: &str) -> StorageResult<()> {
        self.store.set(StorageKeys::ACCESS_TOKEN, token).await
    }

    /// Inspect the stored pair.
    pub async fn state(&self) -> StorageResult<CredentialState> {
        let access = self.access_token().await?;
        let refresh = self.refresh_token().await?;

        Ok(match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => CredentialState::Complete(CredentialPair {
                access_token,
                refresh_token,
            }),
            (None, None) => CredentialState::Empty,
            _ => CredentialState::Partial,
        })
    }

    /// Load the pair, treating a partial pair as absent.
    pub async fn load_pair(&self) -> StorageResult<Option<CredentialPair>> {
        match self.state().await? {
            CredentialState::Complete(pair) => Ok(Some(pair)),
            _ => Ok(None),
        }
    }

    /// Persist a freshly issued pair.
    ///
    /// If the second write fails the first is rolled back so the store never
    /// holds a mixed pair from two different sign-ins.
    pub async fn store_pair(&self, pair: &CredentialPair) -> StorageResult<()> {
        self.store
            .set(StorageKeys::ACCESS_TOKEN, &pair.access_token)
            .await?;

        if let Err(e) = self
            .store
            .set(StorageKeys::REFRESH_TOKEN, &pair.refresh_token)
            .await
        {
            let _ = self.store.delete(StorageKeys::ACCESS_TOKEN).await;
            return Err(e);
        }

        Ok(())
    }

    /// Delete both tokens. Every key is attempted even if an earlier delete fails.
    pub async fn clear(&self) -> StorageResult<()> {
        let mut first_error = None;

        for key in StorageKeys::ALL {
            if let Err(e) = self.store.delete(key).await {
                tracing::warn!(key = %key, error = %e, "Failed to delete secret");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySecretStore;

    fn credential_store(store: MemorySecretStore) -> (CredentialStore, Arc<MemorySecretStore>) {
        let store = Arc::new(store);
        (CredentialStore::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_empty_store_has_no_pair() {
        let (credentials, _) = credential_store(MemorySecretStore::new());

        assert_eq!(credentials.state().await.unwrap(), CredentialState::Empty);
        assert!(credentials.load_pair().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_and_load_pair() {
        let (credentials, raw) = credential_store(MemorySecretStore::new());

        credentials
            .store_pair(&CredentialPair::new("A1", "R1"))
            .await
            .unwrap();

        assert_eq!(
            raw.get(StorageKeys::ACCESS_TOKEN).await.unwrap().as_deref(),
            Some("A1")
        );
        assert_eq!(
            credentials.load_pair().await.unwrap(),
            Some(CredentialPair::new("A1", "R1"))
        );
    }

    #[tokio::test]
    async fn test_partial_pair_is_treated_as_absent() {
        let (credentials, _) =
            credential_store(MemorySecretStore::with_entries([(StorageKeys::REFRESH_TOKEN, "R1")]));

        assert_eq!(credentials.state().await.unwrap(), CredentialState::Partial);
        assert!(credentials.load_pair().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_both_tokens() {
        let (credentials, raw) = credential_store(MemorySecretStore::new());
        credentials
            .store_pair(&CredentialPair::new("A1", "R1"))
            .await
            .unwrap();

        credentials.clear().await.unwrap();

        assert!(raw.is_empty());
        assert_eq!(credentials.state().await.unwrap(), CredentialState::Empty);
    }

    #[tokio::test]
    async fn test_set_access_token_keeps_refresh_token() {
        let (credentials, _) = credential_store(MemorySecretStore::new());
        credentials
            .store_pair(&CredentialPair::new("A1", "R1"))
            .await
            .unwrap();

        credentials.set_access_token("A2").await.unwrap();

        assert_eq!(
            credentials.load_pair().await.unwrap(),
            Some(CredentialPair::new("A2", "R1"))
        );
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", CredentialPair::new("secret-a", "secret-r"));
        assert!(!rendered.contains("secret-a"));
        assert!(!rendered.contains("secret-r"));
    }
}
