//! Secret storage for the Tally client.
//!
//! The access and refresh tokens live only here. Backends:
//! - **macOS**: Keychain Access via `security-framework`
//! - **Linux**: Secret Service (GNOME Keyring / KWallet) via `secret-service`
//! - **Any platform**: a JSON file readable only by the current user
//! - **Tests**: an in-memory map

mod credentials;
mod file;
mod keys;
mod memory;
mod traits;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod linux;

pub use credentials::{CredentialPair, CredentialState, CredentialStore};
pub use file::FileSecretStore;
pub use keys::StorageKeys;
pub use memory::MemorySecretStore;
pub use traits::SecretStore;

use std::sync::Arc;
use tally_config_and_utils::Paths;
use thiserror::Error;

/// Service name used for platform keychain entries.
pub const SERVICE_NAME: &str = "money.tally.client";

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Platform-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Which backend holds the secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretBackend {
    /// OS keychain where one exists, otherwise the credentials file.
    #[default]
    Platform,
    /// `~/.tally/credentials.json` with owner-only permissions.
    File,
    /// Process memory; nothing survives exit.
    Memory,
}

/// Create the secret store for the requested backend.
pub fn create_secret_store(
    backend: SecretBackend,
    paths: &Paths,
) -> StorageResult<Arc<dyn SecretStore>> {
    match backend {
        SecretBackend::Memory => Ok(Arc::new(MemorySecretStore::new())),
        SecretBackend::File => Ok(Arc::new(FileSecretStore::new(paths.credentials_file()))),
        SecretBackend::Platform => create_platform_store(paths),
    }
}

#[cfg(target_os = "macos")]
fn create_platform_store(_paths: &Paths) -> StorageResult<Arc<dyn SecretStore>> {
    Ok(Arc::new(macos::KeychainStore::new(SERVICE_NAME)))
}

#[cfg(target_os = "linux")]
fn create_platform_store(paths: &Paths) -> StorageResult<Arc<dyn SecretStore>> {
    match linux::SecretServiceStore::new(SERVICE_NAME) {
        Ok(store) => Ok(Arc::new(store)),
        Err(e) => {
            tracing::warn!(error = %e, "Secret Service unavailable, using credentials file");
            Ok(Arc::new(FileSecretStore::new(paths.credentials_file())))
        }
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn create_platform_store(paths: &Paths) -> StorageResult<Arc<dyn SecretStore>> {
    Ok(Arc::new(FileSecretStore::new(paths.credentials_file())))
}
