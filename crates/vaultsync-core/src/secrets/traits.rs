//! Core traits and types for secret storage

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::AuthError;
use crate::config::StoreType;
use crate::mapper::{MappingError, MappingResult};
use crate::transport::ApiError;
use crate::types::SecretRecord;

/// One hit of a [`SecretStore::list`] call
///
/// Every hit counts towards the match count, mapped or not, so a caller can
/// tell "one unusable match" apart from "no match".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedSecret {
    /// Name (item store) or full path (structured store) of the hit
    pub name: String,
    pub record: MappingResult<SecretRecord>,
}

impl ListedSecret {
    pub fn new(name: impl Into<String>, record: MappingResult<SecretRecord>) -> Self {
        Self {
            name: name.into(),
            record,
        }
    }
}

/// Errors that can occur during secret store operations
#[derive(Error, Debug)]
pub enum SecretStoreError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("{count} items match '{path}'")]
    AmbiguousMatch { path: String, count: usize },

    #[error("Mapping failed: {0}")]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Store is locked: {0}")]
    Locked(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Store API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ApiError> for SecretStoreError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, message } => SecretStoreError::Api { status, message },
            ApiError::InvalidResponse(msg) | ApiError::InvalidUrl(msg) => {
                SecretStoreError::InvalidResponse(msg)
            }
            ApiError::Transport(e) => SecretStoreError::Transport(e.to_string()),
        }
    }
}

pub type SecretStoreResult<T> = Result<T, SecretStoreError>;

/// Uniform capability set over a secret store
///
/// Implementations:
/// - `KvSecretStore`: HashiCorp Vault KV v2, token from a lifecycle manager
/// - `ItemSecretStore`: Bitwarden `bw serve` item API, session from unlock
/// - `MemorySecretStore`: in-memory, for tests
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Repository id from configuration
    fn id(&self) -> &str;

    fn store_type(&self) -> StoreType;

    /// Base address, for log lines
    fn address(&self) -> &str;

    /// Search-filtered listing
    async fn list(&self, filter: &str) -> SecretStoreResult<Vec<ListedSecret>>;

    /// Read one secret
    async fn get(&self, path: &str) -> SecretStoreResult<SecretRecord>;

    /// Write a secret at `path`
    async fn put(&self, path: &str, record: &SecretRecord) -> SecretStoreResult<()>;

    /// Remove a secret
    async fn delete(&self, path: &str) -> SecretStoreResult<()>;

    /// Release the store. Must be called when done; for item stores this locks the vault.
    async fn close(&self) -> SecretStoreResult<()> {
        Ok(())
    }
}
