//! Crate-level error umbrella

use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::secrets::SecretStoreError;
use crate::transport::ApiError;

/// Any error that can stop a sync run before it starts
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("store error: {0}")]
    Store(#[from] SecretStoreError),

    #[error("client setup failed: {0}")]
    Client(#[from] ApiError),
}

impl SyncError {
    /// Whether this is an authentication failure
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            SyncError::Auth(_) | SyncError::Store(SecretStoreError::Auth(_))
        )
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
