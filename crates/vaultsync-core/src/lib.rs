//! vaultsync core
//!
//! Synchronizes login secrets between a HashiCorp Vault KV v2 mount and a
//! Bitwarden vault served by `bw serve`, while keeping the Vault token valid
//! in the background. Host binaries wire these pieces together:
//!
//! ```rust,ignore
//! use vaultsync_core::auth::{CredentialLifecycleManager, LifecycleConfig, UserpassAuth};
//! use vaultsync_core::secrets::{ItemSecretStore, KvSecretStore};
//! use vaultsync_core::sync::{SyncEngine, SyncRequest};
//!
//! let lifecycle = CredentialLifecycleManager::new(backend, LifecycleConfig::default(), cancel, logger)
//!     .start()
//!     .await?;
//! let vault = KvSecretStore::from_repo(&vault_repo, client, lifecycle.tokens(), logger);
//!
//! let report = SyncEngine::new(mapper, logger).sync(&request).await;
//! bitwarden.close().await?;
//! lifecycle.shutdown().await;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod mapper;
pub mod secrets;
pub mod sync;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use types::{CancellationToken, Credential, FieldNames, SecretRecord};

pub use error::{SyncError, SyncResult};

pub use auth::{
    AuthBackend, AuthError, CredentialLifecycleManager, LifecycleConfig, LifecycleEvent,
    LifecycleHandle, LifecycleState, TokenSource, UserpassAuth,
};

pub use secrets::{
    ItemSecretStore, KvSecretStore, ListedSecret, MemorySecretStore, SecretStore, SecretStoreError,
    SecretStoreResult,
};

pub use logging::{Logger, NoOpLogger, SharedLogger, TracingLogger};

pub use config::{ConfigError, ConfigFile, EnvSecrets, RepoDescriptor, StoreType};

pub use mapper::{Mapper, MappingError};

pub use sync::{SyncDirection, SyncEngine, SyncOutcome, SyncReport, SyncRequest};
