//! Configuration model and loading
//!
//! - `ConfigFile`: repositories, helper settings and tuning, from JSON or YAML
//! - `RepoDescriptor`: one configured store
//! - `EnvSecrets`: credentials taken from the environment

mod env;
mod file;
mod repo;
mod traits;

pub use env::{EnvSecrets, BW_PASSWORD_VAR, VAULT_PASSWORD_VAR, VAULT_TOKEN_VAR, VAULT_USER_VAR};
pub use file::{candidate_paths, resolve_config_path, ConfigFile, ConfigFormat, CONFIG_ENV_VAR};
pub use repo::{
    BitwardenSettings, RepoDescriptor, StoreType, SyncSettings, TokenSettings, DEFAULT_RENEW_FRACTION,
};
pub use traits::{ConfigError, ConfigResult};
