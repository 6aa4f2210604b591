//! Repository descriptors

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{FieldNames, DEFAULT_PASS_FIELD, DEFAULT_USER_FIELD};
use super::traits::{ConfigError, ConfigResult};

/// Kind of secret store a repository points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    /// Versioned key-value secret manager (Vault KV v2)
    #[serde(alias = "Vault", alias = "structured-store", alias = "kv")]
    Vault,
    /// Password-manager vault behind a local item API (`bw serve`)
    #[serde(alias = "Bitwarden", alias = "item-store")]
    Bitwarden,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::Vault => "vault",
            StoreType::Bitwarden => "bitwarden",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_user_field() -> String {
    DEFAULT_USER_FIELD.to_string()
}

fn default_pass_field() -> String {
    DEFAULT_PASS_FIELD.to_string()
}

fn default_mount_path() -> String {
    "secret".to_string()
}

/// One configured repository
///
/// Accepts the capitalised keys written by older configs (`ID`, `Addr`,
/// `UserField`, ...) as well as snake_case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoDescriptor {
    #[serde(alias = "ID", alias = "Id")]
    pub id: String,

    #[serde(rename = "type", alias = "Type")]
    pub store_type: StoreType,

    #[serde(alias = "Addr", alias = "address")]
    pub addr: String,

    #[serde(default = "default_user_field", alias = "UserField", alias = "userField")]
    pub user_field: String,

    #[serde(default = "default_pass_field", alias = "PassField", alias = "passField")]
    pub pass_field: String,

    #[serde(default, alias = "Paths")]
    pub paths: Vec<String>,

    #[serde(default, alias = "Prefix")]
    pub prefix: String,

    #[serde(default = "default_mount_path", alias = "MountPath", alias = "mountPath")]
    pub mount_path: String,
}

impl RepoDescriptor {
    pub fn new(id: impl Into<String>, store_type: StoreType, addr: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            store_type,
            addr: addr.into(),
            user_field: default_user_field(),
            pass_field: default_pass_field(),
            paths: Vec::new(),
            prefix: String::new(),
            mount_path: default_mount_path(),
        }
    }

    pub fn with_paths(mut self, paths: Vec<String>) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_fields(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.user_field = user.into();
        self.pass_field = pass.into();
        self
    }

    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mount_path = mount.into();
        self
    }

    pub fn field_names(&self) -> FieldNames {
        FieldNames::new(&self.user_field, &self.pass_field)
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.addr.trim_end_matches('/')
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::invalid_repo("<unnamed>", "empty id"));
        }
        if self.addr.trim().is_empty() {
            return Err(ConfigError::invalid_repo(&self.id, "empty address"));
        }
        if !(self.addr.starts_with("http://") || self.addr.starts_with("https://")) {
            return Err(ConfigError::invalid_repo(
                &self.id,
                format!("address '{}' is not an http(s) URL", self.addr),
            ));
        }
        if self.user_field.is_empty() || self.pass_field.is_empty() {
            return Err(ConfigError::invalid_repo(&self.id, "empty field name"));
        }
        if self.store_type == StoreType::Vault && self.mount_path.trim_matches('/').is_empty() {
            return Err(ConfigError::invalid_repo(&self.id, "empty mount path"));
        }
        Ok(())
    }
}

/// Settings for the local `bw serve` helper
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitwardenSettings {
    /// Spawn and supervise `bw serve` for the lifetime of the process
    #[serde(default, alias = "Local")]
    pub local: bool,

    #[serde(default, alias = "Port")]
    pub serve_port: Option<u16>,

    /// Path to the `bw` binary (defaults to `bw` on `PATH`)
    #[serde(default, alias = "Binary")]
    pub serve_binary: Option<String>,
}

/// Default fraction of a lease after which renewal is attempted
pub const DEFAULT_RENEW_FRACTION: f64 = 2.0 / 3.0;

/// Token lifecycle tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Fraction of the lease after which renewal is attempted
    pub renew_fraction: f64,
    /// Lease extension requested on renewal, in seconds
    pub increment_secs: u64,
    pub backoff_initial_secs: u64,
    pub backoff_max_secs: u64,
    /// How long a store call waits for a valid token, in seconds
    pub token_wait_secs: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            renew_fraction: DEFAULT_RENEW_FRACTION,
            increment_secs: 3600,
            backoff_initial_secs: 1,
            backoff_max_secs: 300,
            token_wait_secs: 30,
        }
    }
}

impl TokenSettings {
    pub fn increment(&self) -> Duration {
        Duration::from_secs(self.increment_secs)
    }

    /// Reject values that would make the renewal or re-login loop spin
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.renew_fraction > 0.0 && self.renew_fraction < 1.0) {
            return Err(ConfigError::Other(format!(
                "token.renew_fraction must be in (0, 1), got {}",
                self.renew_fraction
            )));
        }
        if self.backoff_initial_secs == 0 {
            return Err(ConfigError::Other(
                "token.backoff_initial_secs must be at least 1".to_string(),
            ));
        }
        if self.backoff_initial_secs > self.backoff_max_secs {
            return Err(ConfigError::Other(format!(
                "token.backoff_initial_secs ({}) exceeds token.backoff_max_secs ({})",
                self.backoff_initial_secs, self.backoff_max_secs
            )));
        }
        Ok(())
    }
}

/// Sync engine tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Number of paths transferred concurrently
    pub concurrency: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_keys() {
        let repo: RepoDescriptor = serde_json::from_str(
            r#"{
                "ID": "vault-prod",
                "Type": "vault",
                "Addr": "https://vault.example.com:8200/",
                "UserField": "user",
                "PassField": "pass",
                "Paths": ["services/x"],
                "Prefix": "imported/",
                "MountPath": "kv"
            }"#,
        )
        .unwrap();

        assert_eq!(repo.id, "vault-prod");
        assert_eq!(repo.store_type, StoreType::Vault);
        assert_eq!(repo.base_url(), "https://vault.example.com:8200");
        assert_eq!(repo.field_names(), FieldNames::new("user", "pass"));
        assert_eq!(repo.paths, vec!["services/x".to_string()]);
        assert_eq!(repo.prefix, "imported/");
        assert_eq!(repo.mount_path, "kv");
        assert!(repo.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let repo: RepoDescriptor = serde_json::from_str(
            r#"{"id": "bw", "type": "item-store", "addr": "http://localhost:8087"}"#,
        )
        .unwrap();

        assert_eq!(repo.store_type, StoreType::Bitwarden);
        assert_eq!(repo.user_field, "username");
        assert_eq!(repo.pass_field, "password");
        assert_eq!(repo.mount_path, "secret");
        assert!(repo.prefix.is_empty());
        assert!(repo.paths.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_address() {
        let repo = RepoDescriptor::new("v", StoreType::Vault, "vault.local");
        assert!(matches!(
            repo.validate(),
            Err(ConfigError::InvalidRepo { .. })
        ));

        let repo = RepoDescriptor::new("v", StoreType::Vault, "");
        assert!(repo.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_mount_for_vault() {
        let repo = RepoDescriptor::new("v", StoreType::Vault, "http://v").with_mount("/");
        assert!(repo.validate().is_err());

        let repo = RepoDescriptor::new("b", StoreType::Bitwarden, "http://b").with_mount("");
        assert!(repo.validate().is_ok());
    }

    #[test]
    fn test_token_settings_validation() {
        assert!(TokenSettings::default().validate().is_ok());

        for fraction in [0.0, -0.5, 1.0, 2.0, f64::NAN] {
            let settings = TokenSettings {
                renew_fraction: fraction,
                ..TokenSettings::default()
            };
            assert!(settings.validate().is_err(), "fraction {}", fraction);
        }

        let zero_backoff = TokenSettings {
            backoff_initial_secs: 0,
            ..TokenSettings::default()
        };
        assert!(zero_backoff.validate().is_err());

        let inverted = TokenSettings {
            backoff_initial_secs: 60,
            backoff_max_secs: 10,
            ..TokenSettings::default()
        };
        assert!(matches!(inverted.validate(), Err(ConfigError::Other(m)) if m.contains("exceeds")));
    }

    #[test]
    fn test_unknown_store_type() {
        let result: Result<RepoDescriptor, _> =
            serde_json::from_str(r#"{"id": "x", "type": "lastpass", "addr": "http://x"}"#);
        assert!(result.is_err());
    }
}
