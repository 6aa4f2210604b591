//! Secrets taken from the process environment

use std::env;

/// Pre-issued Vault token; when set the lifecycle manager is bypassed.
pub const VAULT_TOKEN_VAR: &str = "VAULT_TOKEN";
pub const VAULT_USER_VAR: &str = "VAULT_USER";
pub const VAULT_PASSWORD_VAR: &str = "VAULT_PASSWORD";
/// Master password used to unlock the Bitwarden vault.
pub const BW_PASSWORD_VAR: &str = "BW_PASSWORD";

/// Environment-sourced secrets
///
/// Empty variables are treated as unset.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvSecrets {
    pub vault_token: Option<String>,
    pub vault_user: Option<String>,
    pub vault_password: Option<String>,
    pub bw_password: Option<String>,
}

impl EnvSecrets {
    /// Read from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            vault_token: get(VAULT_TOKEN_VAR),
            vault_user: get(VAULT_USER_VAR),
            vault_password: get(VAULT_PASSWORD_VAR),
            bw_password: get(BW_PASSWORD_VAR),
        }
    }
}

impl std::fmt::Debug for EnvSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("EnvSecrets")
            .field("vault_token", &set(&self.vault_token))
            .field("vault_user", &self.vault_user)
            .field("vault_password", &set(&self.vault_password))
            .field("bw_password", &set(&self.bw_password))
            .finish()
    }
}
