//! Configuration file loading (JSON or YAML)
//!
//! Lookup order: explicit path, `$VAULTSYNC_CONFIG`, `./config.json`,
//! then the user config dir (`~/.config/vaultsync/config.json` on Linux).

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::repo::{BitwardenSettings, RepoDescriptor, SyncSettings, TokenSettings};
use super::traits::{ConfigError, ConfigResult};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VAULTSYNC_CONFIG";

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, alias = "Bitwarden")]
    pub bitwarden: BitwardenSettings,

    #[serde(default, alias = "Repos")]
    pub repos: Vec<RepoDescriptor>,

    #[serde(default, alias = "Token")]
    pub token: TokenSettings,

    #[serde(default, alias = "Sync")]
    pub sync: SyncSettings,
}

/// Serialization format, picked from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Json,
        }
    }
}

impl ConfigFile {
    /// Parse from a string in the given format and validate
    pub fn parse(content: &str, format: ConfigFormat) -> ConfigResult<Self> {
        let config: ConfigFile = match format {
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, ConfigFormat::from_path(path))
    }

    /// Check every descriptor and reject duplicate ids
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for repo in &self.repos {
            repo.validate()?;
            if !seen.insert(repo.id.as_str()) {
                return Err(ConfigError::DuplicateRepo(repo.id.clone()));
            }
        }
        self.token.validate()
    }

    /// Look up a repository by id
    pub fn find_repo(&self, id: &str) -> ConfigResult<&RepoDescriptor> {
        self.repos
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| ConfigError::RepoNotFound(id.to_string()))
    }
}

/// Candidate config paths in lookup order
pub fn candidate_paths(explicit: Option<&Path>, env_value: Option<&str>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return vec![PathBuf::from(value)];
    }

    let mut paths = vec![PathBuf::from("config.json")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("vaultsync").join("config.json"));
    }
    paths
}

/// Resolve which config file to use.
///
/// An explicit path or the env var is returned as-is so a missing file is
/// reported by [`ConfigFile::load`] with its IO error.
pub fn resolve_config_path(explicit: Option<&Path>, env_value: Option<&str>) -> ConfigResult<PathBuf> {
    let candidates = candidate_paths(explicit, env_value);
    if explicit.is_some() || env_value.map_or(false, |v| !v.is_empty()) {
        return Ok(candidates[0].clone());
    }
    candidates
        .iter()
        .find(|p| p.exists())
        .cloned()
        .ok_or_else(|| {
            ConfigError::NotFound(
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })
}
