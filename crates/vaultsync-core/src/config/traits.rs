//! Configuration errors

/// Errors that can occur while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Duplicate repository id: {0}")]
    DuplicateRepo(String),

    #[error("Invalid repository '{id}': {reason}")]
    InvalidRepo { id: String, reason: String },

    #[error("Unsupported sync direction: {source_type} -> {destination_type}")]
    UnsupportedDirection {
        source_type: String,
        destination_type: String,
    },

    #[error("No configuration file found (tried: {0})")]
    NotFound(String),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    pub fn invalid_repo(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRepo {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
