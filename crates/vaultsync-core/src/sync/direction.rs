//! Transfer direction between a store pair

use std::fmt;

use crate::config::{ConfigError, ConfigResult, StoreType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncDirection {
    /// Vault secret to Bitwarden item
    StructuredToItem,
    /// Bitwarden item to Vault secret
    ItemToStructured,
}

impl SyncDirection {
    /// Derive the direction from the source and destination store types.
    ///
    /// Same-type pairs are rejected.
    pub fn from_kinds(source: StoreType, destination: StoreType) -> ConfigResult<Self> {
        match (source, destination) {
            (StoreType::Vault, StoreType::Bitwarden) => Ok(SyncDirection::StructuredToItem),
            (StoreType::Bitwarden, StoreType::Vault) => Ok(SyncDirection::ItemToStructured),
            (source, destination) => Err(ConfigError::UnsupportedDirection {
                source_type: source.to_string(),
                destination_type: destination.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::StructuredToItem => "structured-to-item",
            SyncDirection::ItemToStructured => "item-to-structured",
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination name for a structured path: prefix plus its last segment
pub(crate) fn item_name(prefix: &str, path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    let leaf = trimmed.rsplit('/').next().unwrap_or(trimmed);
    format!("{}{}", prefix, leaf)
}

/// Destination path for an item: prefix plus the item name
pub(crate) fn structured_path(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_kinds() {
        assert_eq!(
            SyncDirection::from_kinds(StoreType::Vault, StoreType::Bitwarden).unwrap(),
            SyncDirection::StructuredToItem
        );
        assert_eq!(
            SyncDirection::from_kinds(StoreType::Bitwarden, StoreType::Vault).unwrap(),
            SyncDirection::ItemToStructured
        );
        assert!(matches!(
            SyncDirection::from_kinds(StoreType::Vault, StoreType::Vault),
            Err(ConfigError::UnsupportedDirection { .. })
        ));
    }

    #[test]
    fn test_naming() {
        assert_eq!(item_name("", "services/x"), "x");
        assert_eq!(item_name("vault-", "services/x/"), "vault-x");
        assert_eq!(item_name("", "top"), "top");
        assert_eq!(structured_path("imported/", "y"), "imported/y");
    }
}
