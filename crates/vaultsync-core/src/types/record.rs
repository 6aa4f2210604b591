//! Canonical secret record exchanged between stores

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default field name for the login username.
pub const DEFAULT_USER_FIELD: &str = "username";

/// Default field name for the login password.
pub const DEFAULT_PASS_FIELD: &str = "password";

/// Names of the username/password keys inside a structured secret
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldNames {
    pub user: String,
    pub pass: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            user: DEFAULT_USER_FIELD.to_string(),
            pass: DEFAULT_PASS_FIELD.to_string(),
        }
    }
}

impl FieldNames {
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }

    /// Whether `key` is the username or password field
    pub fn contains(&self, key: &str) -> bool {
        self.user == key || self.pass == key
    }
}

/// Store-agnostic secret: a name plus a flat map of string fields.
///
/// Records are never mutated after creation; transformations such as
/// [`SecretRecord::renamed`] build a new record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    name: String,
    fields: BTreeMap<String, String>,
}

impl SecretRecord {
    /// Create a record from arbitrary fields
    pub fn new(name: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Create a login record keyed by `names`
    pub fn login(
        name: impl Into<String>,
        names: &FieldNames,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(names.user.clone(), username.into());
        fields.insert(names.pass.clone(), password.into());
        Self::new(name, fields)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Look up a single field
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Non-empty value of a field, if present
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.field(key).filter(|v| !v.is_empty())
    }

    /// Whether the record carries a non-empty username and password under `names`
    pub fn is_usable(&self, names: &FieldNames) -> bool {
        self.non_empty(&names.user).is_some() && self.non_empty(&names.pass).is_some()
    }

    /// Copy of this record under a different name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: self.fields.clone(),
        }
    }

    pub fn into_fields(self) -> BTreeMap<String, String> {
        self.fields
    }
}

// Field values are secrets; only the keys are printed.
impl std::fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRecord")
            .field("name", &self.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_record() {
        let names = FieldNames::new("user", "pass");
        let record = SecretRecord::login("x", &names, "alice", "wonderland");

        assert_eq!(record.name(), "x");
        assert_eq!(record.field("user"), Some("alice"));
        assert_eq!(record.field("pass"), Some("wonderland"));
        assert!(record.is_usable(&names));
        assert!(!record.is_usable(&FieldNames::default()));
    }

    #[test]
    fn test_empty_values_are_not_usable() {
        let names = FieldNames::default();
        let record = SecretRecord::login("x", &names, "alice", "");
        assert!(!record.is_usable(&names));
        assert_eq!(record.non_empty("password"), None);
    }

    #[test]
    fn test_renamed_leaves_original_untouched() {
        let names = FieldNames::default();
        let original = SecretRecord::login("services/x", &names, "a", "b");
        let renamed = original.renamed("x");

        assert_eq!(original.name(), "services/x");
        assert_eq!(renamed.name(), "x");
        assert_eq!(renamed.fields(), original.fields());
    }

    #[test]
    fn test_debug_redacts_values() {
        let record = SecretRecord::login("x", &FieldNames::default(), "alice", "hunter2");
        let debug = format!("{:?}", record);
        assert!(debug.contains("username"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("alice"));
    }
}
