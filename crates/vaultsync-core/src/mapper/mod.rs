//! Conversion between store-native shapes and [`SecretRecord`]
//!
//! The mapper is configured with the username/password field names of the
//! structured side of a sync pair. Records it produces always carry exactly
//! those two keys with non-empty values.

mod native;

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{FieldNames, SecretRecord};

pub use native::{ItemRequest, NativeItem, NativeLogin, LOGIN_ITEM_TYPE};

/// A native item could not be turned into a usable record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("item has no login section")]
    MissingLogin,

    #[error("missing or empty field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}' is not a string")]
    NonStringField { field: String },
}

impl MappingError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

pub type MappingResult<T> = Result<T, MappingError>;

/// Bidirectional mapper between native items and canonical records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapper {
    names: FieldNames,
}

impl Mapper {
    pub fn new(names: FieldNames) -> Self {
        Self { names }
    }

    pub fn field_names(&self) -> &FieldNames {
        &self.names
    }

    /// Convert an item-store item into a record named after the item.
    ///
    /// Fails if the item has no login section, or the login lacks a
    /// non-empty username or password.
    pub fn from_native(&self, item: &NativeItem) -> MappingResult<SecretRecord> {
        let login = item.login.as_ref().ok_or(MappingError::MissingLogin)?;
        let username = non_empty(login.username.as_deref())
            .ok_or_else(|| MappingError::missing("username"))?;
        let password = non_empty(login.password.as_deref())
            .ok_or_else(|| MappingError::missing("password"))?;

        Ok(SecretRecord::login(&item.name, &self.names, username, password))
    }

    /// Build the create body for a record.
    pub fn to_native(&self, record: &SecretRecord) -> MappingResult<ItemRequest> {
        let (username, password) = self.credentials(record)?;
        Ok(ItemRequest {
            folder_id: None,
            item_type: LOGIN_ITEM_TYPE,
            name: record.name().to_string(),
            login: NativeLogin {
                username: Some(username.to_string()),
                password: Some(password.to_string()),
                ..Default::default()
            },
        })
    }

    /// Apply a record to an existing item, keeping everything the record does
    /// not carry (folder, notes, URIs, custom fields).
    pub fn update_native(&self, record: &SecretRecord, existing: &NativeItem) -> MappingResult<NativeItem> {
        let (username, password) = self.credentials(record)?;
        let mut item = existing.clone();
        item.name = record.name().to_string();
        item.item_type = Some(LOGIN_ITEM_TYPE);
        let login = item.login.get_or_insert_with(NativeLogin::default);
        login.username = Some(username.to_string());
        login.password = Some(password.to_string());
        Ok(item)
    }

    /// Reduce a structured record to its username/password pair under a new name.
    pub fn project(&self, record: &SecretRecord, name: &str) -> MappingResult<SecretRecord> {
        let (username, password) = self.credentials(record)?;
        Ok(SecretRecord::login(name, &self.names, username, password))
    }

    /// Convert the `data` map of a structured secret into a record.
    ///
    /// The configured username and password fields must be strings when
    /// present. Other non-string values (numbers, flags, nested objects) are
    /// left out of the record. Usability is checked later by
    /// [`Mapper::project`] so that extra string fields survive a plain copy.
    pub fn from_structured(&self, name: &str, data: &Map<String, Value>) -> MappingResult<SecretRecord> {
        let mut fields = BTreeMap::new();
        for (key, value) in data {
            match value {
                Value::String(s) => {
                    fields.insert(key.clone(), s.clone());
                }
                _ if self.names.contains(key) => {
                    return Err(MappingError::NonStringField { field: key.clone() });
                }
                _ => {}
            }
        }
        Ok(SecretRecord::new(name, fields))
    }

    /// The `data` map written to the structured store
    pub fn to_structured(&self, record: &SecretRecord) -> Map<String, Value> {
        record
            .fields()
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }

    fn credentials<'a>(&self, record: &'a SecretRecord) -> MappingResult<(&'a str, &'a str)> {
        let username = record
            .non_empty(&self.names.user)
            .ok_or_else(|| MappingError::missing(&self.names.user))?;
        let password = record
            .non_empty(&self.names.pass)
            .ok_or_else(|| MappingError::missing(&self.names.pass))?;
        Ok((username, password))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(name: &str, login: Option<NativeLogin>) -> NativeItem {
        NativeItem {
            id: Some("id-1".to_string()),
            name: name.to_string(),
            item_type: Some(LOGIN_ITEM_TYPE),
            folder_id: None,
            login,
            extra: Map::new(),
        }
    }

    fn login(user: Option<&str>, pass: Option<&str>) -> Option<NativeLogin> {
        Some(NativeLogin {
            username: user.map(String::from),
            password: pass.map(String::from),
            ..Default::default()
        })
    }

    #[test]
    fn test_round_trip_through_native() {
        let mapper = Mapper::new(FieldNames::new("user", "pass"));
        let records = [
            SecretRecord::login("x", mapper.field_names(), "alice", "wonderland"),
            SecretRecord::login("db/prod", mapper.field_names(), "root", "p@ss w0rd"),
            SecretRecord::login("ünï", mapper.field_names(), "ü", "ß"),
        ];

        for record in records {
            let native = mapper.to_native(&record).unwrap();
            let item = NativeItem {
                id: None,
                name: native.name,
                item_type: Some(native.item_type),
                folder_id: native.folder_id,
                login: Some(native.login),
                extra: Map::new(),
            };
            assert_eq!(mapper.from_native(&item).unwrap(), record);
        }
    }

    #[test]
    fn test_from_native_uses_configured_names() {
        let mapper = Mapper::new(FieldNames::new("user", "pass"));
        let record = mapper
            .from_native(&item("services/y", login(Some("bob"), Some("pw"))))
            .unwrap();

        assert_eq!(record.name(), "services/y");
        assert_eq!(record.field("user"), Some("bob"));
        assert_eq!(record.field("pass"), Some("pw"));
    }

    #[test]
    fn test_from_native_missing_login() {
        let mapper = Mapper::default();
        assert_eq!(
            mapper.from_native(&item("n", None)),
            Err(MappingError::MissingLogin)
        );
    }

    #[test]
    fn test_from_native_missing_password() {
        let mapper = Mapper::default();
        assert_eq!(
            mapper.from_native(&item("n", login(Some("bob"), None))),
            Err(MappingError::missing("password"))
        );
        assert_eq!(
            mapper.from_native(&item("n", login(Some("bob"), Some("")))),
            Err(MappingError::missing("password"))
        );
    }

    #[test]
    fn test_from_native_missing_username() {
        let mapper = Mapper::default();
        assert_eq!(
            mapper.from_native(&item("n", login(None, Some("pw")))),
            Err(MappingError::missing("username"))
        );
    }

    #[test]
    fn test_to_native_rejects_unusable_record() {
        let mapper = Mapper::default();
        let record = SecretRecord::login("x", &FieldNames::new("u", "p"), "a", "b");
        assert_eq!(
            mapper.to_native(&record),
            Err(MappingError::missing("username"))
        );
    }

    #[test]
    fn test_structured_conversion() {
        let mapper = Mapper::new(FieldNames::new("user", "pass"));
        let data = json!({"user": "alice", "pass": "wonderland", "note": "extra"});
        let record = mapper
            .from_structured("services/x", data.as_object().unwrap())
            .unwrap();
        assert_eq!(record.fields().len(), 3);

        let projected = mapper.project(&record, "x").unwrap();
        assert_eq!(projected.name(), "x");
        assert_eq!(projected.fields().len(), 2);

        let back = mapper.to_structured(&projected);
        assert_eq!(back.get("user"), Some(&json!("alice")));
        assert_eq!(back.get("pass"), Some(&json!("wonderland")));
    }

    #[test]
    fn test_structured_skips_unrelated_non_string_values() {
        let mapper = Mapper::new(FieldNames::new("user", "pass"));
        let data = json!({
            "user": "alice",
            "pass": "wonderland",
            "port": 5432,
            "tls": true,
            "tags": ["a"],
            "opts": {"k": "v"},
            "gone": null
        });
        let record = mapper
            .from_structured("db", data.as_object().unwrap())
            .unwrap();

        assert_eq!(record.fields().len(), 2);
        assert_eq!(record.field("port"), None);
        assert!(mapper.project(&record, "db").is_ok());
    }

    #[test]
    fn test_update_native_keeps_unmanaged_fields() {
        let mapper = Mapper::new(FieldNames::new("user", "pass"));
        let existing: NativeItem = serde_json::from_value(json!({
            "id": "id-9",
            "type": 1,
            "name": "db",
            "folderId": "f1",
            "notes": "rotate quarterly",
            "login": {"username": "old", "password": "old", "uris": [{"uri": "https://db.local"}], "totp": "otpauth://x"}
        }))
        .unwrap();
        let record = SecretRecord::login("db", mapper.field_names(), "alice", "wonderland");

        let updated = mapper.update_native(&record, &existing).unwrap();
        let login = updated.login.as_ref().unwrap();
        assert_eq!(login.username.as_deref(), Some("alice"));
        assert_eq!(login.password.as_deref(), Some("wonderland"));
        assert_eq!(login.extra.get("uris"), Some(&json!([{"uri": "https://db.local"}])));
        assert_eq!(login.extra.get("totp"), Some(&json!("otpauth://x")));
        assert_eq!(updated.folder_id.as_deref(), Some("f1"));
        assert_eq!(updated.id.as_deref(), Some("id-9"));
        assert_eq!(updated.extra.get("notes"), Some(&json!("rotate quarterly")));
    }

    #[test]
    fn test_update_native_adds_missing_login() {
        let mapper = Mapper::default();
        let record = SecretRecord::login("n", mapper.field_names(), "a", "b");
        let updated = mapper.update_native(&record, &item("n", None)).unwrap();
        assert_eq!(mapper.from_native(&updated).unwrap(), record);
    }

    #[test]
    fn test_structured_non_string_value() {
        let mapper = Mapper::default();
        let data = json!({"username": "a", "password": 42});
        assert_eq!(
            mapper.from_structured("p", data.as_object().unwrap()),
            Err(MappingError::NonStringField {
                field: "password".to_string()
            })
        );
    }
}
