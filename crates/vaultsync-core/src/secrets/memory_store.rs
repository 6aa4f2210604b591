//! In-memory secret store

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::traits::{ListedSecret, SecretStore, SecretStoreError, SecretStoreResult};
use crate::config::StoreType;
use crate::mapper::MappingError;
use crate::types::{FieldNames, SecretRecord};

/// In-memory secret store for tests
///
/// Records are keyed by path. `list` does a substring search over paths,
/// like the item store's search. When field names are set, listed records
/// lacking a non-empty username or password come back as mapping errors.
///
/// # Example
///
/// ```
/// use vaultsync_core::config::StoreType;
/// use vaultsync_core::secrets::MemorySecretStore;
/// use vaultsync_core::types::{FieldNames, SecretRecord};
///
/// let store = MemorySecretStore::new("mem", StoreType::Vault);
/// store.insert(SecretRecord::login("services/x", &FieldNames::default(), "alice", "pw"));
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug)]
pub struct MemorySecretStore {
    id: String,
    store_type: StoreType,
    names: Option<FieldNames>,
    records: RwLock<BTreeMap<String, SecretRecord>>,
    writes: AtomicUsize,
    closed: AtomicUsize,
}

impl MemorySecretStore {
    /// Create a new empty memory store
    pub fn new(id: impl Into<String>, store_type: StoreType) -> Self {
        Self {
            id: id.into(),
            store_type,
            names: None,
            records: RwLock::new(BTreeMap::new()),
            writes: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    /// Validate listed records against these field names
    pub fn with_field_names(mut self, names: FieldNames) -> Self {
        self.names = Some(names);
        self
    }

    /// Seed a record at its own name, bypassing the write counter
    pub fn insert(&self, record: SecretRecord) {
        self.records.write().insert(record.name().to_string(), record);
    }

    /// Seed a record at an explicit path
    pub fn insert_at(&self, path: impl Into<String>, record: SecretRecord) {
        self.records.write().insert(path.into(), record);
    }

    pub fn record(&self, path: &str) -> Option<SecretRecord> {
        self.records.read().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful `put`/`delete` calls
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of `close` calls
    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn check(&self, record: &SecretRecord) -> Result<SecretRecord, MappingError> {
        if let Some(names) = &self.names {
            for field in [&names.user, &names.pass] {
                if record.non_empty(field).is_none() {
                    return Err(MappingError::missing(field.as_str()));
                }
            }
        }
        Ok(record.clone())
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn store_type(&self) -> StoreType {
        self.store_type
    }

    fn address(&self) -> &str {
        "memory"
    }

    async fn list(&self, filter: &str) -> SecretStoreResult<Vec<ListedSecret>> {
        let records = self.records.read();
        Ok(records
            .iter()
            .filter(|(path, _)| path.contains(filter))
            .map(|(path, record)| ListedSecret::new(path.clone(), self.check(record)))
            .collect())
    }

    async fn get(&self, path: &str) -> SecretStoreResult<SecretRecord> {
        self.records
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| SecretStoreError::NotFound(path.to_string()))
    }

    async fn put(&self, path: &str, record: &SecretRecord) -> SecretStoreResult<()> {
        self.records
            .write()
            .insert(path.to_string(), record.renamed(path));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, path: &str) -> SecretStoreResult<()> {
        self.records
            .write()
            .remove(path)
            .ok_or_else(|| SecretStoreError::NotFound(path.to_string()))?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> SecretStoreResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn login(name: &str, user: &str, pass: &str) -> SecretRecord {
        SecretRecord::login(name, &FieldNames::default(), user, pass)
    }

    #[tokio::test]
    async fn test_memory_store_crud() {
        let store = MemorySecretStore::new("mem", StoreType::Vault);
        assert!(store.is_empty());
        assert!(matches!(
            store.get("a").await,
            Err(SecretStoreError::NotFound(_))
        ));

        store.put("a", &login("ignored", "u", "p")).await.unwrap();
        assert_eq!(store.len(), 1);
        let record = store.get("a").await.unwrap();
        assert_eq!(record.name(), "a");
        assert_eq!(record.field("username"), Some("u"));

        store.put("a", &login("a", "u2", "p2")).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().field("username"), Some("u2"));

        store.delete("a").await.unwrap();
        assert!(store.is_empty());
        assert_eq!(store.writes(), 3);
    }

    #[tokio::test]
    async fn test_list_is_substring_search() {
        let store = MemorySecretStore::new("mem", StoreType::Bitwarden);
        store.insert(login("services/y", "a", "b"));
        store.insert(login("services/y-old", "c", "d"));
        store.insert(login("other", "e", "f"));

        let hits = store.list("services/y").await.unwrap();
        let names: Vec<_> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["services/y", "services/y-old"]);
    }

    #[tokio::test]
    async fn test_list_reports_unusable_records() {
        let store = MemorySecretStore::new("mem", StoreType::Bitwarden)
            .with_field_names(FieldNames::default());
        let mut fields = BTreeMap::new();
        fields.insert("username".to_string(), "bob".to_string());
        store.insert(SecretRecord::new("nopass", fields));

        let hits = store.list("nopass").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record, Err(MappingError::missing("password")));
    }

    #[tokio::test]
    async fn test_concurrent_writes() {
        let store = Arc::new(MemorySecretStore::new("mem", StoreType::Vault));
        let mut handles = vec![];

        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let path = format!("key_{}", i);
                store.put(&path, &login(&path, "u", "p")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 10);
        assert_eq!(store.writes(), 10);
    }
}
