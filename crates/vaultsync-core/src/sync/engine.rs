//! Directional transfer of a batch of paths between two stores

use futures::stream::{self, StreamExt};

use super::direction::{item_name, structured_path, SyncDirection};
use super::report::{PathReport, SyncEvent, SyncOutcome, SyncReport};
use crate::logging::SharedLogger;
use crate::mapper::Mapper;
use crate::secrets::{SecretStore, SecretStoreError};
use crate::types::CancellationToken;
use crate::{log_error, log_info, log_warn};

/// One sync invocation
pub struct SyncRequest<'a> {
    pub source: &'a dyn SecretStore,
    pub destination: &'a dyn SecretStore,
    pub direction: SyncDirection,
    pub paths: &'a [String],
    /// Prepended to every destination name
    pub prefix: &'a str,
}

/// Moves records from a source to a destination store, one path at a time.
///
/// A failing path never stops the batch; its outcome goes into the report.
pub struct SyncEngine {
    mapper: Mapper,
    concurrency: usize,
    cancel: CancellationToken,
    logger: SharedLogger,
}

impl SyncEngine {
    /// `mapper` carries the field names of the structured side
    pub fn new(mapper: Mapper, logger: SharedLogger) -> Self {
        Self {
            mapper,
            concurrency: 1,
            cancel: CancellationToken::new(),
            logger,
        }
    }

    /// Paths in flight at once; report order is unaffected
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Stop starting new paths once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn sync(&self, request: &SyncRequest<'_>) -> SyncReport {
        log_info!(
            self.logger,
            "sync {} -> {} ({}, {} paths)",
            request.source.id(),
            request.destination.id(),
            request.direction,
            request.paths.len()
        );

        let entries: Vec<PathReport> = stream::iter(request.paths.iter())
            .map(|path| self.sync_path(request, path))
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = SyncReport {
            direction: request.direction,
            entries,
        };
        log_info!(self.logger, "sync finished: {}", report);
        report
    }

    async fn sync_path(&self, request: &SyncRequest<'_>, path: &str) -> PathReport {
        let entry = if self.cancel.is_cancelled() {
            PathReport::new(path, SyncOutcome::Skipped).with_detail("cancelled")
        } else {
            match request.direction {
                SyncDirection::ItemToStructured => self.item_to_structured(request, path).await,
                SyncDirection::StructuredToItem => self.structured_to_item(request, path).await,
            }
        };
        self.emit(request, &entry);
        entry
    }

    async fn item_to_structured(&self, request: &SyncRequest<'_>, path: &str) -> PathReport {
        let mut hits = match request.source.list(path).await {
            Ok(hits) => hits,
            Err(err) => return failure(path, err),
        };

        match hits.len() {
            0 => PathReport::new(path, SyncOutcome::Skipped).with_detail("no matching item"),
            1 => {
                let hit = hits.remove(0);
                let destination = structured_path(request.prefix, &hit.name);
                let record = match hit.record {
                    Ok(record) => record,
                    Err(err) => {
                        return PathReport::new(path, SyncOutcome::MappingError(err.to_string()))
                            .with_destination(destination)
                    }
                };
                match request.destination.put(&destination, &record).await {
                    Ok(()) => PathReport::new(path, SyncOutcome::Synced).with_destination(destination),
                    Err(err) => failure(path, err).with_destination(destination),
                }
            }
            count => PathReport::new(path, SyncOutcome::Ambiguous { count }),
        }
    }

    async fn structured_to_item(&self, request: &SyncRequest<'_>, path: &str) -> PathReport {
        let destination = item_name(request.prefix, path);
        let record = match request.source.get(path).await {
            Ok(record) => record,
            Err(SecretStoreError::NotFound(_)) => {
                return PathReport::new(path, SyncOutcome::Skipped)
                    .with_destination(destination)
                    .with_detail("secret not found")
            }
            Err(err) => return failure(path, err).with_destination(destination),
        };

        let record = match self.mapper.project(&record, &destination) {
            Ok(record) => record,
            Err(err) => {
                return PathReport::new(path, SyncOutcome::MappingError(err.to_string()))
                    .with_destination(destination)
            }
        };

        match request.destination.put(&destination, &record).await {
            Ok(()) => PathReport::new(path, SyncOutcome::Synced).with_destination(destination),
            Err(err) => failure(path, err).with_destination(destination),
        }
    }

    fn emit(&self, request: &SyncRequest<'_>, entry: &PathReport) {
        let event = SyncEvent {
            source: request.source,
            destination: request.destination,
            entry,
        };
        match entry.outcome {
            SyncOutcome::Synced => log_info!(self.logger, "{}", event),
            SyncOutcome::Skipped | SyncOutcome::Ambiguous { .. } => log_warn!(self.logger, "{}", event),
            SyncOutcome::MappingError(_) | SyncOutcome::TransportError(_) => {
                log_error!(self.logger, "{}", event)
            }
        }
    }
}

/// Classify a store error for one path
fn failure(path: &str, err: SecretStoreError) -> PathReport {
    let outcome = match err {
        SecretStoreError::AmbiguousMatch { count, .. } => SyncOutcome::Ambiguous { count },
        SecretStoreError::Mapping(err) => SyncOutcome::MappingError(err.to_string()),
        SecretStoreError::NotFound(_) => {
            return PathReport::new(path, SyncOutcome::Skipped).with_detail(err.to_string())
        }
        other => SyncOutcome::TransportError(other.to_string()),
    };
    PathReport::new(path, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreType;
    use crate::logging::capture::CaptureLogger;
    use crate::logging::NoOpLogger;
    use crate::secrets::{ListedSecret, MemorySecretStore, SecretStoreResult};
    use crate::types::{FieldNames, SecretRecord};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn names() -> FieldNames {
        FieldNames::new("user", "pass")
    }

    fn engine() -> SyncEngine {
        SyncEngine::new(Mapper::new(names()), Arc::new(NoOpLogger::new()))
    }

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    fn item_store() -> MemorySecretStore {
        MemorySecretStore::new("bw", StoreType::Bitwarden).with_field_names(names())
    }

    fn kv_store() -> MemorySecretStore {
        MemorySecretStore::new("vault", StoreType::Vault)
    }

    #[tokio::test]
    async fn test_item_to_structured_single_match() {
        let source = item_store();
        source.insert(SecretRecord::login("db", &names(), "root", "pw"));
        let destination = kv_store();

        let p = paths(&["db"]);
        let report = engine()
            .sync(&SyncRequest {
                source: &source,
                destination: &destination,
                direction: SyncDirection::ItemToStructured,
                paths: &p,
                prefix: "imported/",
            })
            .await;

        assert_eq!(report.synced(), 1);
        assert_eq!(report.entries[0].destination_path.as_deref(), Some("imported/db"));
        let written = destination.record("imported/db").unwrap();
        assert_eq!(written.field("user"), Some("root"));
        assert_eq!(written.field("pass"), Some("pw"));
    }

    #[tokio::test]
    async fn test_zero_matches_skipped_without_write() {
        let source = item_store();
        let destination = kv_store();

        let p = paths(&["missing"]);
        let report = engine()
            .sync(&SyncRequest {
                source: &source,
                destination: &destination,
                direction: SyncDirection::ItemToStructured,
                paths: &p,
                prefix: "",
            })
            .await;

        assert_eq!(report.entries[0].outcome, SyncOutcome::Skipped);
        assert_eq!(destination.writes(), 0);
    }

    #[tokio::test]
    async fn test_unmappable_match_is_not_written() {
        let source = item_store();
        let mut fields = BTreeMap::new();
        fields.insert("user".to_string(), "bob".to_string());
        source.insert(SecretRecord::new("nopass", fields));
        let destination = kv_store();

        let p = paths(&["nopass"]);
        let report = engine()
            .sync(&SyncRequest {
                source: &source,
                destination: &destination,
                direction: SyncDirection::ItemToStructured,
                paths: &p,
                prefix: "",
            })
            .await;

        assert!(matches!(report.entries[0].outcome, SyncOutcome::MappingError(_)));
        assert_eq!(destination.writes(), 0);
    }

    #[tokio::test]
    async fn test_structured_to_item_projects_fields() {
        let source = kv_store();
        let mut fields = BTreeMap::new();
        fields.insert("user".to_string(), "alice".to_string());
        fields.insert("pass".to_string(), "wonderland".to_string());
        fields.insert("url".to_string(), "https://db".to_string());
        source.insert_at("services/x", SecretRecord::new("services/x", fields));
        let destination = item_store();

        let p = paths(&["services/x", "services/absent"]);
        let report = engine()
            .sync(&SyncRequest {
                source: &source,
                destination: &destination,
                direction: SyncDirection::StructuredToItem,
                paths: &p,
                prefix: "",
            })
            .await;

        assert_eq!(report.entries[0].outcome, SyncOutcome::Synced);
        assert_eq!(report.entries[1].outcome, SyncOutcome::Skipped);
        let item = destination.record("x").unwrap();
        assert_eq!(item.fields().len(), 2);
        assert_eq!(item.field("user"), Some("alice"));
    }

    /// Destination whose writes fail for selected paths
    struct FlakyStore {
        inner: MemorySecretStore,
        fail_on: &'static str,
    }

    #[async_trait]
    impl SecretStore for FlakyStore {
        fn id(&self) -> &str {
            self.inner.id()
        }
        fn store_type(&self) -> StoreType {
            self.inner.store_type()
        }
        fn address(&self) -> &str {
            "flaky"
        }
        async fn list(&self, filter: &str) -> SecretStoreResult<Vec<ListedSecret>> {
            self.inner.list(filter).await
        }
        async fn get(&self, path: &str) -> SecretStoreResult<SecretRecord> {
            self.inner.get(path).await
        }
        async fn put(&self, path: &str, record: &SecretRecord) -> SecretStoreResult<()> {
            if path == self.fail_on {
                return Err(SecretStoreError::Transport("connection reset".to_string()));
            }
            self.inner.put(path, record).await
        }
        async fn delete(&self, path: &str) -> SecretStoreResult<()> {
            self.inner.delete(path).await
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let source = item_store();
        for name in ["a", "b", "c"] {
            source.insert(SecretRecord::login(name, &names(), "u", "p"));
        }
        let destination = FlakyStore {
            inner: kv_store(),
            fail_on: "b",
        };

        let p = paths(&["a", "b", "c"]);
        let report = engine()
            .sync(&SyncRequest {
                source: &source,
                destination: &destination,
                direction: SyncDirection::ItemToStructured,
                paths: &p,
                prefix: "",
            })
            .await;

        let outcomes: Vec<&str> = report.entries.iter().map(|e| e.outcome.as_str()).collect();
        assert_eq!(outcomes, vec!["synced", "transport-error", "synced"]);
        assert_eq!(destination.inner.writes(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_sync_keeps_order() {
        let source = item_store();
        let names_list: Vec<String> = (0..20).map(|i| format!("item-{:02}", i)).collect();
        for name in &names_list {
            source.insert(SecretRecord::login(name.as_str(), &names(), "u", "p"));
        }
        let destination = kv_store();

        let report = engine()
            .with_concurrency(4)
            .sync(&SyncRequest {
                source: &source,
                destination: &destination,
                direction: SyncDirection::ItemToStructured,
                paths: &names_list,
                prefix: "",
            })
            .await;

        let order: Vec<&str> = report.entries.iter().map(|e| e.path.as_str()).collect();
        let expected: Vec<&str> = names_list.iter().map(String::as_str).collect();
        assert_eq!(order, expected);
        assert_eq!(report.synced(), 20);
    }

    #[tokio::test]
    async fn test_cancelled_paths_are_skipped() {
        let source = item_store();
        source.insert(SecretRecord::login("a", &names(), "u", "p"));
        let destination = kv_store();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let p = paths(&["a"]);
        let report = engine()
            .with_cancellation(cancel)
            .sync(&SyncRequest {
                source: &source,
                destination: &destination,
                direction: SyncDirection::ItemToStructured,
                paths: &p,
                prefix: "",
            })
            .await;

        assert_eq!(report.entries[0].outcome, SyncOutcome::Skipped);
        assert_eq!(report.entries[0].detail.as_deref(), Some("cancelled"));
        assert_eq!(destination.writes(), 0);
    }

    #[tokio::test]
    async fn test_one_event_per_path() {
        let capture = Arc::new(CaptureLogger::new());
        let source = item_store();
        source.insert(SecretRecord::login("a", &names(), "u", "p"));
        let destination = kv_store();

        let p = paths(&["a", "zzz"]);
        SyncEngine::new(Mapper::new(names()), capture.clone())
            .sync(&SyncRequest {
                source: &source,
                destination: &destination,
                direction: SyncDirection::ItemToStructured,
                paths: &p,
                prefix: "",
            })
            .await;

        let events: Vec<_> = capture
            .lines()
            .into_iter()
            .filter(|(_, m)| m.starts_with("source_id="))
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, "info");
        assert!(events[0].1.contains("outcome=synced"));
        assert_eq!(events[1].0, "warn");
        assert!(events[1].1.contains("path=\"zzz\" outcome=skipped"));
    }
}
