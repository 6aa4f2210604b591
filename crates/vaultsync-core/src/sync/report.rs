//! Per-path outcomes and the structured sync event

use std::fmt;

use super::direction::SyncDirection;
use crate::secrets::SecretStore;

/// Result of syncing one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    /// Nothing to transfer (no match, not found, cancelled)
    Skipped,
    /// Several candidates; nothing written
    Ambiguous { count: usize },
    MappingError(String),
    /// Network, API or auth failure on a store call
    TransportError(String),
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Synced => "synced",
            SyncOutcome::Skipped => "skipped",
            SyncOutcome::Ambiguous { .. } => "ambiguous",
            SyncOutcome::MappingError(_) => "mapping-error",
            SyncOutcome::TransportError(_) => "transport-error",
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, SyncOutcome::Synced | SyncOutcome::Skipped)
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathReport {
    /// Configured source path
    pub path: String,
    /// Where the record went, or would have gone
    pub destination_path: Option<String>,
    pub outcome: SyncOutcome,
    pub detail: Option<String>,
}

impl PathReport {
    pub fn new(path: impl Into<String>, outcome: SyncOutcome) -> Self {
        Self {
            path: path.into(),
            destination_path: None,
            outcome,
            detail: None,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination_path = Some(destination.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn detail_text(&self) -> Option<String> {
        match (&self.outcome, &self.detail) {
            (_, Some(detail)) => Some(detail.clone()),
            (SyncOutcome::Ambiguous { count }, None) => Some(format!("{} matches", count)),
            (SyncOutcome::MappingError(msg), None) | (SyncOutcome::TransportError(msg), None) => {
                Some(msg.clone())
            }
            _ => None,
        }
    }
}

/// Per-path outcomes in configuration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub entries: Vec<PathReport>,
}

impl SyncReport {
    pub fn new(direction: SyncDirection) -> Self {
        Self {
            direction,
            entries: Vec::new(),
        }
    }

    pub fn synced(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Synced))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(SyncOutcome::is_failure)
    }

    /// No ambiguous, mapping or transport outcomes
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    pub fn entry(&self, path: &str) -> Option<&PathReport> {
        self.entries.iter().find(|e| e.path == path)
    }

    fn count(&self, pred: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "direction={} paths={} synced={} skipped={} failed={}",
            self.direction,
            self.entries.len(),
            self.synced(),
            self.skipped(),
            self.failed()
        )
    }
}

/// One log event per path, rendered as `key=value` pairs
pub struct SyncEvent<'a> {
    pub source: &'a dyn SecretStore,
    pub destination: &'a dyn SecretStore,
    pub entry: &'a PathReport,
}

impl fmt::Display for SyncEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "source_id={} source_type={} source_addr={} destination_id={} destination_type={} destination_addr={} path={:?}",
            self.source.id(),
            self.source.store_type(),
            self.source.address(),
            self.destination.id(),
            self.destination.store_type(),
            self.destination.address(),
            self.entry.path,
        )?;
        if let Some(dest) = &self.entry.destination_path {
            write!(f, " destination_path={:?}", dest)?;
        }
        write!(f, " outcome={}", self.entry.outcome)?;
        if let Some(detail) = self.entry.detail_text() {
            write!(f, " detail={:?}", detail)?;
        }
        Ok(())
    }
}
