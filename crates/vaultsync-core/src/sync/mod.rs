//! Sync engine
//!
//! Item to structured: search the item store for each path; exactly one hit
//! is written at `prefix + item name`. Zero hits are skipped, several are
//! reported ambiguous.
//!
//! Structured to item: read each path, keep the username/password fields and
//! upsert an item named `prefix + last path segment`.

mod direction;
mod engine;
mod report;

pub use direction::SyncDirection;
pub use engine::{SyncEngine, SyncRequest};
pub use report::{PathReport, SyncEvent, SyncOutcome, SyncReport};
