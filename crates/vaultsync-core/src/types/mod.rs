//! Core types shared across stores, auth and sync
//!
//! This module contains the canonical data model.

mod cancellation;
mod credential;
mod record;

pub use cancellation::CancellationToken;
pub use credential::Credential;
pub use record::{FieldNames, SecretRecord, DEFAULT_PASS_FIELD, DEFAULT_USER_FIELD};
