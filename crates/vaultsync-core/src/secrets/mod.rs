//! Secret store capability interface and implementations
//!
//! - `SecretStore` trait: uniform list/get/put/delete over one store
//! - `KvSecretStore`: structured key-value store (Vault KV v2)
//! - `ItemSecretStore`: password-manager item store (`bw serve`)
//! - `MemorySecretStore`: in-memory, for tests

mod item_store;
mod kv_store;
mod memory_store;
mod traits;

pub use item_store::{ApiEnvelope, ItemSecretStore};
pub use kv_store::KvSecretStore;
pub use memory_store::MemorySecretStore;
pub use traits::{ListedSecret, SecretStore, SecretStoreError, SecretStoreResult};
