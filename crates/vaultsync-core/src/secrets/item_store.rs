//! Bitwarden item store over the `bw serve` REST API
//!
//! The store must be unlocked before use and locked when done. Writes are
//! upserts keyed by exact item name: a missing item is created, a single
//! existing item is updated in place, several same-named items are left
//! alone and reported as ambiguous.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Method;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

use super::traits::{ListedSecret, SecretStore, SecretStoreError, SecretStoreResult};
use crate::auth::{AuthError, AuthResult};
use crate::config::{RepoDescriptor, StoreType};
use crate::logging::SharedLogger;
use crate::mapper::{Mapper, NativeItem};
use crate::transport::{ApiAuth, ApiClient};
use crate::types::SecretRecord;
use crate::{log_debug, log_info, log_warn};

/// Response wrapper used by every `bw serve` endpoint
///
/// `message` and `data` are absent on many responses and decode as `None`.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

#[derive(Serialize)]
struct UnlockRequest<'a> {
    password: &'a str,
}

#[derive(Deserialize)]
struct UnlockData {
    raw: String,
}

#[derive(Deserialize)]
struct ItemList {
    #[serde(default)]
    data: Vec<NativeItem>,
}

#[derive(Deserialize)]
struct StatusData {
    template: StatusTemplate,
}

#[derive(Deserialize)]
struct StatusTemplate {
    status: String,
}

/// Password-manager item store
pub struct ItemSecretStore {
    id: String,
    client: ApiClient,
    mapper: Mapper,
    session: RwLock<Option<String>>,
    logger: SharedLogger,
}

impl ItemSecretStore {
    /// `mapper` decides which record fields hold the username and password
    pub fn new(id: impl Into<String>, client: ApiClient, mapper: Mapper, logger: SharedLogger) -> Self {
        Self {
            id: id.into(),
            client,
            mapper,
            session: RwLock::new(None),
            logger,
        }
    }

    pub fn from_repo(repo: &RepoDescriptor, client: ApiClient, mapper: Mapper, logger: SharedLogger) -> Self {
        Self::new(repo.id.clone(), client, mapper, logger)
    }

    pub fn is_unlocked(&self) -> bool {
        self.session.read().is_some()
    }

    /// Vault status reported by the server (`locked`, `unlocked`, `unauthenticated`)
    pub async fn status(&self) -> SecretStoreResult<String> {
        let request = self.client.request(Method::GET, "/status", ApiAuth::None);
        let data: StatusData = self.envelope(request).await?;
        Ok(data.template.status)
    }

    /// Exchange the master password for a session token
    pub async fn unlock(&self, password: &str) -> AuthResult<()> {
        let request = self
            .client
            .request(Method::POST, "/unlock", ApiAuth::None)
            .json(&UnlockRequest { password });
        let envelope: ApiEnvelope<UnlockData> = self
            .client
            .send_json(request)
            .await
            .map_err(AuthError::from_login)?;

        if !envelope.success {
            return Err(AuthError::Rejected(
                envelope.message.unwrap_or_else(|| "unlock refused".to_string()),
            ));
        }
        let raw = envelope
            .data
            .map(|d| d.raw)
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("unlock returned no session".to_string()))?;

        *self.session.write() = Some(raw);
        log_info!(self.logger, "{}: vault unlocked", self.id);
        Ok(())
    }

    /// Lock the vault. Safe to call more than once.
    pub async fn lock(&self) -> SecretStoreResult<()> {
        let Some(session) = self.session.read().clone() else {
            return Ok(());
        };
        let request = self
            .client
            .request(Method::POST, "/lock", ApiAuth::Bearer(&session));
        self.envelope_ok(request).await?;

        *self.session.write() = None;
        log_info!(self.logger, "{}: vault locked", self.id);
        Ok(())
    }

    fn session(&self) -> SecretStoreResult<String> {
        self.session
            .read()
            .clone()
            .ok_or_else(|| SecretStoreError::Locked(self.id.clone()))
    }

    /// Send a request and unwrap its envelope
    async fn envelope<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> SecretStoreResult<T> {
        let envelope: ApiEnvelope<T> = self.client.send_json(request).await?;
        if !envelope.success {
            return Err(SecretStoreError::Api {
                status: 200,
                message: envelope
                    .message
                    .unwrap_or_else(|| "request reported failure".to_string()),
            });
        }
        envelope
            .data
            .ok_or_else(|| SecretStoreError::InvalidResponse("response has no data".to_string()))
    }

    /// Check `success` only
    async fn envelope_ok(&self, request: reqwest::RequestBuilder) -> SecretStoreResult<()> {
        let envelope: ApiEnvelope<IgnoredAny> = self.client.send_json(request).await?;
        if envelope.success {
            Ok(())
        } else {
            Err(SecretStoreError::Api {
                status: 200,
                message: envelope
                    .message
                    .unwrap_or_else(|| "request reported failure".to_string()),
            })
        }
    }

    /// Substring search over item names
    async fn search(&self, term: &str) -> SecretStoreResult<Vec<NativeItem>> {
        let session = self.session()?;
        let request = self
            .client
            .request(Method::GET, "/list/object/items", ApiAuth::Bearer(&session))
            .query(&[("search", term)]);
        let list: ItemList = self.envelope(request).await?;
        log_debug!(self.logger, "{}: {} items match search", self.id, list.data.len());
        Ok(list.data)
    }

    /// Items whose name equals `name` exactly
    async fn named(&self, name: &str) -> SecretStoreResult<Vec<NativeItem>> {
        Ok(self
            .search(name)
            .await?
            .into_iter()
            .filter(|item| item.name == name)
            .collect())
    }

    async fn single(&self, name: &str) -> SecretStoreResult<NativeItem> {
        let mut hits = self.named(name).await?;
        match hits.len() {
            0 => Err(SecretStoreError::NotFound(name.to_string())),
            1 => Ok(hits.remove(0)),
            count => Err(SecretStoreError::AmbiguousMatch {
                path: name.to_string(),
                count,
            }),
        }
    }
}

fn item_id(item: &NativeItem) -> SecretStoreResult<&str> {
    item.id
        .as_deref()
        .ok_or_else(|| SecretStoreError::InvalidResponse(format!("item '{}' has no id", item.name)))
}

#[async_trait]
impl SecretStore for ItemSecretStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn store_type(&self) -> StoreType {
        StoreType::Bitwarden
    }

    fn address(&self) -> &str {
        self.client.base_url()
    }

    /// Every search hit is returned, each with its own mapping result
    async fn list(&self, filter: &str) -> SecretStoreResult<Vec<ListedSecret>> {
        Ok(self
            .search(filter)
            .await?
            .into_iter()
            .map(|item| {
                let record = self.mapper.from_native(&item);
                ListedSecret::new(item.name, record)
            })
            .collect())
    }

    async fn get(&self, path: &str) -> SecretStoreResult<SecretRecord> {
        let item = self.single(path).await?;
        Ok(self.mapper.from_native(&item)?)
    }

    async fn put(&self, path: &str, record: &SecretRecord) -> SecretStoreResult<()> {
        let record = record.renamed(path);
        let body = self.mapper.to_native(&record)?;
        let session = self.session()?;
        let hits = self.named(path).await?;

        match hits.as_slice() {
            [] => {
                let request = self
                    .client
                    .request(Method::POST, "/object/item", ApiAuth::Bearer(&session))
                    .json(&body);
                self.envelope_ok(request).await?;
                log_info!(self.logger, "{}: created item '{}'", self.id, path);
            }
            [existing] => {
                let url = self.client.endpoint(["object", "item", item_id(existing)?])?;
                let updated = self.mapper.update_native(&record, existing)?;
                let request = self
                    .client
                    .request_to(Method::PUT, url, ApiAuth::Bearer(&session))
                    .json(&updated);
                self.envelope_ok(request).await?;
                log_info!(self.logger, "{}: updated item '{}'", self.id, path);
            }
            many => {
                return Err(SecretStoreError::AmbiguousMatch {
                    path: path.to_string(),
                    count: many.len(),
                })
            }
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> SecretStoreResult<()> {
        let item = self.single(path).await?;
        let session = self.session()?;
        let url = self.client.endpoint(["object", "item", item_id(&item)?])?;
        let request = self
            .client
            .request_to(Method::DELETE, url, ApiAuth::Bearer(&session));
        self.envelope_ok(request).await?;
        log_info!(self.logger, "{}: deleted item '{}'", self.id, path);
        Ok(())
    }

    async fn close(&self) -> SecretStoreResult<()> {
        self.lock().await
    }
}

impl Drop for ItemSecretStore {
    fn drop(&mut self) {
        if self.session.get_mut().is_some() {
            log_warn!(
                self.logger,
                "{}: store dropped while the vault is still unlocked",
                self.id
            );
        }
    }
}

impl std::fmt::Debug for ItemSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemSecretStore")
            .field("id", &self.id)
            .field("addr", &self.client.base_url())
            .field("unlocked", &self.is_unlocked())
            .finish()
    }
}
