//! HashiCorp Vault KV v2 secret store

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::traits::{ListedSecret, SecretStore, SecretStoreError, SecretStoreResult};
use crate::auth::TokenSource;
use crate::config::{RepoDescriptor, StoreType};
use crate::log_debug;
use crate::logging::SharedLogger;
use crate::mapper::Mapper;
use crate::transport::{ApiAuth, ApiClient, ApiResult};
use crate::types::SecretRecord;

#[derive(Deserialize)]
struct ReadResponse {
    data: Option<ReadData>,
}

#[derive(Deserialize)]
struct ReadData {
    data: Option<Map<String, Value>>,
}

#[derive(Serialize)]
struct WriteRequest {
    data: Map<String, Value>,
}

#[derive(Deserialize)]
struct ListResponse {
    data: ListData,
}

#[derive(Deserialize)]
struct ListData {
    #[serde(default)]
    keys: Vec<String>,
}

/// Versioned key-value store under one mount
///
/// Every call reads the current token from a [`TokenSource`], so a renewal
/// happening in the background is picked up by the next request.
pub struct KvSecretStore {
    id: String,
    client: ApiClient,
    mount: String,
    tokens: TokenSource,
    mapper: Mapper,
    logger: SharedLogger,
}

impl KvSecretStore {
    pub fn new(
        id: impl Into<String>,
        client: ApiClient,
        mount: impl Into<String>,
        tokens: TokenSource,
        logger: SharedLogger,
    ) -> Self {
        Self {
            id: id.into(),
            client,
            mount: mount.into().trim_matches('/').to_string(),
            tokens,
            mapper: Mapper::default(),
            logger,
        }
    }

    /// Build from a repository descriptor
    pub fn from_repo(
        repo: &RepoDescriptor,
        client: ApiClient,
        tokens: TokenSource,
        logger: SharedLogger,
    ) -> Self {
        Self::new(repo.id.clone(), client, repo.mount_path.clone(), tokens, logger)
            .with_mapper(Mapper::new(repo.field_names()))
    }

    pub fn with_mapper(mut self, mapper: Mapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// `v1/<mount>/<section>/<path>`, one escaped segment per path element
    fn endpoint(&self, section: &str, path: &str) -> ApiResult<Url> {
        let mount = self.mount.split('/').filter(|s| !s.is_empty());
        let path = path.split('/').filter(|s| !s.is_empty());
        self.client
            .endpoint(std::iter::once("v1").chain(mount).chain([section]).chain(path))
    }

    /// Key names directly below `folder`; sub-folders end in `/`
    async fn keys(&self, folder: &str) -> SecretStoreResult<Vec<String>> {
        let token = self.tokens.token().await?;
        let url = self.endpoint("metadata", folder)?;
        let request = self
            .client
            .request_to(Method::GET, url, ApiAuth::VaultToken(&token))
            .query(&[("list", "true")]);
        match self.client.send_json::<ListResponse>(request).await {
            Ok(response) => Ok(response.data.keys),
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl SecretStore for KvSecretStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn store_type(&self) -> StoreType {
        StoreType::Vault
    }

    fn address(&self) -> &str {
        self.client.base_url()
    }

    /// Reads every leaf secret directly below the `filter` folder
    async fn list(&self, filter: &str) -> SecretStoreResult<Vec<ListedSecret>> {
        let folder = filter.trim_matches('/');
        let mut listed = Vec::new();
        for key in self.keys(folder).await? {
            if key.ends_with('/') {
                continue;
            }
            let path = if folder.is_empty() {
                key
            } else {
                format!("{}/{}", folder, key)
            };
            match self.get(&path).await {
                Ok(record) => listed.push(ListedSecret::new(path, Ok(record))),
                Err(SecretStoreError::Mapping(err)) => listed.push(ListedSecret::new(path, Err(err))),
                // Deleted between listing and reading.
                Err(SecretStoreError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        log_debug!(self.logger, "{}: {} secrets under '{}'", self.id, listed.len(), folder);
        Ok(listed)
    }

    async fn get(&self, path: &str) -> SecretStoreResult<SecretRecord> {
        let token = self.tokens.token().await?;
        let url = self.endpoint("data", path)?;
        let request = self
            .client
            .request_to(Method::GET, url, ApiAuth::VaultToken(&token));
        let response: ReadResponse = match self.client.send_json(request).await {
            Ok(response) => response,
            Err(err) if err.is_not_found() => {
                return Err(SecretStoreError::NotFound(path.to_string()))
            }
            Err(err) => return Err(err.into()),
        };

        // A soft-deleted version comes back with `data: null`.
        let data = response
            .data
            .and_then(|d| d.data)
            .ok_or_else(|| SecretStoreError::NotFound(path.to_string()))?;
        Ok(self.mapper.from_structured(path, &data)?)
    }

    async fn put(&self, path: &str, record: &SecretRecord) -> SecretStoreResult<()> {
        let token = self.tokens.token().await?;
        let url = self.endpoint("data", path)?;
        let request = self
            .client
            .request_to(Method::POST, url, ApiAuth::VaultToken(&token))
            .json(&WriteRequest {
                data: self.mapper.to_structured(record),
            });
        self.client.send_empty(request).await?;
        log_debug!(self.logger, "{}: wrote {}/{}", self.id, self.mount, path);
        Ok(())
    }

    /// Removes all versions and the metadata of `path`
    async fn delete(&self, path: &str) -> SecretStoreResult<()> {
        let token = self.tokens.token().await?;
        let url = self.endpoint("metadata", path)?;
        let request = self
            .client
            .request_to(Method::DELETE, url, ApiAuth::VaultToken(&token));
        self.client
            .send_empty(request)
            .await
            .map_err(|err| {
                if err.is_not_found() {
                    SecretStoreError::NotFound(path.to_string())
                } else {
                    err.into()
                }
            })
    }
}

impl std::fmt::Debug for KvSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvSecretStore")
            .field("id", &self.id)
            .field("addr", &self.client.base_url())
            .field("mount", &self.mount)
            .finish()
    }
}
