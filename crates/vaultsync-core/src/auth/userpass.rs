//! Vault userpass login and token self-renewal

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::backend::AuthBackend;
use super::error::{AuthError, AuthResult};
use crate::config::{EnvSecrets, VAULT_PASSWORD_VAR, VAULT_USER_VAR};
use crate::transport::{ApiAuth, ApiClient};
use crate::types::Credential;

const AUTH_MOUNT: &str = "userpass";

#[derive(Serialize)]
struct LoginRequest<'a> {
    password: &'a str,
}

#[derive(Serialize)]
struct RenewRequest {
    increment: u64,
}

#[derive(Deserialize)]
struct AuthResponse {
    auth: Option<AuthInfo>,
}

#[derive(Deserialize)]
struct AuthInfo {
    client_token: String,
    #[serde(default)]
    lease_duration: u64,
    #[serde(default)]
    renewable: bool,
}

impl AuthResponse {
    fn into_credential(self) -> AuthResult<Credential> {
        let auth = self
            .auth
            .ok_or_else(|| AuthError::InvalidResponse("response carries no auth block".to_string()))?;
        if auth.client_token.is_empty() {
            return Err(AuthError::InvalidResponse("empty client_token".to_string()));
        }
        Ok(Credential::from_lease_secs(
            auth.client_token,
            auth.lease_duration,
            auth.renewable,
        ))
    }
}

/// Username/password login against a Vault server
pub struct UserpassAuth {
    client: ApiClient,
    username: String,
    password: String,
}

impl UserpassAuth {
    pub fn new(client: ApiClient, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build from `VAULT_USER`/`VAULT_PASSWORD`
    pub fn from_env(client: ApiClient, env: &EnvSecrets) -> AuthResult<Self> {
        let username = env
            .vault_user
            .clone()
            .ok_or(AuthError::MissingSecret(VAULT_USER_VAR))?;
        let password = env
            .vault_password
            .clone()
            .ok_or(AuthError::MissingSecret(VAULT_PASSWORD_VAR))?;
        Ok(Self::new(client, username, password))
    }
}

#[async_trait]
impl AuthBackend for UserpassAuth {
    fn name(&self) -> &str {
        self.client.base_url()
    }

    async fn login(&self) -> AuthResult<Credential> {
        let url = self
            .client
            .endpoint(["v1", "auth", AUTH_MOUNT, "login", self.username.as_str()])
            .map_err(AuthError::from_login)?;
        let request = self
            .client
            .request_to(Method::POST, url, ApiAuth::None)
            .json(&LoginRequest {
                password: &self.password,
            });
        let response: AuthResponse = self
            .client
            .send_json(request)
            .await
            .map_err(AuthError::from_login)?;
        response.into_credential()
    }

    async fn renew(&self, current: &Credential, increment: Duration) -> AuthResult<Credential> {
        let request = self
            .client
            .request(
                Method::POST,
                "v1/auth/token/renew-self",
                ApiAuth::VaultToken(current.token()),
            )
            .json(&RenewRequest {
                increment: increment.as_secs(),
            });
        let response: AuthResponse = self
            .client
            .send_json(request)
            .await
            .map_err(AuthError::from_renewal)?;
        response
            .into_credential()
            .map_err(|e| AuthError::Renewal(e.to_string()))
    }
}

impl std::fmt::Debug for UserpassAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserpassAuth")
            .field("addr", &self.client.base_url())
            .field("username", &self.username)
            .finish()
    }
}
