//! Authentication backend seam

use std::time::Duration;

use async_trait::async_trait;

use super::error::AuthResult;
use crate::types::Credential;

/// An auth endpoint that hands out leased tokens
///
/// Implemented by the Vault userpass backend; tests use scripted fakes.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Human-readable name, used in log lines
    fn name(&self) -> &str;

    /// Exchange the configured secret for a fresh credential
    async fn login(&self) -> AuthResult<Credential>;

    /// Extend the lease of `current` by `increment`
    async fn renew(&self, current: &Credential, increment: Duration) -> AuthResult<Credential>;
}
