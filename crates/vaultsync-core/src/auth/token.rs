//! Shared view of the current credential
//!
//! The lifecycle manager publishes whole `Arc<Credential>` values through a
//! `watch` channel, so a reader sees either the previous or the next token,
//! never a mix.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::error::{AuthError, AuthResult};
use crate::types::Credential;

type Slot = Option<Arc<Credential>>;

/// Write side, owned by the lifecycle manager
#[derive(Debug)]
pub(crate) struct TokenPublisher {
    tx: watch::Sender<Slot>,
}

impl TokenPublisher {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub(crate) fn install(&self, credential: Credential) {
        self.tx.send_replace(Some(Arc::new(credential)));
    }

    pub(crate) fn source(&self, wait: Duration) -> TokenSource {
        TokenSource {
            rx: self.tx.subscribe(),
            wait,
        }
    }
}

/// Read side handed to store clients
#[derive(Debug, Clone)]
pub struct TokenSource {
    rx: watch::Receiver<Slot>,
    wait: Duration,
}

impl TokenSource {
    /// A source that always yields the same non-expiring token
    pub fn fixed(token: impl Into<String>) -> Self {
        let (_tx, rx) = watch::channel(Some(Arc::new(Credential::static_token(token))));
        Self {
            rx,
            wait: Duration::ZERO,
        }
    }

    /// The current credential if it has not expired
    pub fn current(&self) -> Option<Arc<Credential>> {
        self.rx
            .borrow()
            .as_ref()
            .filter(|c| !c.is_expired())
            .cloned()
    }

    /// The current token, waiting up to the configured time for a valid one
    /// to be installed.
    pub async fn token(&self) -> AuthResult<String> {
        if let Some(credential) = self.current() {
            return Ok(credential.token().to_string());
        }

        let mut rx = self.rx.clone();
        let waited = tokio::time::timeout(self.wait, async move {
            loop {
                let found = rx
                    .borrow_and_update()
                    .as_ref()
                    .filter(|c| !c.is_expired())
                    .map(|c| c.token().to_string());
                if found.is_some() {
                    return found;
                }
                // Publisher gone: nothing new will ever arrive.
                if rx.changed().await.is_err() {
                    return None;
                }
            }
        })
        .await;

        match waited {
            Ok(Some(token)) => Ok(token),
            _ => Err(AuthError::TokenUnavailable(self.wait)),
        }
    }
}
