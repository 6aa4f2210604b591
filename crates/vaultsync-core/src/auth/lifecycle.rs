//! Credential lifecycle: login, lease renewal and re-login
//!
//! State machine:
//!
//! ```text
//! LoggedOut -> Authenticating -> Authenticated -> Renewing -> Authenticated
//!                    ^                                   \
//!                    +-------- ReLoginRequired <----------+
//! ```
//!
//! The first login is awaited by [`CredentialLifecycleManager::start`] and its
//! failure is returned to the caller. After that the loop runs as its own
//! task until cancelled; failures only produce [`LifecycleEvent`]s.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::backend::AuthBackend;
use super::backoff::{Backoff, BackoffPolicy};
use super::error::{AuthError, AuthResult};
use super::token::{TokenPublisher, TokenSource};
use crate::config::{TokenSettings, DEFAULT_RENEW_FRACTION};
use crate::logging::SharedLogger;
use crate::types::{CancellationToken, Credential};
use crate::{log_info, log_warn};

/// Tuning for the lifecycle loop
///
/// A token that cannot be renewed is not replaced immediately: it is kept
/// until its refresh point (`renew_fraction` of its lease) and a fresh login
/// happens then. A single-use token with a short lease is therefore
/// re-issued shortly before expiry instead of in a tight login loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    /// Renew once this fraction of the lease has elapsed. Values outside
    /// `(0, 1)`, NaN included, fall back to [`DEFAULT_RENEW_FRACTION`].
    pub renew_fraction: f64,
    /// Lease extension requested on renewal
    pub increment: Duration,
    pub backoff: BackoffPolicy,
    /// How long store calls wait for a valid token
    pub token_wait: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self::from(&TokenSettings::default())
    }
}

impl LifecycleConfig {
    fn has_valid_fraction(&self) -> bool {
        self.renew_fraction > 0.0 && self.renew_fraction < 1.0
    }

    /// The renewal fraction actually used by the loop
    pub fn refresh_fraction(&self) -> f64 {
        if self.has_valid_fraction() {
            self.renew_fraction
        } else {
            DEFAULT_RENEW_FRACTION
        }
    }
}

impl From<&TokenSettings> for LifecycleConfig {
    fn from(settings: &TokenSettings) -> Self {
        Self {
            renew_fraction: settings.renew_fraction,
            increment: settings.increment(),
            backoff: BackoffPolicy {
                initial: Duration::from_secs(settings.backoff_initial_secs),
                max: Duration::from_secs(settings.backoff_max_secs),
                ..BackoffPolicy::default()
            },
            token_wait: Duration::from_secs(settings.token_wait_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    LoggedOut,
    Authenticating,
    Authenticated,
    Renewing,
    ReLoginRequired,
}

/// Observable lifecycle transitions
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    LoggedIn {
        lease: Option<Duration>,
        renewable: bool,
    },
    Renewed {
        lease: Option<Duration>,
    },
    /// Token cannot be renewed; a fresh login is scheduled instead
    NotRenewable,
    /// Renewal no longer extends the lease (max TTL reached)
    LeaseEnded,
    RenewalFailed {
        error: AuthError,
    },
    LoginFailed {
        attempt: u32,
        error: AuthError,
        retry_in: Duration,
    },
    Stopped,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::LoggedIn { lease, renewable } => {
                write!(f, "logged in (lease={:?}, renewable={})", lease, renewable)
            }
            LifecycleEvent::Renewed { lease } => write!(f, "token renewed (lease={:?})", lease),
            LifecycleEvent::NotRenewable => {
                write!(f, "token is not renewable, re-login scheduled")
            }
            LifecycleEvent::LeaseEnded => {
                write!(f, "lease can no longer be extended, re-login scheduled")
            }
            LifecycleEvent::RenewalFailed { error } => {
                write!(f, "{}, re-attempting login", error)
            }
            LifecycleEvent::LoginFailed {
                attempt,
                error,
                retry_in,
            } => write!(
                f,
                "login attempt {} failed: {} (retrying in {:?})",
                attempt, error, retry_in
            ),
            LifecycleEvent::Stopped => write!(f, "lifecycle stopped"),
        }
    }
}

/// Keeps one store's token valid for the life of the process
pub struct CredentialLifecycleManager {
    backend: Arc<dyn AuthBackend>,
    config: LifecycleConfig,
    cancel: CancellationToken,
    stop: CancellationToken,
    state: Arc<RwLock<LifecycleState>>,
    publisher: TokenPublisher,
    observer: Option<mpsc::UnboundedSender<LifecycleEvent>>,
    logger: SharedLogger,
}

impl CredentialLifecycleManager {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        config: LifecycleConfig,
        cancel: CancellationToken,
        logger: SharedLogger,
    ) -> Self {
        if !config.has_valid_fraction() {
            log_warn!(
                logger,
                "{}: renew fraction {} is outside (0, 1), using {:.3}",
                backend.name(),
                config.renew_fraction,
                DEFAULT_RENEW_FRACTION
            );
        }
        Self {
            backend,
            config,
            cancel,
            stop: CancellationToken::new(),
            state: Arc::new(RwLock::new(LifecycleState::LoggedOut)),
            publisher: TokenPublisher::new(),
            observer: None,
            logger,
        }
    }

    /// Deliver lifecycle events to `tx` in addition to the logger
    pub fn with_observer(mut self, tx: mpsc::UnboundedSender<LifecycleEvent>) -> Self {
        self.observer = Some(tx);
        self
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    /// Perform the initial login and spawn the renewal loop.
    ///
    /// An error here means no token was ever obtained.
    pub async fn start(self) -> AuthResult<LifecycleHandle> {
        self.set_state(LifecycleState::Authenticating);
        let credential = match self.cancellable(self.backend.login()).await {
            Some(Ok(credential)) => credential,
            Some(Err(err)) => {
                self.set_state(LifecycleState::LoggedOut);
                return Err(err);
            }
            None => {
                self.set_state(LifecycleState::LoggedOut);
                return Err(AuthError::Cancelled);
            }
        };
        self.logged_in(&credential);

        let handle_state = Arc::clone(&self.state);
        let tokens = self.publisher.source(self.config.token_wait);
        let stop = self.stop.clone();
        let task = tokio::spawn(async move { self.run(credential).await });

        Ok(LifecycleHandle {
            tokens,
            state: handle_state,
            stop,
            task,
        })
    }

    async fn run(self, initial: Credential) {
        let mut current = initial;
        let mut extendable = current.is_renewable();
        let mut backoff = Backoff::new(self.config.backoff.clone());

        loop {
            let Some(wait) = self.until_refresh(&current) else {
                // Non-expiring token: nothing to do until shutdown.
                self.wait_for_shutdown().await;
                break;
            };

            if !extendable {
                if !current.is_renewable() {
                    self.emit(LifecycleEvent::NotRenewable);
                }
                if !self.wait(wait).await {
                    break;
                }
                self.set_state(LifecycleState::ReLoginRequired);
            } else {
                if !self.wait(wait).await {
                    break;
                }

                self.set_state(LifecycleState::Renewing);
                let renewal = self
                    .cancellable(self.backend.renew(&current, self.config.increment))
                    .await;
                match renewal {
                    None => break,
                    Some(Ok(renewed)) => {
                        let grew = match (renewed.expires_at(), current.expires_at()) {
                            (None, _) => true,
                            (Some(new), Some(old)) => new > old,
                            (Some(_), None) => false,
                        };
                        extendable = renewed.is_renewable() && grew;
                        self.publisher.install(renewed.clone());
                        self.set_state(LifecycleState::Authenticated);
                        self.emit(LifecycleEvent::Renewed {
                            lease: renewed.lease(),
                        });
                        if renewed.is_renewable() && !grew {
                            self.emit(LifecycleEvent::LeaseEnded);
                        }
                        current = renewed;
                        continue;
                    }
                    Some(Err(err)) => {
                        let error = match err {
                            AuthError::Renewal(_) => err,
                            other => AuthError::Renewal(other.to_string()),
                        };
                        self.set_state(LifecycleState::ReLoginRequired);
                        self.emit(LifecycleEvent::RenewalFailed { error });
                    }
                }
            }

            match self.login_with_backoff(&mut backoff).await {
                Some(credential) => {
                    self.logged_in(&credential);
                    extendable = credential.is_renewable();
                    current = credential;
                }
                None => break,
            }
        }

        self.set_state(LifecycleState::LoggedOut);
        self.emit(LifecycleEvent::Stopped);
    }

    async fn login_with_backoff(&self, backoff: &mut Backoff) -> Option<Credential> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.set_state(LifecycleState::Authenticating);
            match self.cancellable(self.backend.login()).await? {
                Ok(credential) => {
                    backoff.reset();
                    return Some(credential);
                }
                Err(error) => {
                    let retry_in = backoff.next_delay();
                    self.set_state(LifecycleState::ReLoginRequired);
                    self.emit(LifecycleEvent::LoginFailed {
                        attempt,
                        error,
                        retry_in,
                    });
                    if !self.wait(retry_in).await {
                        return None;
                    }
                }
            }
        }
    }

    fn logged_in(&self, credential: &Credential) {
        self.publisher.install(credential.clone());
        self.set_state(LifecycleState::Authenticated);
        self.emit(LifecycleEvent::LoggedIn {
            lease: credential.lease(),
            renewable: credential.is_renewable(),
        });
    }

    fn until_refresh(&self, credential: &Credential) -> Option<Duration> {
        credential
            .refresh_at(self.config.refresh_fraction())
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.write() = state;
    }

    fn emit(&self, event: LifecycleEvent) {
        match &event {
            LifecycleEvent::RenewalFailed { .. } | LifecycleEvent::LoginFailed { .. } => {
                log_warn!(self.logger, "{}: {}", self.backend.name(), event)
            }
            _ => log_info!(self.logger, "{}: {}", self.backend.name(), event),
        }
        if let Some(tx) = &self.observer {
            // A dropped observer is not an error for the loop.
            let _ = tx.send(event);
        }
    }

    /// Sleep unless shut down first; `false` on shutdown
    async fn wait(&self, duration: Duration) -> bool {
        self.cancellable(tokio::time::sleep(duration)).await.is_some()
    }

    async fn wait_for_shutdown(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.stop.cancelled() => {}
        }
    }

    async fn cancellable<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            _ = self.stop.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

/// Handle to a running lifecycle loop
pub struct LifecycleHandle {
    tokens: TokenSource,
    state: Arc<RwLock<LifecycleState>>,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl LifecycleHandle {
    /// Token source for store clients
    pub fn tokens(&self) -> TokenSource {
        self.tokens.clone()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop renewing and wait for the task to exit
    pub async fn shutdown(self) {
        self.stop.cancel();
        // A panicked task has nothing left to clean up.
        let _ = self.task.await;
    }
}

impl fmt::Debug for LifecycleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHandle")
            .field("state", &self.state())
            .field("finished", &self.is_finished())
            .finish()
    }
}
