//! Authentication and token lifecycle
//!
//! - `AuthBackend`: login/renew seam, implemented by `UserpassAuth`
//! - `CredentialLifecycleManager`: background renewal and re-login
//! - `TokenSource`: read side of the current credential, handed to stores

mod backend;
mod backoff;
mod error;
mod lifecycle;
mod token;
mod userpass;

pub use backend::AuthBackend;
pub use backoff::{Backoff, BackoffPolicy};
pub use error::{AuthError, AuthResult};
pub use lifecycle::{
    CredentialLifecycleManager, LifecycleConfig, LifecycleEvent, LifecycleHandle, LifecycleState,
};
pub use token::TokenSource;
pub use userpass::UserpassAuth;
