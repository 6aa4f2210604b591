//! Authentication errors

use std::time::Duration;

use thiserror::Error;

use crate::transport::ApiError;

/// Errors raised while obtaining or renewing a credential
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Login or unlock refused by the store
    #[error("authentication rejected: {0}")]
    Rejected(String),

    /// Lease renewal failed; recovered by re-login
    #[error("token renewal failed: {0}")]
    Renewal(String),

    #[error("required secret {0} is not set")]
    MissingSecret(&'static str),

    #[error("auth endpoint unreachable: {0}")]
    Transport(String),

    #[error("invalid auth response: {0}")]
    InvalidResponse(String),

    #[error("no valid token available after waiting {0:?}")]
    TokenUnavailable(Duration),

    #[error("authentication cancelled")]
    Cancelled,
}

impl AuthError {
    /// Classify a transport error from a login/unlock call
    pub fn from_login(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, message } if (400..500).contains(&status) => {
                AuthError::Rejected(format!("HTTP {}: {}", status, message))
            }
            ApiError::InvalidResponse(msg) => AuthError::InvalidResponse(msg),
            other => AuthError::Transport(other.to_string()),
        }
    }

    /// Classify a transport error from a renewal call
    pub fn from_renewal(err: ApiError) -> Self {
        AuthError::Renewal(err.to_string())
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_classification() {
        let rejected = AuthError::from_login(ApiError::Status {
            status: 400,
            message: "invalid username or password".to_string(),
        });
        assert!(matches!(rejected, AuthError::Rejected(m) if m.contains("invalid username")));

        let server = AuthError::from_login(ApiError::Status {
            status: 503,
            message: "Vault is sealed".to_string(),
        });
        assert!(matches!(server, AuthError::Transport(_)));

        let bad = AuthError::from_login(ApiError::InvalidResponse("eof".to_string()));
        assert_eq!(bad, AuthError::InvalidResponse("eof".to_string()));
    }
}
