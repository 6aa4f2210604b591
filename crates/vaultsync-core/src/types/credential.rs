//! Leased access token

use std::time::Duration;

use tokio::time::Instant;

/// An access token with its lease.
///
/// A credential is immutable; renewal and re-login produce a new value which
/// replaces the old one as a whole.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    issued_at: Instant,
    /// `None` means the token never expires (root or pre-issued tokens).
    lease: Option<Duration>,
    renewable: bool,
}

impl Credential {
    /// A credential issued now with the given lease
    pub fn leased(token: impl Into<String>, lease: Duration, renewable: bool) -> Self {
        Self {
            token: token.into(),
            issued_at: Instant::now(),
            lease: Some(lease),
            renewable,
        }
    }

    /// A credential without expiry, e.g. a token taken from the environment
    pub fn static_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            issued_at: Instant::now(),
            lease: None,
            renewable: false,
        }
    }

    /// Build from a lease duration in seconds as reported by an auth endpoint.
    ///
    /// A zero lease is reported for non-expiring tokens.
    pub fn from_lease_secs(token: impl Into<String>, lease_secs: u64, renewable: bool) -> Self {
        if lease_secs == 0 {
            Self {
                renewable,
                ..Self::static_token(token)
            }
        } else {
            Self::leased(token, Duration::from_secs(lease_secs), renewable)
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub fn lease(&self) -> Option<Duration> {
        self.lease
    }

    pub fn is_renewable(&self) -> bool {
        self.renewable
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.lease.map(|lease| self.issued_at + lease)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at()
            .map(|at| Instant::now() >= at)
            .unwrap_or(false)
    }

    /// Point in time at which `fraction` of the lease has elapsed.
    ///
    /// `fraction` is clamped to `[0, 1]`; NaN counts as 0.
    pub fn refresh_at(&self, fraction: f64) -> Option<Instant> {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.lease
            .map(|lease| self.issued_at + lease.mul_f64(fraction))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("lease", &self.lease)
            .field("renewable", &self.renewable)
            .field("expired", &self.is_expired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_leased_credential_expires() {
        let cred = Credential::leased("t", Duration::from_secs(60), true);
        assert!(!cred.is_expired());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cred.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_point() {
        let cred = Credential::leased("t", Duration::from_secs(90), true);
        let at = cred.refresh_at(2.0 / 3.0).unwrap();
        assert_eq!(at - cred.issued_at(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_point_with_nan_fraction() {
        let cred = Credential::leased("t", Duration::from_secs(90), true);
        assert_eq!(cred.refresh_at(f64::NAN), Some(cred.issued_at()));
        assert_eq!(
            cred.refresh_at(7.0),
            Some(cred.issued_at() + Duration::from_secs(90))
        );
    }

    #[test]
    fn test_zero_lease_never_expires() {
        let cred = Credential::from_lease_secs("root", 0, false);
        assert_eq!(cred.lease(), None);
        assert!(!cred.is_expired());
        assert_eq!(cred.refresh_at(0.5), None);
    }

    #[test]
    fn test_debug_hides_token() {
        let cred = Credential::static_token("s.verysecret");
        assert!(!format!("{:?}", cred).contains("verysecret"));
    }
}
