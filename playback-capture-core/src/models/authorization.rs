use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Consent token permitting interception of device audio output.
///
/// Opaque to the core and deliberately not `Clone`: it is moved into the
/// capture configuration and consumed by exactly one session. The next
/// session needs a freshly granted authorization.
pub struct CaptureAuthorization {
    token: String,
    granted_at: DateTime<Utc>,
    revoked: Arc<AtomicBool>,
}

impl CaptureAuthorization {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            granted_at: Utc::now(),
            revoked: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Platform token handed over by the consent collaborator.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Handle the consent collaborator keeps to revoke this grant later.
    pub fn revoker(&self) -> AuthorizationRevoker {
        AuthorizationRevoker {
            revoked: Arc::clone(&self.revoked),
        }
    }
}

impl fmt::Debug for CaptureAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The token is a credential; keep it out of logs.
        f.debug_struct("CaptureAuthorization")
            .field("granted_at", &self.granted_at)
            .field("revoked", &self.is_revoked())
            .finish_non_exhaustive()
    }
}

/// Revokes a [`CaptureAuthorization`] from outside the session.
#[derive(Debug, Clone)]
pub struct AuthorizationRevoker {
    revoked: Arc<AtomicBool>,
}

impl AuthorizationRevoker {
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoker_flips_shared_flag() {
        let auth = CaptureAuthorization::new("grant-1");
        let revoker = auth.revoker();
        assert!(!auth.is_revoked());

        revoker.revoke();
        assert!(auth.is_revoked());
        assert_eq!(auth.token(), "grant-1");
    }

    #[test]
    fn debug_does_not_leak_token() {
        let auth = CaptureAuthorization::new("secret-token");
        assert!(!format!("{:?}", auth).contains("secret-token"));
    }
}
