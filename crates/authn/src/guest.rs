//! Guest identity issuer.
//!
//! Hands out signed claims on platform `"guest"` for any non-empty name.
//! It has no state of its own: the claim it returns is exactly what the
//! login service expects in claim mode.

use authn_protocol::{now_micros, sign_claim, PlatformClaim, Secret};

use crate::AuthError;

/// Platform name stamped on every guest claim.
pub const GUEST_PLATFORM: &str = "guest";

/// Issues guest claims signed with the shared secret.
#[derive(Debug, Clone)]
pub struct GuestService {
    secret: Secret,
}

impl GuestService {
    pub fn new(secret: Secret) -> Self {
        Self { secret }
    }

    /// Signs a fresh claim that `name` is a guest.
    pub fn issue(&self, name: &str) -> Result<PlatformClaim, AuthError> {
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }
        tracing::debug!(name, "guest claim issued");
        Ok(sign_claim(GUEST_PLATFORM, name, None, now_micros(), &self.secret))
    }
}
