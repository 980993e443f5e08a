//! The authentication service: one request in, one signed response out.
//!
//! The service is transport-agnostic. The HTTP adapter in
//! [`handler`](crate::handler) decodes bodies and maps errors to statuses;
//! everything about claims, tokens, and signatures happens here.
//!
//! ```text
//! LoginRequest
//!   ├─ platform set ─→ validate pid ─→ freshness ─→ claim signature
//!   │                        ─→ store.resolve_or_create_by_platform
//!   │                        ─→ dbToken = newest kept, keeps = all kept
//!   └─ platform empty ─→ validate uid, dbToken
//!                            ─→ store.validate_and_touch
//!                            ─→ dbToken = echoed, keeps = [it]
//!                                           │
//!                                           ▼
//!                        sign (ts, uid, dbToken, info) ─→ LoginResponse
//! ```

use std::sync::Arc;

use authn_protocol::{
    check_freshness, keep_digest, now_micros, response_signature,
    verify_claim, LoginRequest, LoginResponse, Secret, Uid,
};
use authn_store::CredentialStore;

use crate::AuthError;

/// Verifies claims and session tokens and signs login responses.
///
/// Cheap to share: the store sits behind an `Arc` and the secret and
/// window never change after construction.
pub struct AuthService {
    store: Arc<CredentialStore>,
    secret: Secret,
    replay_window_micros: i64,
}

impl AuthService {
    /// Creates a service over `store`, signing with `secret` and accepting
    /// claims up to `replay_window_micros` old.
    pub fn new(
        store: Arc<CredentialStore>,
        secret: Secret,
        replay_window_micros: i64,
    ) -> Self {
        Self {
            store,
            secret,
            replay_window_micros,
        }
    }

    /// The store this service writes to.
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Authenticates one request.
    ///
    /// A non-empty `platform` selects claim mode (platform login),
    /// otherwise token mode (session resume). Either the whole request
    /// succeeds, or it fails without having changed anything.
    pub async fn authenticate(
        &self,
        request: LoginRequest,
    ) -> Result<LoginResponse, AuthError> {
        let result = if request.is_claim() {
            self.login_by_claim(request).await
        } else {
            self.login_by_token(request).await
        };

        if let Err(e) = &result {
            if e.is_suspicious() {
                tracing::warn!(error = %e, "rejected credentials");
            } else {
                tracing::debug!(error = %e, "authentication failed");
            }
        }
        result
    }

    async fn login_by_claim(
        &self,
        request: LoginRequest,
    ) -> Result<LoginResponse, AuthError> {
        let LoginRequest {
            platform,
            pid,
            info,
            ts,
            token,
            ..
        } = request;

        if pid.is_empty() {
            return Err(AuthError::MissingPid);
        }
        if !check_freshness(ts, now_micros(), self.replay_window_micros) {
            return Err(AuthError::StaleClaim);
        }
        if !verify_claim(ts, &pid, &platform, info.as_deref(), &token, &self.secret)
        {
            return Err(AuthError::BadSignature);
        }

        let resolved = self
            .store
            .resolve_or_create_by_platform(&platform, &pid, info.as_deref())
            .await?;

        let db_token = resolved
            .newest_token()
            .ok_or_else(|| AuthError::AuthFailed("no session token issued".into()))?
            .to_string();
        let keeps = resolved
            .kept_tokens
            .iter()
            .map(|t| keep_digest(t, &self.secret))
            .collect();

        tracing::info!(uid = %resolved.uid, "platform login");
        Ok(self.sign_response(resolved.uid, db_token, keeps, resolved.profile))
    }

    async fn login_by_token(
        &self,
        request: LoginRequest,
    ) -> Result<LoginResponse, AuthError> {
        if request.uid.is_empty() {
            return Err(AuthError::MissingUid);
        }
        if request.db_token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let uid = Uid::new(request.uid);
        let db_token = request.db_token;

        let profile = self.store.validate_and_touch(&uid, &db_token).await?;

        let keeps = vec![keep_digest(&db_token, &self.secret)];

        tracing::info!(%uid, "session resumed");
        Ok(self.sign_response(uid, db_token, keeps, profile))
    }

    /// Stamps a fresh timestamp on the response and signs it.
    fn sign_response(
        &self,
        uid: Uid,
        db_token: String,
        keeps: Vec<String>,
        info: String,
    ) -> LoginResponse {
        let ts = now_micros();
        let token =
            response_signature(ts, uid.as_str(), &db_token, &info, &self.secret);
        LoginResponse {
            uid,
            db_token,
            keeps,
            info,
            ts,
            token,
        }
    }
}
