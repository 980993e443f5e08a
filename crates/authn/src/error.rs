//! Error types for the login and guest services.

use authn_protocol::ProtocolError;
use authn_store::StoreError;
use axum::http::StatusCode;

/// Status code the login service uses for every authentication failure.
pub const STATUS_LOGIN_AUTH_ERROR: u16 = 597;

/// Body text shared by every failure that must not reveal which part of
/// the credentials was wrong.
const AUTH_FAIL: &str = "auth fail";

// ---------------------------------------------------------------------------
// AuthError: per-request failures
// ---------------------------------------------------------------------------

/// Why a single authentication request failed.
///
/// Each variant maps to exactly one HTTP status and one plain-text body
/// (see [`status`](Self::status) and
/// [`public_message`](Self::public_message)). The `Display` text is the
/// detailed, log-only form.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Claim mode without a platform identity.
    #[error("PID is empty")]
    MissingPid,

    /// Token mode without a UID.
    #[error("UID is empty")]
    MissingUid,

    /// Token mode without a session token.
    #[error("DBToken is empty")]
    MissingToken,

    /// Guest request without a name.
    #[error("name is empty")]
    MissingName,

    /// The claim's timestamp is older than the replay window.
    #[error("bad ts")]
    StaleClaim,

    /// The claim's signature doesn't match its fields.
    #[error("bad signature")]
    BadSignature,

    /// Generic authentication failure.
    #[error("auth failed: {0}")]
    AuthFailed(String),

    /// The request body couldn't be read in time.
    #[error("request timed out")]
    Timeout,

    /// The credential store rejected or failed the operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The request body couldn't be decoded (or the response encoded).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl AuthError {
    /// HTTP status for this failure.
    ///
    /// Authentication-class failures share the login service's dedicated
    /// status; store faults are server errors.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingName => StatusCode::BAD_REQUEST,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Store(e) if !e.is_not_found() => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::from_u16(STATUS_LOGIN_AUTH_ERROR)
                .unwrap_or(StatusCode::UNAUTHORIZED),
        }
    }

    /// Plain-text body sent to the client.
    ///
    /// Unknown UID, unknown token, and bad signature all read `auth fail`
    /// so a caller can't probe which UIDs exist.
    pub fn public_message(&self) -> String {
        match self {
            Self::BadSignature | Self::AuthFailed(_) => AUTH_FAIL.to_string(),
            Self::Store(e) if e.is_not_found() => AUTH_FAIL.to_string(),
            Self::Store(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// Returns `true` for failures that may indicate forged or replayed
    /// credentials.
    pub fn is_suspicious(&self) -> bool {
        match self {
            Self::StaleClaim | Self::BadSignature => true,
            Self::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

/// Errors from registering a service with discovery.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The discovery backend could not be reached.
    #[error("registry request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The discovery backend answered with a non-success status.
    #[error("registry rejected registration ({status}): {body}")]
    Rejected { status: u16, body: String },
}

// ---------------------------------------------------------------------------
// AuthnError: process-level failures
// ---------------------------------------------------------------------------

/// Top-level error for starting and running a service.
///
/// Startup code deals with this single type; the `#[from]` variants let
/// `?` lift each layer's error automatically. Any of these ends the
/// process.
#[derive(Debug, thiserror::Error)]
pub enum AuthnError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Binding a listener or serving connections failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The credential store could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Registration with service discovery failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
