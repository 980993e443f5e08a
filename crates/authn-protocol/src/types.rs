//! Core protocol types for the login wire format.
//!
//! Every type here travels "on the wire": clients send a [`LoginRequest`]
//! to the login service and get a [`LoginResponse`] back, and identity
//! issuers (the guest service, or a platform bridge) hand clients a
//! [`PlatformClaim`] to present.
//!
//! Field names follow the JSON contract exactly (`pid`, `info`, `ts`,
//! `dbToken`, ...). Rust-side names are snake_case and mapped with
//! `#[serde(rename = "...")]` where they differ.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// An internal player identity (UID).
///
/// A newtype over `String` so that a UID can't be confused with a platform
/// ID or a session token, which are also plain strings on the wire.
/// `#[serde(transparent)]` keeps the JSON form a bare string.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    /// Wraps an existing UID string.
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Returns the UID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// PlatformClaim: what an identity issuer hands to a client
// ---------------------------------------------------------------------------

/// A signed assertion that a user is `pid` on `platform`.
///
/// Produced by an identity issuer that shares the signing secret with the
/// login service. The client forwards it unchanged as the claim-mode body
/// of a [`LoginRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformClaim {
    /// Name of the identity platform (`"guest"`, `"steam"`, ...).
    pub platform: String,

    /// The user's identity on that platform.
    pub pid: String,

    /// Optional profile blob. When present it is part of the signature
    /// and replaces the stored profile on login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,

    /// Issue time in microseconds since the Unix epoch.
    pub ts: i64,

    /// Keyed digest over (ts, pid, platform, info).
    pub token: String,
}

// ---------------------------------------------------------------------------
// LoginRequest
// ---------------------------------------------------------------------------

/// Body of `POST /auth` on the login service.
///
/// One struct carries both authentication modes because the wire contract
/// does: a non-empty `platform` selects claim mode, otherwise the request
/// is a session resume keyed by `uid` + `dbToken`. Every field defaults, so
/// a resume body (`{"uid":..,"dbToken":..}`) decodes without the claim
/// fields and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Platform name; empty in token mode.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub platform: String,

    /// Platform identity (claim mode).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pid: String,

    /// Optional profile blob (claim mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,

    /// Claim issue time in microseconds (claim mode).
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ts: i64,

    /// Claim signature (claim mode).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,

    /// Internal identity (token mode).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,

    /// Session token previously issued by the login service (token mode).
    #[serde(
        default,
        rename = "dbToken",
        skip_serializing_if = "String::is_empty"
    )]
    pub db_token: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl LoginRequest {
    /// Builds a token-mode (session resume) request.
    pub fn resume(uid: impl Into<String>, db_token: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            db_token: db_token.into(),
            ..Self::default()
        }
    }

    /// Returns `true` if this request authenticates with a platform claim.
    pub fn is_claim(&self) -> bool {
        !self.platform.is_empty()
    }
}

impl From<PlatformClaim> for LoginRequest {
    fn from(claim: PlatformClaim) -> Self {
        Self {
            platform: claim.platform,
            pid: claim.pid,
            info: claim.info,
            ts: claim.ts,
            token: claim.token,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// LoginResponse
// ---------------------------------------------------------------------------

/// Successful response of `POST /auth` on the login service.
///
/// `token` is the service's own signature over (ts, uid, dbToken, info), so
/// a game server receiving this document from the client can check it came
/// from the login service. `keeps` lists the keep digests of every session
/// token still valid for this UID, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub uid: Uid,
    #[serde(rename = "dbToken")]
    pub db_token: String,
    pub keeps: Vec<String>,
    pub info: String,
    pub ts: i64,
    pub token: String,
}

// ---------------------------------------------------------------------------
// GuestRequest
// ---------------------------------------------------------------------------

/// Body of `POST /auth` on the guest service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestRequest {
    /// Display name the guest wants; becomes the claim's `pid`.
    #[serde(default, alias = "Name")]
    pub name: String,
}
