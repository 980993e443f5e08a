//! Keyed digests that bind claims, responses, and session tokens to the
//! shared secret.
//!
//! Every signature in the system comes from one primitive,
//! [`keyed_digest`]: HMAC-SHA256 keyed with the secret over the in-order
//! concatenation of a list of fields, rendered as lowercase hex. The three
//! schemes differ only in which fields they pass:
//!
//! | Scheme | Fields |
//! |---|---|
//! | claim | `ts`, `pid`, `platform`, `info`? |
//! | response | `ts`, `uid`, `dbToken`, `info` |
//! | keep | `dbToken` |
//!
//! Fields are concatenated without separators. That is the format issuers
//! and downstream services already produce, so it cannot change here.
//!
//! Replay protection is time-window only: a claim is accepted while
//! `ts + window >= now`. There is no nonce store, so a claim can be
//! replayed inside its window.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::PlatformClaim;

type HmacSha256 = Hmac<Sha256>;

/// How long a claim stays acceptable after its `ts`: 10 seconds.
pub const DEFAULT_REPLAY_WINDOW_MICROS: i64 = 10_000_000;

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// The process-wide signing secret.
///
/// Loaded once at startup and never mutated. `Debug` is implemented by hand
/// so the key never ends up in a log line.
#[derive(Clone)]
pub struct Secret(Vec<u8>);

impl Secret {
    /// Wraps raw key material.
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self(key.into())
    }

    /// Returns the key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` if the key is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

// ---------------------------------------------------------------------------
// Digests
// ---------------------------------------------------------------------------

/// Computes the keyed digest of `fields` under `secret`.
pub fn keyed_digest(fields: &[&str], secret: &Secret) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    for field in fields {
        mac.update(field.as_bytes());
    }
    hex::encode(mac.finalize().into_bytes())
}

/// Signature an identity issuer puts on a platform claim.
///
/// `profile` takes part only when present, so `None` and `Some("")` sign
/// identically; the login service still treats them differently when it
/// stores the profile.
pub fn claim_signature(
    ts_micros: i64,
    external_id: &str,
    platform: &str,
    profile: Option<&str>,
    secret: &Secret,
) -> String {
    let ts = ts_micros.to_string();
    match profile {
        Some(profile) => keyed_digest(
            &[&ts, external_id, platform, profile],
            secret,
        ),
        None => keyed_digest(&[&ts, external_id, platform], secret),
    }
}

/// Signature the login service puts on its own response.
pub fn response_signature(
    ts_micros: i64,
    uid: &str,
    session_token: &str,
    profile: &str,
    secret: &Secret,
) -> String {
    let ts = ts_micros.to_string();
    keyed_digest(&[&ts, uid, session_token, profile], secret)
}

/// Digest a downstream service keeps to recognize `session_token` later
/// without asking the credential store.
pub fn keep_digest(session_token: &str, secret: &Secret) -> String {
    keyed_digest(&[session_token], secret)
}

/// Compares two digests in constant time.
///
/// Digests of different lengths never match.
pub fn verify_digest(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// Builds a signed claim. Used by the guest service and any other issuer
/// that shares the secret.
pub fn sign_claim(
    platform: impl Into<String>,
    pid: impl Into<String>,
    info: Option<String>,
    ts_micros: i64,
    secret: &Secret,
) -> PlatformClaim {
    let platform = platform.into();
    let pid = pid.into();
    let token =
        claim_signature(ts_micros, &pid, &platform, info.as_deref(), secret);
    PlatformClaim {
        platform,
        pid,
        info,
        ts: ts_micros,
        token,
    }
}

/// Returns `true` if `presented` is the claim signature for these fields.
pub fn verify_claim(
    ts_micros: i64,
    external_id: &str,
    platform: &str,
    profile: Option<&str>,
    presented: &str,
    secret: &Secret,
) -> bool {
    let expected =
        claim_signature(ts_micros, external_id, platform, profile, secret);
    verify_digest(&expected, presented)
}

/// A claim is fresh iff `claim_ts + window >= now`.
///
/// Timestamps from the future are accepted; only age is bounded.
pub fn check_freshness(
    claim_ts_micros: i64,
    now_micros: i64,
    window_micros: i64,
) -> bool {
    claim_ts_micros.saturating_add(window_micros) >= now_micros
}

/// Current wall-clock time in microseconds since the Unix epoch.
pub fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}
