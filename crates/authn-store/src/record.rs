//! Record types: the data the credential store hands back to callers.
//!
//! A player's stored state consists of:
//! - WHO they are internally ([`Uid`])
//! - WHAT profile blob they last supplied
//! - WHEN they last authenticated
//! - WHICH session tokens are currently valid, oldest first

use std::path::PathBuf;

use authn_protocol::Uid;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::StoreError;

/// Default number of session tokens kept per UID.
pub const DEFAULT_TOKEN_RETENTION: usize = 2;

/// Default prefix of generated UIDs.
pub const DEFAULT_UID_PREFIX: &str = "player:";

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Configuration for the credential store.
///
/// All values are fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// File backing the store.
    pub path: PathBuf,

    /// Prefix prepended to every newly minted UID.
    pub uid_prefix: String,

    /// How many session tokens a UID keeps after each platform login
    /// (the newest ones). Must be at least 1.
    pub retention: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("login.db"),
            uid_prefix: DEFAULT_UID_PREFIX.to_string(),
            retention: DEFAULT_TOKEN_RETENTION,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionToken
// ---------------------------------------------------------------------------

/// An issued session token and the moment it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// SessionRecord
// ---------------------------------------------------------------------------

/// Everything the store knows about one UID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub uid: Uid,

    /// Opaque profile blob; last writer wins.
    pub profile: String,

    /// Time of the most recent successful authentication.
    pub last_login_at: Option<DateTime<Utc>>,

    /// Currently valid tokens in issuance order (oldest first).
    pub tokens: Vec<SessionToken>,
}

// ---------------------------------------------------------------------------
// Resolved
// ---------------------------------------------------------------------------

/// Result of a platform login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub uid: Uid,

    /// Tokens surviving retention, oldest first. The last one was minted
    /// by this login.
    pub kept_tokens: Vec<String>,

    pub profile: String,
}

impl Resolved {
    /// The token minted by this login.
    pub fn newest_token(&self) -> Option<&str> {
        self.kept_tokens.last().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Timestamp encoding
// ---------------------------------------------------------------------------

/// Encodes a timestamp the way it is persisted: RFC 3339, microseconds,
/// numeric offset.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Decodes a persisted timestamp.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_timestamp_keeps_microseconds() {
        let at = Utc.timestamp_micros(1_700_000_000_123_456).unwrap();

        let raw = format_timestamp(at);

        assert_eq!(raw, "2023-11-14T22:13:20.123456+00:00");
        assert_eq!(parse_timestamp(&raw).unwrap(), at);
    }

    #[test]
    fn test_parse_timestamp_accepts_other_offsets() {
        let parsed = parse_timestamp("2024-01-01T08:00:00.000+08:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_garbage_returns_corrupt() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.uid_prefix, "player:");
        assert_eq!(config.retention, 2);
    }

    #[test]
    fn test_resolved_newest_token_is_last() {
        let resolved = Resolved {
            uid: Uid::new("player:1"),
            kept_tokens: vec!["old".into(), "new".into()],
            profile: String::new(),
        };
        assert_eq!(resolved.newest_token(), Some("new"));
    }
}
