//! Error types for the store layer.

use std::path::PathBuf;

use authn_protocol::Uid;

/// Errors that can occur while reading or mutating the credential store.
///
/// The variants fall into three groups, and callers treat them
/// differently:
///
/// - **not found** ([`UidNotFound`](Self::UidNotFound),
///   [`TokenNotFound`](Self::TokenNotFound)): the caller presented
///   credentials the store doesn't know. An authentication failure, not a
///   server fault.
/// - **startup** ([`Locked`](Self::Locked),
///   [`InvalidConfig`](Self::InvalidConfig)): the store can't be opened
///   as configured.
/// - **storage** (everything else): the database or the file system let
///   us down.
///
/// Any error returned from inside a transaction rolls the whole
/// transaction back.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The connection is gone (closed or timed out), or a table created
    /// at open time is missing.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Another store already holds the database file.
    #[error("store file {} is locked by another process", .0.display())]
    Locked(PathBuf),

    /// No session record exists for this UID.
    #[error("uid {0} not found")]
    UidNotFound(Uid),

    /// The UID exists but the presented session token isn't one of its
    /// current tokens (never issued, or already retired by retention).
    #[error("session token not found")]
    TokenNotFound,

    /// Stored data doesn't parse.
    #[error("corrupt store data: {0}")]
    Corrupt(String),

    /// The store configuration is unusable.
    #[error("invalid store config: {0}")]
    InvalidConfig(String),

    /// A database statement failed.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Reading or removing a snapshot file failed.
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` for errors caused by unknown credentials rather than
    /// by the store itself.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UidNotFound(_) | Self::TokenNotFound)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
                Self::Unavailable(e.to_string())
            }
            sqlx::Error::Database(ref db) if db.message().starts_with("no such table") => {
                Self::Unavailable(db.message().to_string())
            }
            other => Self::Database(other),
        }
    }
}
