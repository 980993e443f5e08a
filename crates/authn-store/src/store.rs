//! The credential store: platform identities, UIDs, and session tokens.
//!
//! This is the central piece of the store layer. It is responsible for:
//! - Mapping (platform, external ID) pairs to internal UIDs, creating the
//!   UID on first sight
//! - Minting session tokens on platform login and retiring old ones
//! - Validating tokens on session resume
//!
//! # Layout
//!
//! One SQLite file with three tables:
//!
//! ```text
//! identities      (platform, external_id) → uid        written once
//! sessions        uid → profile, last_login_at
//! session_tokens  (uid, token) → issued_at             newest K per uid
//! ```
//!
//! Callers never see this layout. Every public operation is one SQLite
//! transaction (or one statement), so a UID is never visible without its
//! session row and a new token is never visible before retention trimmed
//! the old ones. Each operation touches only the rows of one identity.
//!
//! # Concurrency
//!
//! `CredentialStore` is `Send + Sync` and meant to be shared behind an
//! `Arc`. It owns a single connection that holds an exclusive lock on the
//! file for as long as the store is open, so operations run one at a time
//! and no other process or store instance can open the same file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use authn_protocol::Uid;
use chrono::Utc;
use rand::Rng;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqliteLockingMode,
    SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::record::{format_timestamp, parse_timestamp};
use crate::retention::{next_issue_time, trim_to_newest};
use crate::{Resolved, SessionRecord, SessionToken, StoreConfig, StoreError};

/// Bumped whenever [`SCHEMA`] changes shape.
const SCHEMA_VERSION: i64 = 1;

/// How long `open` waits for another holder of the file lock to let go.
const LOCK_WAIT: Duration = Duration::from_secs(1);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS identities (
    platform    TEXT NOT NULL,
    external_id TEXT NOT NULL,
    uid         TEXT NOT NULL,
    PRIMARY KEY (platform, external_id)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS sessions (
    uid           TEXT PRIMARY KEY,
    profile       TEXT NOT NULL DEFAULT '',
    last_login_at TEXT
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS session_tokens (
    uid       TEXT NOT NULL REFERENCES sessions (uid),
    token     TEXT NOT NULL,
    issued_at TEXT NOT NULL,
    PRIMARY KEY (uid, token)
) WITHOUT ROWID;
";

/// Transactional mapping from platform identities to UIDs and their
/// session state.
///
/// ## Lifecycle of one UID
///
/// ```text
/// resolve_or_create_by_platform() ──→ [UID + binding + record + token 1]
///            │
///            ▼ (every further platform login)
///     mint token N, retire all but the newest K
///
/// validate_and_touch(uid, token) ──→ lastLoginAt updated, tokens untouched
/// ```
pub struct CredentialStore {
    pool: SqlitePool,
    config: StoreConfig,
}

impl CredentialStore {
    /// Opens (or creates) the store, takes the file lock, and makes sure
    /// the schema exists.
    ///
    /// # Errors
    /// - [`StoreError::InvalidConfig`] if `retention` is 0
    /// - [`StoreError::Locked`] if another store holds the file
    /// - [`StoreError::Database`] if the file can't be opened as a store
    pub async fn open(config: StoreConfig) -> Result<Self, StoreError> {
        if config.retention == 0 {
            return Err(StoreError::InvalidConfig(
                "token retention must be at least 1".into(),
            ));
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Truncate)
            .locking_mode(SqliteLockingMode::Exclusive)
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true)
            .busy_timeout(LOCK_WAIT);

        // One connection for the life of the store: it owns the exclusive
        // lock, so it must never be recycled.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| locked_or(e, &config.path))?;

        if let Err(e) = init_schema(&pool).await {
            pool.close().await;
            return Err(locked_or(e, &config.path));
        }

        tracing::info!(
            path = %config.path.display(),
            retention = config.retention,
            "credential store ready"
        );
        Ok(Self { pool, config })
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Closes the connection and releases the file lock.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Platform login: finds or creates the UID bound to
    /// (`platform`, `external_id`), mints a new session token, and keeps
    /// only the newest `retention` tokens.
    ///
    /// `new_profile`, when given, replaces the stored profile (a new UID
    /// starts with an empty one).
    ///
    /// Returns the UID, the surviving tokens oldest first (the last is the
    /// one just minted), and the current profile.
    ///
    /// # Errors
    /// - [`StoreError::UidNotFound`] if a binding points at a UID without
    ///   a session record
    /// - [`StoreError::Corrupt`] / [`StoreError::Database`] on storage
    ///   failures
    ///
    /// On error nothing is written.
    pub async fn resolve_or_create_by_platform(
        &self,
        platform: &str,
        external_id: &str,
        new_profile: Option<&str>,
    ) -> Result<Resolved, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Insert-or-keep and the read-back share this transaction, so two
        // first logins for one pair can't both create a UID.
        let candidate = self.mint_uid();
        let created = sqlx::query(
            "INSERT INTO identities (platform, external_id, uid) VALUES (?, ?, ?)
             ON CONFLICT (platform, external_id) DO NOTHING",
        )
        .bind(platform)
        .bind(external_id)
        .bind(candidate.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        let uid = if created {
            sqlx::query("INSERT INTO sessions (uid, profile) VALUES (?, '')")
                .bind(candidate.as_str())
                .execute(&mut *tx)
                .await?;
            candidate
        } else {
            let bound: String = sqlx::query_scalar(
                "SELECT uid FROM identities WHERE platform = ? AND external_id = ?",
            )
            .bind(platform)
            .bind(external_id)
            .fetch_one(&mut *tx)
            .await?;
            Uid::new(bound)
        };

        let profile: Option<String> = sqlx::query_scalar(
            "UPDATE sessions SET profile = COALESCE(?, profile), last_login_at = ?
             WHERE uid = ? RETURNING profile",
        )
        .bind(new_profile)
        .bind(format_timestamp(now))
        .bind(uid.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let profile = profile.ok_or_else(|| StoreError::UidNotFound(uid.clone()))?;

        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT token, issued_at FROM session_tokens WHERE uid = ?",
        )
        .bind(uid.as_str())
        .fetch_all(&mut *tx)
        .await?;
        let mut issued = parse_tokens(rows)?;

        let issued_at = next_issue_time(&issued, now);
        let token = loop {
            let token = generate_token();
            let inserted = sqlx::query(
                "INSERT INTO session_tokens (uid, token, issued_at) VALUES (?, ?, ?)
                 ON CONFLICT (uid, token) DO NOTHING",
            )
            .bind(uid.as_str())
            .bind(token.as_str())
            .bind(format_timestamp(issued_at))
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if inserted == 1 {
                break token;
            }
        };
        issued.push(SessionToken { token, issued_at });

        let (kept, retired) = trim_to_newest(issued, self.config.retention);
        for old in &retired {
            sqlx::query("DELETE FROM session_tokens WHERE uid = ? AND token = ?")
                .bind(uid.as_str())
                .bind(old.token.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        if created {
            tracing::info!(%uid, platform, "uid created");
        }
        tracing::debug!(
            %uid,
            platform,
            kept = kept.len(),
            retired = retired.len(),
            "session token issued"
        );

        Ok(Resolved {
            uid,
            kept_tokens: kept.into_iter().map(|t| t.token).collect(),
            profile,
        })
    }

    /// Session resume: checks that `token` is currently valid for `uid`,
    /// records the login time, and returns the profile.
    ///
    /// Never mints or deletes tokens, so it can be repeated any number of
    /// times with the same pair.
    ///
    /// # Errors
    /// - [`StoreError::UidNotFound`]: no record for `uid`
    /// - [`StoreError::TokenNotFound`]: `token` isn't a current token
    pub async fn validate_and_touch(
        &self,
        uid: &Uid,
        token: &str,
    ) -> Result<String, StoreError> {
        let now = Utc::now();

        let profile: Option<String> = sqlx::query_scalar(
            "UPDATE sessions SET last_login_at = ?
             WHERE uid = ? AND EXISTS (
                 SELECT 1 FROM session_tokens WHERE uid = ? AND token = ?
             )
             RETURNING profile",
        )
        .bind(format_timestamp(now))
        .bind(uid.as_str())
        .bind(uid.as_str())
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(profile) = profile {
            return Ok(profile);
        }

        let known: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM sessions WHERE uid = ?")
                .bind(uid.as_str())
                .fetch_optional(&self.pool)
                .await?;
        match known {
            Some(_) => Err(StoreError::TokenNotFound),
            None => Err(StoreError::UidNotFound(uid.clone())),
        }
    }

    /// Reads the session record of `uid`.
    pub async fn session(
        &self,
        uid: &Uid,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, Option<String>)> = sqlx::query_as(
            "SELECT profile, last_login_at FROM sessions WHERE uid = ?",
        )
        .bind(uid.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some((profile, last_login_at)) = row else {
            return Ok(None);
        };

        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT token, issued_at FROM session_tokens WHERE uid = ?",
        )
        .bind(uid.as_str())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let (tokens, _) = trim_to_newest(parse_tokens(rows)?, usize::MAX);

        Ok(Some(SessionRecord {
            uid: uid.clone(),
            profile,
            last_login_at: last_login_at.as_deref().map(parse_timestamp).transpose()?,
            tokens,
        }))
    }

    /// Returns the UID bound to (`platform`, `external_id`), if any.
    pub async fn uid_for(
        &self,
        platform: &str,
        external_id: &str,
    ) -> Result<Option<Uid>, StoreError> {
        let uid: Option<String> = sqlx::query_scalar(
            "SELECT uid FROM identities WHERE platform = ? AND external_id = ?",
        )
        .bind(platform)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(uid.map(Uid::new))
    }

    /// Number of identities bound through `platform`.
    pub async fn binding_count(&self, platform: &str) -> Result<usize, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM identities WHERE platform = ?")
                .bind(platform)
                .fetch_one(&self.pool)
                .await?;
        usize::try_from(count)
            .map_err(|_| StoreError::Corrupt(format!("negative count {count}")))
    }

    /// Consistent point-in-time image of the whole store, as a standalone
    /// database file that [`open`](Self::open) accepts.
    pub async fn snapshot_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let mut name = self.config.path.as_os_str().to_owned();
        name.push(format!(".snapshot-{}", Uuid::now_v7()));
        let target = PathBuf::from(name);

        let result = self.snapshot_into(&target).await;
        if let Err(e) = tokio::fs::remove_file(&target).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %e, path = %target.display(), "snapshot not removed");
            }
        }
        result
    }

    async fn snapshot_into(&self, target: &Path) -> Result<Vec<u8>, StoreError> {
        let target_str = target.to_str().ok_or_else(|| {
            StoreError::InvalidConfig(format!("non-utf8 path {}", target.display()))
        })?;
        sqlx::query("VACUUM INTO ?")
            .bind(target_str)
            .execute(&self.pool)
            .await?;
        Ok(tokio::fs::read(target).await?)
    }

    /// Builds `<prefix><uuid v7>`. UUIDv7 strings sort by creation time.
    fn mint_uid(&self) -> Uid {
        Uid::new(format!("{}{}", self.config.uid_prefix, Uuid::now_v7()))
    }
}

/// Creates the tables in one transaction. The version write makes sure the
/// exclusive lock is held from here on, even when the tables already
/// existed.
async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::raw_sql(SCHEMA).execute(&mut *tx).await?;
    sqlx::raw_sql(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
        .execute(&mut *tx)
        .await?;
    tx.commit().await
}

/// Maps "database is locked" while opening to [`StoreError::Locked`].
fn locked_or(error: sqlx::Error, path: &Path) -> StoreError {
    let busy = error
        .as_database_error()
        .and_then(|e| e.code())
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| code & 0xff == 5 || code & 0xff == 6);
    if busy {
        StoreError::Locked(path.to_path_buf())
    } else {
        error.into()
    }
}

/// Parses `(token, issued_at)` rows.
fn parse_tokens(rows: Vec<(String, String)>) -> Result<Vec<SessionToken>, StoreError> {
    rows.into_iter()
        .map(|(token, issued_at)| {
            Ok(SessionToken {
                token,
                issued_at: parse_timestamp(&issued_at)?,
            })
        })
        .collect()
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
