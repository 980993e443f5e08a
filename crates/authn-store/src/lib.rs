//! Credential store for authn.
//!
//! This crate owns everything the login service persists:
//!
//! 1. **Identity bindings**: which internal [`Uid`](authn_protocol::Uid)
//!    a (platform, external ID) pair maps to. Created once, never changed.
//! 2. **Session records**: per-UID profile blob, last login time, and the
//!    currently valid session tokens.
//! 3. **Token retention**: each platform login mints a token and keeps
//!    only the newest K ([`trim_to_newest`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Login service (above)  ← verifies claims, signs responses
//!     ↕
//! Store layer (this crate)  ← CredentialStore over SQLite (sqlx)
//!     ↕
//! Protocol layer (below)  ← provides Uid
//! ```

mod error;
mod record;
mod retention;
mod store;

pub use error::StoreError;
pub use record::{
    Resolved, SessionRecord, SessionToken, StoreConfig,
    DEFAULT_TOKEN_RETENTION, DEFAULT_UID_PREFIX,
};
pub use retention::{next_issue_time, trim_to_newest};
pub use store::CredentialStore;
