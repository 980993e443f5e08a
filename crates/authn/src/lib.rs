//! # authn
//!
//! Player login service for game backends.
//!
//! Identity platforms (and the bundled guest issuer) hand clients signed
//! claims; the login service verifies a claim, maps it to a stable internal
//! UID, and answers with a signed session document that downstream game
//! services verify with the same shared secret. Returning clients resume
//! with `uid` + `dbToken` instead of a fresh claim.
//!
//! ```text
//!   client ──claim──→ POST /auth (login) ──→ AuthService ──→ CredentialStore
//!      ↑                      │
//!      └──── LoginResponse ───┘   {uid, dbToken, keeps, info, ts, token}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use authn::prelude::*;
//!
//! # async fn start() -> Result<(), AuthnError> {
//! let server = LoginServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .store_config(StoreConfig::default())
//!     .build(Secret::new("shared-secret"))
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod backup;
pub mod config;
mod error;
pub mod guest;
mod handler;
pub mod registry;
pub mod server;
pub mod service;

pub use error::{AuthError, AuthnError, RegistryError, STATUS_LOGIN_AUTH_ERROR};

/// Initializes the `tracing` fmt subscriber, honoring `RUST_LOG` and
/// defaulting to `info`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Common imports for running and talking to the services.
pub mod prelude {
    pub use crate::config::{GuestArgs, GuestConfig, LoginArgs, LoginConfig};
    pub use crate::guest::GuestService;
    pub use crate::registry::{register_service, EtcdRegistry, NoopRegistry, ServiceRegistry};
    pub use crate::server::{GuestServer, LoginServer};
    pub use crate::service::AuthService;
    pub use crate::{AuthError, AuthnError};

    pub use authn_protocol::{
        sign_claim, Codec, JsonCodec, LoginRequest, LoginResponse, PlatformClaim,
        Secret, Uid,
    };
    pub use authn_store::{CredentialStore, StoreConfig};
}
