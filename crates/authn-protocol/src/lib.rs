//! Wire protocol for authn.
//!
//! This crate defines the "language" that clients, identity issuers, the
//! login service, and downstream game services share:
//!
//! - **Types** ([`LoginRequest`], [`LoginResponse`], [`PlatformClaim`],
//!   [`Uid`]): the documents that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those documents are
//!   converted to/from bytes.
//! - **Signing** ([`keyed_digest`] and the claim/response/keep schemes
//!   built on it): how documents are bound to the shared secret.
//! - **Errors** ([`ProtocolError`]).
//!
//! Signing lives here rather than in the login service so that issuers and
//! downstream verifiers link the exact same code.

mod codec;
mod error;
mod signing;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use signing::{
    check_freshness, claim_signature, keep_digest, keyed_digest, now_micros,
    response_signature, sign_claim, verify_claim, verify_digest, Secret,
    DEFAULT_REPLAY_WINDOW_MICROS,
};
pub use types::{GuestRequest, LoginRequest, LoginResponse, PlatformClaim, Uid};
