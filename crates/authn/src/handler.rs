//! HTTP adapter: turns `POST /auth` requests into service calls.
//!
//! Bodies are read as raw bytes under the read timeout and decoded with
//! the shared [`Codec`], so a malformed body is reported with the same
//! status and plain-text style as every other authentication failure.
//!
//! ```text
//! POST /auth ─→ read body (timeout) ─→ codec.decode ─→ service ─→ codec.encode ─→ 200
//!                      │                    │             │
//!                      └────────────────────┴─────────────┴─→ AuthError ─→ status + text
//! ```

use std::sync::Arc;
use std::time::Duration;

use authn_protocol::{Codec, GuestRequest, JsonCodec, LoginRequest};
use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;

use crate::guest::GuestService;
use crate::service::AuthService;
use crate::AuthError;

/// Largest request body accepted.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state of the login router.
pub(crate) struct LoginState<C: Codec> {
    pub(crate) service: AuthService,
    pub(crate) codec: C,
    pub(crate) read_timeout: Duration,
}

/// Shared state of the guest router.
pub(crate) struct GuestState<C: Codec> {
    pub(crate) guest: GuestService,
    pub(crate) codec: C,
    pub(crate) read_timeout: Duration,
}

pub(crate) fn login_router(state: Arc<LoginState<JsonCodec>>) -> Router {
    Router::new()
        .route("/auth", post(login::<JsonCodec>))
        .with_state(state)
}

pub(crate) fn guest_router(state: Arc<GuestState<JsonCodec>>) -> Router {
    Router::new()
        .route("/auth", post(guest::<JsonCodec>))
        .with_state(state)
}

async fn login<C: Codec>(
    State(state): State<Arc<LoginState<C>>>,
    request: Request,
) -> Response {
    let result = async {
        let body = read_body(request.into_body(), state.read_timeout).await?;
        let login: LoginRequest = state.codec.decode(&body)?;
        let response = state.service.authenticate(login).await?;
        Ok::<_, AuthError>(state.codec.encode(&response)?)
    }
    .await;

    respond(result)
}

async fn guest<C: Codec>(
    State(state): State<Arc<GuestState<C>>>,
    request: Request,
) -> Response {
    let result = async {
        let body = read_body(request.into_body(), state.read_timeout).await?;
        let guest: GuestRequest = state.codec.decode(&body)?;
        let claim = state.guest.issue(&guest.name)?;
        Ok::<_, AuthError>(state.codec.encode(&claim)?)
    }
    .await;

    // The guest service has no dedicated auth status; bad input is a 400.
    match result {
        Err(e @ AuthError::Protocol(_)) => {
            tracing::debug!(error = %e, "undecodable guest request");
            (StatusCode::BAD_REQUEST, e.public_message()).into_response()
        }
        other => respond(other),
    }
}

/// Reads the whole body, giving up after `timeout`.
async fn read_body(body: Body, timeout: Duration) -> Result<Bytes, AuthError> {
    match tokio::time::timeout(timeout, to_bytes(body, MAX_BODY_BYTES)).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(AuthError::AuthFailed(format!("unreadable body: {e}"))),
        Err(_) => Err(AuthError::Timeout),
    }
}

fn respond(result: Result<Vec<u8>, AuthError>) -> Response {
    match result {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            if e.status() == StatusCode::INTERNAL_SERVER_ERROR {
                tracing::error!(error = %e, "request failed");
            }
            (e.status(), e.public_message()).into_response()
        }
    }
}
