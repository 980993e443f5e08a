//! `LoginServer` / `GuestServer` builders and serve loops.
//!
//! This is the entry point for running either service. The login server
//! ties the layers together: axum transport → protocol codec → auth
//! service → credential store.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use authn_protocol::{JsonCodec, Secret, DEFAULT_REPLAY_WINDOW_MICROS};
use authn_store::{CredentialStore, StoreConfig};
use axum::Router;
use tokio::net::TcpListener;

use crate::backup::BackupEndpoint;
use crate::config::{GuestConfig, LoginConfig, DEFAULT_READ_TIMEOUT};
use crate::guest::GuestService;
use crate::handler::{guest_router, login_router, GuestState, LoginState};
use crate::service::AuthService;
use crate::AuthnError;

// ---------------------------------------------------------------------------
// LoginServer
// ---------------------------------------------------------------------------

/// Builder for configuring and starting the login service.
///
/// # Example
///
/// ```rust,ignore
/// use authn::prelude::*;
///
/// let server = LoginServer::builder()
///     .bind("0.0.0.0:8080")
///     .store_config(StoreConfig::default())
///     .build(Secret::new("shared"))
///     .await?;
/// server.run().await
/// ```
pub struct LoginServerBuilder {
    bind_addr: String,
    store_config: StoreConfig,
    replay_window_micros: i64,
    read_timeout: Duration,
    backup: bool,
}

impl LoginServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            store_config: StoreConfig::default(),
            replay_window_micros: DEFAULT_REPLAY_WINDOW_MICROS,
            read_timeout: DEFAULT_READ_TIMEOUT,
            backup: true,
        }
    }

    /// Builder pre-filled from validated configuration.
    pub fn from_config(config: &LoginConfig) -> Self {
        Self::new()
            .bind(&config.service.service_addr.to_string())
            .store_config(config.store.clone())
            .replay_window_micros(config.replay_window_micros)
            .read_timeout(config.service.read_timeout)
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the credential store configuration.
    pub fn store_config(mut self, config: StoreConfig) -> Self {
        self.store_config = config;
        self
    }

    /// Sets the maximum accepted claim age.
    pub fn replay_window_micros(mut self, window: i64) -> Self {
        self.replay_window_micros = window;
        self
    }

    /// Sets the time allowed for reading a request body.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Enables or disables the loopback backup endpoint (on by default).
    pub fn backup_endpoint(mut self, enabled: bool) -> Self {
        self.backup = enabled;
        self
    }

    /// Opens the store, binds the listener, and starts the backup
    /// endpoint. Any failure here is fatal for the process.
    pub async fn build(self, secret: Secret) -> Result<LoginServer, AuthnError> {
        if secret.is_empty() {
            return Err(AuthnError::Config("secret key is empty".into()));
        }

        let store = Arc::new(CredentialStore::open(self.store_config).await?);
        let listener = TcpListener::bind(&self.bind_addr).await?;
        let backup = if self.backup {
            Some(BackupEndpoint::spawn(Arc::clone(&store)).await?)
        } else {
            None
        };

        let state = Arc::new(LoginState {
            service: AuthService::new(
                Arc::clone(&store),
                secret,
                self.replay_window_micros,
            ),
            codec: JsonCodec,
            read_timeout: self.read_timeout,
        });

        Ok(LoginServer {
            listener,
            router: login_router(state),
            store,
            backup,
        })
    }
}

impl Default for LoginServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound login service.
///
/// Call [`run()`](Self::run) to start serving.
pub struct LoginServer {
    listener: TcpListener,
    router: Router,
    store: Arc<CredentialStore>,
    backup: Option<BackupEndpoint>,
}

impl LoginServer {
    /// Creates a new builder.
    pub fn builder() -> LoginServerBuilder {
        LoginServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The store behind this server.
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// URL of the backup endpoint, if enabled.
    pub fn backup_url(&self) -> Option<&str> {
        self.backup.as_ref().map(BackupEndpoint::url)
    }

    /// Serves until Ctrl-C or SIGTERM.
    pub async fn run(self) -> Result<(), AuthnError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serves until `shutdown` completes, then lets in-flight requests
    /// finish.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), AuthnError> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "login service running");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        drop(self.backup);
        self.store.close().await;
        tracing::info!("login service stopped");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GuestServer
// ---------------------------------------------------------------------------

/// Builder for the guest identity issuer.
pub struct GuestServerBuilder {
    bind_addr: String,
    read_timeout: Duration,
}

impl GuestServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn from_config(config: &GuestConfig) -> Self {
        Self::new()
            .bind(&config.service.service_addr.to_string())
            .read_timeout(config.service.read_timeout)
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub async fn build(self, secret: Secret) -> Result<GuestServer, AuthnError> {
        if secret.is_empty() {
            return Err(AuthnError::Config("secret key is empty".into()));
        }
        let listener = TcpListener::bind(&self.bind_addr).await?;
        let state = Arc::new(GuestState {
            guest: GuestService::new(secret),
            codec: JsonCodec,
            read_timeout: self.read_timeout,
        });
        Ok(GuestServer {
            listener,
            router: guest_router(state),
        })
    }
}

impl Default for GuestServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound guest service.
pub struct GuestServer {
    listener: TcpListener,
    router: Router,
}

impl GuestServer {
    pub fn builder() -> GuestServerBuilder {
        GuestServerBuilder::new()
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> Result<(), AuthnError> {
        self.run_until(shutdown_signal()).await
    }

    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), AuthnError> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "guest service running");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("guest service stopped");
        Ok(())
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown requested");
}
