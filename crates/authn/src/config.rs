//! Command-line and environment configuration.
//!
//! Flags are parsed with clap and then validated once into immutable
//! [`LoginConfig`] / [`GuestConfig`] values; nothing reads flags after
//! startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use authn_protocol::{Secret, DEFAULT_REPLAY_WINDOW_MICROS};
use authn_store::{StoreConfig, DEFAULT_TOKEN_RETENTION, DEFAULT_UID_PREFIX};
use clap::{Args, Parser};

use crate::AuthnError;

/// Default time allowed for reading a request.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Flags shared by both services.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Address to listen on and advertise, as `ip:port`.
    #[arg(long, env = "AUTHN_SERVICE_ADDR", default_value = "127.0.0.1:8080")]
    pub service_addr: String,

    /// Secret shared with identity issuers and downstream services.
    #[arg(long, env = "AUTHN_SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// etcd v3 gateway to register with. Registration is skipped if unset.
    #[arg(long, env = "AUTHN_ETCD_ENDPOINT")]
    pub etcd_endpoint: Option<String>,

    /// Seconds allowed for reading a request.
    #[arg(long, env = "AUTHN_READ_TIMEOUT_SECS", default_value_t = 10)]
    pub read_timeout_secs: u64,
}

/// Flags of `authn-login`.
#[derive(Debug, Clone, Parser)]
#[command(name = "authn-login", version, about = "Player login service")]
pub struct LoginArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Prefix of every minted UID.
    #[arg(long, env = "AUTHN_UID_PREFIX", default_value = DEFAULT_UID_PREFIX)]
    pub uid_prefix: String,

    /// Path of the credential database file.
    #[arg(long, env = "AUTHN_DB_FILE", default_value = "login.db")]
    pub db_file: PathBuf,

    /// Number of newest session tokens kept per UID.
    #[arg(long, env = "AUTHN_TOKEN_RETENTION", default_value_t = DEFAULT_TOKEN_RETENTION)]
    pub token_retention: usize,

    /// Maximum claim age in microseconds.
    #[arg(long, env = "AUTHN_REPLAY_WINDOW_MICROS", default_value_t = DEFAULT_REPLAY_WINDOW_MICROS)]
    pub replay_window_micros: i64,
}

/// Flags of `authn-guest`.
#[derive(Debug, Clone, Parser)]
#[command(name = "authn-guest", version, about = "Guest identity issuer")]
pub struct GuestArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Validated settings shared by both services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service_addr: SocketAddr,
    pub secret: Secret,
    pub etcd_endpoint: Option<String>,
    pub read_timeout: Duration,
}

impl ServiceConfig {
    /// The address announced to discovery.
    pub fn advertised_address(&self) -> String {
        format!("http://{}", self.service_addr)
    }
}

/// Validated login service settings.
#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub service: ServiceConfig,
    pub store: StoreConfig,
    pub replay_window_micros: i64,
}

/// Validated guest service settings.
#[derive(Debug, Clone)]
pub struct GuestConfig {
    pub service: ServiceConfig,
}

impl CommonArgs {
    fn validate(self) -> Result<ServiceConfig, AuthnError> {
        let service_addr: SocketAddr = self.service_addr.parse().map_err(|_| {
            AuthnError::Config(format!("bad service address {:?}", self.service_addr))
        })?;
        if service_addr.port() == 0 {
            return Err(AuthnError::Config("service address needs a port".into()));
        }
        if self.secret_key.is_empty() {
            return Err(AuthnError::Config("secret key is empty".into()));
        }
        if self.read_timeout_secs == 0 {
            return Err(AuthnError::Config("read timeout must be positive".into()));
        }

        Ok(ServiceConfig {
            service_addr,
            secret: Secret::new(self.secret_key),
            etcd_endpoint: self.etcd_endpoint.filter(|e| !e.is_empty()),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
        })
    }
}

impl LoginArgs {
    pub fn into_config(self) -> Result<LoginConfig, AuthnError> {
        if self.token_retention == 0 {
            return Err(AuthnError::Config("token retention must be at least 1".into()));
        }
        if self.replay_window_micros <= 0 {
            return Err(AuthnError::Config("replay window must be positive".into()));
        }

        Ok(LoginConfig {
            service: self.common.validate()?,
            store: StoreConfig {
                path: self.db_file,
                uid_prefix: self.uid_prefix,
                retention: self.token_retention,
            },
            replay_window_micros: self.replay_window_micros,
        })
    }
}

impl GuestArgs {
    pub fn into_config(self) -> Result<GuestConfig, AuthnError> {
        Ok(GuestConfig {
            service: self.common.validate()?,
        })
    }
}
