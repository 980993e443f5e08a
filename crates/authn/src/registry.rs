//! Service discovery registration.
//!
//! Each binary announces `http://<service-addr>` under its role (`login`
//! or `guest`) once at startup. With no discovery endpoint configured the
//! announcement only goes to the log.

use std::future::Future;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::RegistryError;

/// Announces a service address to discovery.
///
/// Uses `impl Future` in the trait definition (stable since Rust 1.75)
/// so implementors can simply write `async fn register(...)`.
pub trait ServiceRegistry: Send + Sync + 'static {
    /// Registers `address` under `role`.
    fn register(
        &self,
        address: &str,
        role: &str,
    ) -> impl Future<Output = Result<(), RegistryError>> + Send;
}

// ---------------------------------------------------------------------------
// NoopRegistry
// ---------------------------------------------------------------------------

/// Registry used when no discovery endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRegistry;

impl ServiceRegistry for NoopRegistry {
    async fn register(
        &self,
        address: &str,
        role: &str,
    ) -> Result<(), RegistryError> {
        tracing::info!(address, role, "no registry configured, skipping registration");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EtcdRegistry
// ---------------------------------------------------------------------------

/// Registers through the etcd v3 JSON gateway.
///
/// Writes key `services/<role>/<address>` with the address as value.
/// The gateway wants both base64-encoded.
#[derive(Debug, Clone)]
pub struct EtcdRegistry {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct PutRequest {
    key: String,
    value: String,
}

impl EtcdRegistry {
    /// `endpoint` is the gateway base URL, e.g. `http://127.0.0.1:2379`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// The key a service is registered under.
    pub fn key_for(address: &str, role: &str) -> String {
        format!("services/{role}/{address}")
    }
}

impl ServiceRegistry for EtcdRegistry {
    async fn register(
        &self,
        address: &str,
        role: &str,
    ) -> Result<(), RegistryError> {
        let body = PutRequest {
            key: STANDARD.encode(Self::key_for(address, role)),
            value: STANDARD.encode(address),
        };
        let url = format!("{}/v3/kv/put", self.endpoint);

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(address, role, endpoint = %self.endpoint, "registered with etcd");
        Ok(())
    }
}

/// Registers with etcd when `endpoint` is set, otherwise only logs.
pub async fn register_service(
    endpoint: Option<&str>,
    address: &str,
    role: &str,
) -> Result<(), RegistryError> {
    match endpoint {
        Some(endpoint) => EtcdRegistry::new(endpoint).register(address, role).await,
        None => NoopRegistry.register(address, role).await,
    }
}
