//! Loopback backup endpoint.
//!
//! The login service binds a second listener on `127.0.0.1:0` that serves
//! `GET /backup` with a consistent image of the store. Its URL is written
//! next to the database as `<db-path>.bakurl` so operators on the host can
//! find it without knowing the port.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use authn_store::CredentialStore;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::AuthnError;

/// A running backup endpoint. Dropping it stops serving.
pub struct BackupEndpoint {
    url: String,
    task: JoinHandle<()>,
}

impl BackupEndpoint {
    /// Starts serving backups of `store` and records the URL in
    /// `<db-path>.bakurl`.
    pub async fn spawn(store: Arc<CredentialStore>) -> Result<Self, AuthnError> {
        let db_path = store.config().path.clone();
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let url = format!("http://localhost:{port}/backup");

        tokio::fs::write(url_file(&db_path), &url).await?;

        let app = Router::new()
            .route("/backup", get(backup))
            .with_state(store);
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "backup endpoint stopped");
            }
        });

        tracing::info!(%url, "backup endpoint listening");
        Ok(Self { url, task })
    }

    /// The URL written to the `.bakurl` file.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for BackupEndpoint {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// `<db-path>.bakurl`
pub fn url_file(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_owned();
    name.push(".bakurl");
    PathBuf::from(name)
}

async fn backup(State(store): State<Arc<CredentialStore>>) -> Response {
    let bytes = match store.snapshot_bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "backup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let db_name = store
        .config()
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "login.db".to_string());
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let disposition = format!("attachment; filename=\"{db_name}.{stamp}\"");

    tracing::info!(bytes = bytes.len(), "serving backup");
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, bytes.len().to_string()),
        ],
        bytes,
    )
        .into_response()
}
