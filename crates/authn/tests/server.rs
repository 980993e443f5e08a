//! Integration tests for the login and guest services over HTTP.

use std::sync::Arc;
use std::time::Duration;

use authn::prelude::*;
use authn::STATUS_LOGIN_AUTH_ERROR;
use authn_protocol::{keep_digest, now_micros, response_signature, verify_digest};
use reqwest::StatusCode;

const SECRET: &str = "integration-secret";

// =========================================================================
// Helpers
// =========================================================================

fn secret() -> Secret {
    Secret::new(SECRET)
}

struct Running {
    url: String,
    store: Arc<CredentialStore>,
    backup_url: Option<String>,
    _dir: tempfile::TempDir,
}

/// Starts a login server on a random port over a fresh store.
async fn start_login() -> Running {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = LoginServer::builder()
        .bind("127.0.0.1:0")
        .store_config(StoreConfig {
            path: dir.path().join("login.db"),
            ..StoreConfig::default()
        })
        .build(secret())
        .await
        .expect("server should build");

    let addr = server.local_addr().expect("should have local addr");
    let store = Arc::clone(server.store());
    let backup_url = server.backup_url().map(str::to_string);

    tokio::spawn(async move {
        let _ = server.run_until(std::future::pending()).await;
    });

    Running {
        url: format!("http://{addr}/auth"),
        store,
        backup_url,
        _dir: dir,
    }
}

async fn start_guest() -> String {
    let server = GuestServer::builder()
        .bind("127.0.0.1:0")
        .build(secret())
        .await
        .expect("guest should build");
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run_until(std::future::pending()).await;
    });
    format!("http://{addr}/auth")
}

fn claim(pid: &str) -> PlatformClaim {
    sign_claim("steam", pid, None, now_micros(), &secret())
}

async fn post<T: serde::Serialize>(url: &str, body: &T) -> reqwest::Response {
    reqwest::Client::new()
        .post(url)
        .json(body)
        .send()
        .await
        .expect("request should be sent")
}

async fn login_ok<T: serde::Serialize>(url: &str, body: &T) -> LoginResponse {
    let response = post(url, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.expect("response should decode")
}

async fn expect_auth_error(response: reqwest::Response) -> String {
    assert_eq!(response.status().as_u16(), STATUS_LOGIN_AUTH_ERROR);
    response.text().await.unwrap()
}

fn assert_signed(resp: &LoginResponse) {
    let expected = response_signature(
        resp.ts,
        resp.uid.as_str(),
        &resp.db_token,
        &resp.info,
        &secret(),
    );
    assert!(verify_digest(&expected, &resp.token), "response must verify");
}

// =========================================================================
// Claim mode
// =========================================================================

#[tokio::test]
async fn test_claim_login_twice_returns_same_uid_and_two_keeps() {
    let server = start_login().await;

    let first = login_ok(&server.url, &claim("u42")).await;
    let second = login_ok(&server.url, &claim("u42")).await;

    assert_eq!(first.uid, second.uid);
    assert_eq!(first.keeps.len(), 1);
    assert_eq!(second.keeps.len(), 2);
    assert_eq!(second.keeps[0], keep_digest(&first.db_token, &secret()));
    assert_eq!(second.keeps[1], keep_digest(&second.db_token, &secret()));
    assert_signed(&first);
    assert_signed(&second);
}

#[tokio::test]
async fn test_response_uses_wire_field_names() {
    let server = start_login().await;

    let body: serde_json::Value =
        post(&server.url, &claim("u1")).await.json().await.unwrap();

    for field in ["uid", "dbToken", "keeps", "info", "ts", "token"] {
        assert!(body.get(field).is_some(), "missing {field}");
    }
}

#[tokio::test]
async fn test_stale_claim_is_rejected() {
    let server = start_login().await;
    let old = now_micros() - 11_000_000;
    let stale = sign_claim("steam", "u", None, old, &secret());

    let text = expect_auth_error(post(&server.url, &stale).await).await;

    assert_eq!(text, "bad ts");
}

#[tokio::test]
async fn test_tampered_claim_is_rejected_with_generic_text() {
    let server = start_login().await;
    let mut forged = claim("u42");
    forged.pid = "u43".into();

    let text = expect_auth_error(post(&server.url, &forged).await).await;

    assert_eq!(text, "auth fail");
    assert_eq!(server.store.binding_count("steam").await.unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_auth_error() {
    let server = start_login().await;

    let response = reqwest::Client::new()
        .post(&server.url)
        .body("{not json")
        .send()
        .await
        .unwrap();

    expect_auth_error(response).await;
}

#[tokio::test]
async fn test_concurrent_first_logins_share_one_uid() {
    let server = Arc::new(start_login().await);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let server = Arc::clone(&server);
            tokio::spawn(async move { login_ok(&server.url, &claim("racer")).await.uid })
        })
        .collect();
    let mut uids = Vec::new();
    for task in tasks {
        uids.push(task.await.unwrap());
    }

    assert!(uids.iter().all(|u| *u == uids[0]));
    assert_eq!(server.store.binding_count("steam").await.unwrap(), 1);
}

// =========================================================================
// Token mode
// =========================================================================

#[tokio::test]
async fn test_resume_echoes_token() {
    let server = start_login().await;
    let login = login_ok(&server.url, &claim("u")).await;

    let resume = login_ok(
        &server.url,
        &LoginRequest::resume(login.uid.as_str(), &login.db_token),
    )
    .await;

    assert_eq!(resume.uid, login.uid);
    assert_eq!(resume.db_token, login.db_token);
    assert_eq!(resume.keeps, vec![keep_digest(&login.db_token, &secret())]);
    assert_signed(&resume);
}

#[tokio::test]
async fn test_resume_with_unissued_token_fails_without_touching_record() {
    let server = start_login().await;
    let login = login_ok(&server.url, &claim("u")).await;
    let before = server.store.session(&login.uid).await.unwrap().unwrap();

    let text = expect_auth_error(
        post(&server.url, &LoginRequest::resume(login.uid.as_str(), "deadbeef")).await,
    )
    .await;

    assert_eq!(text, "auth fail");
    let after = server.store.session(&login.uid).await.unwrap().unwrap();
    assert_eq!(after.last_login_at, before.last_login_at);
}

#[tokio::test]
async fn test_unknown_uid_and_bad_signature_are_indistinguishable() {
    let server = start_login().await;
    let mut forged = claim("u");
    forged.ts += 1;

    let unknown = post(&server.url, &LoginRequest::resume("player:ghost", "t")).await;
    let bad_sig = post(&server.url, &forged).await;

    assert_eq!(unknown.status(), bad_sig.status());
    assert_eq!(unknown.text().await.unwrap(), bad_sig.text().await.unwrap());
}

#[tokio::test]
async fn test_resume_missing_fields_report_which() {
    let server = start_login().await;

    let no_uid = post(&server.url, &LoginRequest::resume("", "t")).await;
    let no_token = post(&server.url, &LoginRequest::resume("player:x", "")).await;

    assert_eq!(expect_auth_error(no_uid).await, "UID is empty");
    assert_eq!(expect_auth_error(no_token).await, "DBToken is empty");
}

#[tokio::test]
async fn test_trimmed_token_cannot_resume() {
    let server = start_login().await;
    let first = login_ok(&server.url, &claim("u")).await;
    login_ok(&server.url, &claim("u")).await;
    login_ok(&server.url, &claim("u")).await;

    let response =
        post(&server.url, &LoginRequest::resume(first.uid.as_str(), &first.db_token)).await;

    assert_eq!(expect_auth_error(response).await, "auth fail");
}

// =========================================================================
// Guest service
// =========================================================================

#[tokio::test]
async fn test_guest_claim_is_accepted_by_login() {
    let guest_url = start_guest().await;
    let server = start_login().await;

    let response = post(&guest_url, &serde_json::json!({ "Name": "alice" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let claim: PlatformClaim = response.json().await.unwrap();
    assert_eq!(claim.platform, "guest");
    assert_eq!(claim.pid, "alice");

    let login = login_ok(&server.url, &claim).await;

    assert_eq!(server.store.uid_for("guest", "alice").await.unwrap(), Some(login.uid));
}

#[tokio::test]
async fn test_guest_empty_name_is_bad_request() {
    let guest_url = start_guest().await;

    let response = post(&guest_url, &serde_json::json!({ "name": "" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =========================================================================
// Backup endpoint
// =========================================================================

#[tokio::test]
async fn test_backup_serves_reopenable_image() {
    let server = start_login().await;
    let login = login_ok(&server.url, &claim("u")).await;

    let db_path = server.store.config().path.clone();
    let url_file = authn::backup::url_file(&db_path);
    let advertised = tokio::fs::read_to_string(&url_file).await.unwrap();
    assert_eq!(Some(advertised.as_str()), server.backup_url.as_deref());

    let response = tokio::time::timeout(
        Duration::from_secs(5),
        reqwest::get(advertised.replace("localhost", "127.0.0.1")),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "application/octet-stream"
    );
    let disposition = response.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"login.db."));
    let image = response.bytes().await.unwrap();

    let restored_path = db_path.with_file_name("restored.db");
    std::fs::write(&restored_path, &image).unwrap();
    let restored = CredentialStore::open(StoreConfig {
        path: restored_path,
        ..StoreConfig::default()
    })
    .await
    .unwrap();
    assert_eq!(restored.uid_for("steam", "u").await.unwrap(), Some(login.uid));
}
