//! Integration tests for the credential store: concurrency, file locking,
//! and the retention / resume properties seen from outside the crate.

use std::sync::Arc;

use authn_protocol::Uid;
use authn_store::{CredentialStore, StoreConfig, StoreError};
use tokio::sync::Barrier;

// =========================================================================
// Helpers
// =========================================================================

fn config(dir: &tempfile::TempDir) -> StoreConfig {
    StoreConfig {
        path: dir.path().join("login.db"),
        uid_prefix: "player:".into(),
        retention: 2,
    }
}

async fn open_store(dir: &tempfile::TempDir) -> CredentialStore {
    CredentialStore::open(config(dir))
        .await
        .expect("store should open")
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_logins_create_exactly_one_uid() {
    const CALLERS: usize = 16;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open_store(&dir).await);
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                store
                    .resolve_or_create_by_platform("steam", "racer", None)
                    .await
                    .expect("login should succeed")
                    .uid
            })
        })
        .collect();

    let mut uids: Vec<Uid> = Vec::new();
    for handle in handles {
        uids.push(handle.await.unwrap());
    }

    assert!(uids.iter().all(|u| *u == uids[0]), "all callers see one uid");
    assert_eq!(store.binding_count("steam").await.unwrap(), 1);
    let record = store.session(&uids[0]).await.unwrap().unwrap();
    assert_eq!(record.tokens.len(), 2, "retention still applies");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resumes_never_mutate_tokens() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open_store(&dir).await);
    let resolved = store
        .resolve_or_create_by_platform("steam", "u", None)
        .await
        .unwrap();
    let token = resolved.newest_token().unwrap().to_string();
    let before = store.session(&resolved.uid).await.unwrap().unwrap().tokens;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let uid = resolved.uid.clone();
            let token = token.clone();
            tokio::spawn(async move { store.validate_and_touch(&uid, &token).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().expect("resume should succeed");
    }

    let after = store.session(&resolved.uid).await.unwrap().unwrap().tokens;
    assert_eq!(before, after);
}

// =========================================================================
// File locking
// =========================================================================

#[tokio::test]
async fn test_second_open_on_same_file_fails_while_first_is_alive() {
    let dir = tempfile::tempdir().unwrap();
    let first = open_store(&dir).await;
    let alice = first
        .resolve_or_create_by_platform("steam", "alice", None)
        .await
        .unwrap();

    let second = CredentialStore::open(config(&dir)).await;

    assert!(
        matches!(second, Err(StoreError::Locked(_))),
        "expected Locked, got {:?}",
        second.err()
    );

    // The first holder is unaffected and nothing it wrote was lost.
    first
        .resolve_or_create_by_platform("steam", "bob", None)
        .await
        .unwrap();
    assert_eq!(first.binding_count("steam").await.unwrap(), 2);
    assert_eq!(
        first.uid_for("steam", "alice").await.unwrap(),
        Some(alice.uid)
    );
}

#[tokio::test]
async fn test_lock_is_released_on_close() {
    let dir = tempfile::tempdir().unwrap();
    let first = open_store(&dir).await;
    first
        .resolve_or_create_by_platform("steam", "alice", None)
        .await
        .unwrap();
    first.close().await;

    let second = open_store(&dir).await;

    assert_eq!(second.binding_count("steam").await.unwrap(), 1);
}

// =========================================================================
// Retention seen by resume
// =========================================================================

#[tokio::test]
async fn test_trimmed_token_can_no_longer_resume() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let first = store
        .resolve_or_create_by_platform("steam", "u", None)
        .await
        .unwrap();
    let oldest = first.newest_token().unwrap().to_string();
    store
        .resolve_or_create_by_platform("steam", "u", None)
        .await
        .unwrap();
    // Still inside the retention window of 2.
    assert!(store.validate_and_touch(&first.uid, &oldest).await.is_ok());

    store
        .resolve_or_create_by_platform("steam", "u", None)
        .await
        .unwrap();

    let result = store.validate_and_touch(&first.uid, &oldest).await;
    assert!(matches!(result, Err(StoreError::TokenNotFound)));
    assert!(result.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_n_logins_leave_exactly_k_newest() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let mut minted = Vec::new();
    let mut uid = None;
    for _ in 0..7 {
        let r = store
            .resolve_or_create_by_platform("steam", "u", None)
            .await
            .unwrap();
        minted.push(r.newest_token().unwrap().to_string());
        uid = Some(r.uid);
    }

    let record = store.session(&uid.unwrap()).await.unwrap().unwrap();
    let stored: Vec<&str> =
        record.tokens.iter().map(|t| t.token.as_str()).collect();
    assert_eq!(stored, vec![minted[5].as_str(), minted[6].as_str()]);
}

// =========================================================================
// Many identities
// =========================================================================

#[tokio::test]
async fn test_login_and_resume_touch_only_their_own_identity() {
    const PLAYERS: usize = 300;

    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let mut seeded = Vec::with_capacity(PLAYERS);
    for i in 0..PLAYERS {
        let r = store
            .resolve_or_create_by_platform("steam", &format!("p{i}"), Some("seed"))
            .await
            .unwrap();
        seeded.push(r);
    }
    let bystander = store.session(&seeded[0].uid).await.unwrap().unwrap();

    let target = &seeded[PLAYERS - 1];
    store
        .resolve_or_create_by_platform("steam", &format!("p{}", PLAYERS - 1), Some("new"))
        .await
        .unwrap();
    let profile = store
        .validate_and_touch(&target.uid, target.newest_token().unwrap())
        .await
        .unwrap();

    assert_eq!(profile, "new");
    assert_eq!(store.binding_count("steam").await.unwrap(), PLAYERS);
    assert_eq!(
        store.session(&seeded[0].uid).await.unwrap().unwrap(),
        bystander
    );
}

// =========================================================================
// Persistence and snapshot export
// =========================================================================

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let (uid, token) = {
        let store = open_store(&dir).await;
        let r = store
            .resolve_or_create_by_platform("steam", "u", Some("blob"))
            .await
            .unwrap();
        store.close().await;
        (r.uid.clone(), r.newest_token().unwrap().to_string())
    };

    let store = open_store(&dir).await;

    assert_eq!(store.validate_and_touch(&uid, &token).await.unwrap(), "blob");
}

#[tokio::test]
async fn test_snapshot_bytes_open_as_equivalent_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let r = store
        .resolve_or_create_by_platform("steam", "u", None)
        .await
        .unwrap();

    let backup = dir.path().join("backup.db");
    std::fs::write(&backup, store.snapshot_bytes().await.unwrap()).unwrap();
    let restored = CredentialStore::open(StoreConfig {
        path: backup,
        ..StoreConfig::default()
    })
    .await
    .unwrap();

    assert_eq!(
        restored.uid_for("steam", "u").await.unwrap(),
        Some(r.uid.clone())
    );
    assert_eq!(
        restored.session(&r.uid).await.unwrap(),
        store.session(&r.uid).await.unwrap()
    );
}
