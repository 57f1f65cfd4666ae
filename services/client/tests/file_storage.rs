use std::sync::Arc;

use client_lib::adapters::FileSessionStorage;
use client_lib::config::Config;
use client_lib::state::ClientState;
use decipher_core::ports::{SessionStorage, Slot};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn slots_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.json");

    let storage = FileSessionStorage::new(&path);
    storage.write(Slot::Token, "tok-1").await.unwrap();
    storage
        .write(Slot::User, r#"{"id":"u-1","email":"ada@example.com"}"#)
        .await
        .unwrap();
    drop(storage);

    let reopened = FileSessionStorage::new(&path);
    assert_eq!(
        reopened.read(Slot::Token).await.unwrap().as_deref(),
        Some("tok-1")
    );
    assert!(reopened.read(Slot::User).await.unwrap().is_some());
}

#[tokio::test]
async fn clearing_both_slots_removes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let storage = FileSessionStorage::new(&path);

    storage.write(Slot::Token, "tok-1").await.unwrap();
    storage.write(Slot::User, "{}").await.unwrap();
    assert!(path.exists());

    storage.remove(Slot::Token).await.unwrap();
    assert!(path.exists());
    storage.remove(Slot::User).await.unwrap();
    assert!(!path.exists());

    // Removing from an absent file is fine.
    storage.remove(Slot::User).await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn session_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let storage = FileSessionStorage::new(&path);
    storage.write(Slot::Token, "secret").await.unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[tokio::test]
async fn undefined_sentinel_is_wiped_on_restore() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let storage = Arc::new(FileSessionStorage::new(&path));
    storage.write(Slot::Token, "undefined").await.unwrap();
    storage
        .write(
            Slot::User,
            &json!({"id": "u-1", "email": "ada@example.com"}).to_string(),
        )
        .await
        .unwrap();

    let config = Config {
        api_url: server.uri(),
        ..Config::default()
    };
    let state = ClientState::with_storage(config, storage.clone()).unwrap();
    let snapshot = state.session.restore().await;

    assert!(!snapshot.is_authenticated());
    assert!(!snapshot.is_loading);
    assert!(!path.exists());
}
