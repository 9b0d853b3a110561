//! End-to-end wiring of `CoreService` over mocked bridges

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{FileMetadata, FileSystemAccess, SecureStore};
use bytes::Bytes;
use core_auth::{SessionState, SessionToken};
use core_media::{EntityRef, MediaError, NoopObserver, SyncState, ValidationError};
use core_runtime::config::{CoreConfig, MediaConfig};
use core_runtime::events::{AuthEvent, CoreEvent};
use core_service::{bootstrap, CoreError, CoreService};
use mockall::mock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

#[derive(Default)]
struct MemorySecureStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Single-file filesystem.
struct OneFile {
    path: &'static str,
    size: usize,
}

#[async_trait]
impl FileSystemAccess for OneFile {
    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(path == Path::new(self.path))
    }

    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        if path != Path::new(self.path) {
            return Err(BridgeError::OperationFailed("not found".to_string()));
        }
        Ok(FileMetadata {
            size: self.size as u64,
            modified_at: None,
            is_directory: false,
        })
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        assert!(self.size <= 512_000, "oversized file should not be read");
        if path != Path::new(self.path) {
            return Err(BridgeError::OperationFailed("not found".to_string()));
        }
        Ok(Bytes::from(vec![0u8; self.size]))
    }
}

fn config(http: MockHttpClient, store: Arc<MemorySecureStore>) -> CoreConfig {
    config_with_file(http, store, 2048)
}

fn config_with_file(
    http: MockHttpClient,
    store: Arc<MemorySecureStore>,
    file_size: usize,
) -> CoreConfig {
    CoreConfig::builder()
        .api_base_url("https://api.example.com/")
        .http_client(Arc::new(http))
        .secure_store(store)
        .file_system(Arc::new(OneFile {
            path: "/picked/front.jpg",
            size: file_size,
        }))
        .media(MediaConfig::default().with_max_detail_images(2))
        .build()
        .unwrap()
}

const MEDIA_BODY: &str = r#"{"_id":"p1","mainImage":"uploads/main.jpg","detailImages":["a.jpg","b.jpg"]}"#;

#[tokio::test]
async fn test_bootstrap_restores_previous_session() {
    let store = Arc::new(MemorySecureStore::default());

    let first = CoreService::new(config(MockHttpClient::new(), store.clone()));
    first
        .sign_in(SessionToken::new("persisted").unwrap())
        .await
        .unwrap();

    let second = bootstrap(config(MockHttpClient::new(), store)).await.unwrap();
    assert_eq!(second.session_state().await, SessionState::Active);
}

#[tokio::test]
async fn test_bootstrap_discards_corrupted_session() {
    let store = Arc::new(MemorySecureStore::default());
    store
        .set_secret("admin_session", b"not json")
        .await
        .unwrap();

    let service = bootstrap(config(MockHttpClient::new(), store.clone()))
        .await
        .unwrap();
    assert_eq!(service.session_state().await, SessionState::SignedOut);
    assert!(store.get_secret("admin_session").await.unwrap().is_none());
}

#[tokio::test]
async fn test_dialog_commit_over_http() {
    let mut http = MockHttpClient::new();
    let mut seq = mockall::Sequence::new();
    http.expect_execute()
        .withf(|req| {
            req.method == HttpMethod::Get && req.url == "https://api.example.com/products/p1"
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(HttpResponse::new(200, MEDIA_BODY)));
    http.expect_execute()
        .withf(|req| {
            req.method == HttpMethod::Post
                && req.url == "https://api.example.com/products/p1/images/delete"
                && req.headers.get("Authorization").map(String::as_str) == Some("Bearer tok")
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(HttpResponse::new(200, "{}")));
    http.expect_execute()
        .withf(|req| {
            req.method == HttpMethod::Get && req.url == "https://api.example.com/products/p1"
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| {
            Ok(HttpResponse::new(
                200,
                r#"{"_id":"p1","mainImage":"uploads/main.jpg","detailImages":["b.jpg"]}"#,
            ))
        });

    let service = CoreService::new(config(http, Arc::new(MemorySecureStore::default())));
    service
        .sign_in(SessionToken::new("tok").unwrap())
        .await
        .unwrap();

    let dialog = service
        .open_media_dialog(EntityRef::product("p1"), Arc::new(NoopObserver))
        .await
        .unwrap();
    dialog.stage_removal("a.jpg").await.unwrap();

    let session = dialog.commit().await.unwrap();
    assert_eq!(session.state, SyncState::Done);
    assert_eq!(session.deleted, 1);

    let view = dialog.view().await;
    assert_eq!(view.active_detail_refs, vec!["b.jpg".to_string()]);
    assert!(!view.can_commit);
    dialog.close().await;
}

#[tokio::test]
async fn test_configured_policy_reaches_dialogs() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .times(1)
        .returning(|_| Ok(HttpResponse::new(200, MEDIA_BODY)));

    let service = CoreService::new(config(http, Arc::new(MemorySecureStore::default())));
    service
        .sign_in(SessionToken::new("tok").unwrap())
        .await
        .unwrap();
    assert_eq!(service.media_config().max_detail_images, 2);

    let dialog = service
        .open_media_dialog(EntityRef::product("p1"), Arc::new(NoopObserver))
        .await
        .unwrap();
    let file = service.load_local_file("/picked/front.jpg").await.unwrap();
    assert_eq!(file.name, "front.jpg");
    assert_eq!(file.content_type, "image/jpeg");

    // Two baseline images already fill the configured limit
    let err = dialog.stage_detail_images(vec![file]).await.unwrap_err();
    assert!(matches!(err, MediaError::Validation(_)));
}

#[tokio::test]
async fn test_open_without_session_fails_before_io() {
    let mut http = MockHttpClient::new();
    http.expect_execute().never();

    let service = CoreService::new(config(http, Arc::new(MemorySecureStore::default())));
    let err = service
        .open_media_dialog(EntityRef::spare_part("s9"), Arc::new(NoopObserver))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CoreError::Media(MediaError::Api(_))));
}

#[tokio::test]
async fn test_sign_out_emits_event() {
    let service = CoreService::new(config(
        MockHttpClient::new(),
        Arc::new(MemorySecureStore::default()),
    ));
    service
        .sign_in(SessionToken::new("tok").unwrap())
        .await
        .unwrap();

    let mut events = service.subscribe();
    service.sign_out().await.unwrap();

    assert_eq!(service.session_state().await, SessionState::SignedOut);
    assert!(matches!(
        events.recv().await.unwrap(),
        CoreEvent::Auth(AuthEvent::SessionCleared)
    ));
}

#[tokio::test]
async fn test_missing_file_is_reported_with_name() {
    let service = CoreService::new(config(
        MockHttpClient::new(),
        Arc::new(MemorySecureStore::default()),
    ));

    let err = service
        .load_local_file("/picked/missing.png")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Media(MediaError::FileAccess { ref file_name, .. }) if file_name == "missing.png"
    ));
}

#[tokio::test]
async fn test_oversized_file_rejected_from_metadata() {
    let service = CoreService::new(config_with_file(
        MockHttpClient::new(),
        Arc::new(MemorySecureStore::default()),
        3_000_000,
    ));

    let err = service
        .load_local_file("/picked/front.jpg")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Media(MediaError::Validation(ValidationError::OversizedFile {
            size: 3_000_000,
            limit: 512_000,
            ..
        }))
    ));
}
