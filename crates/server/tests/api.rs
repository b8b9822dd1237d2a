//! HTTP API tests, driving the router directly.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use fetchbox_metadata::{Fault as MetadataFault, MemoryStore, Operation as MetadataOperation};
use fetchbox_registry::FileRegistry;
use fetchbox_server::{AppState, create_router};
use fetchbox_storage::backend::{Fault as ContentFault, MockBackend, Operation as ContentOperation};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const SOURCE: &str = "http://example/a.png";
const BYTES: &[u8] = b"\x89PNG not really a cat";

struct TestServer {
    router: Router,
    content: Arc<MockBackend>,
    metadata: Arc<MemoryStore>,
}

impl TestServer {
    fn new() -> Self {
        let content = Arc::new(MockBackend::default().with_remote(SOURCE, BYTES));
        let metadata = Arc::new(MemoryStore::with_next_id(42));
        let registry = FileRegistry::new(content.clone(), metadata.clone());
        Self { router: create_router(AppState::new(registry)), content, metadata }
    }

    async fn request(&self, method: &str, uri: &str, body: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let request = Request::builder().method(method).uri(uri).body(Body::from(body.to_string())).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, bytes.to_vec())
    }

    async fn text(&self, method: &str, uri: &str, body: &str) -> (StatusCode, String) {
        let (status, _, bytes) = self.request(method, uri, body).await;
        (status, String::from_utf8(bytes).unwrap())
    }

    async fn error(&self, method: &str, uri: &str) -> (StatusCode, String) {
        let (status, _, bytes) = self.request(method, uri, "").await;
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["message"].is_string());
        (status, json["code"].as_str().unwrap().to_string())
    }

    async fn upload(&self) -> String {
        let (status, id) = self.text("POST", &format!("/upload?uri={SOURCE}"), "").await;
        assert_eq!(status, StatusCode::OK);
        id
    }
}

#[tokio::test]
async fn test_upload_download_describe_rename_delete() {
    let server = TestServer::new();
    let id = server.upload().await;
    assert_eq!(id, "42");

    let (status, headers, bytes) = server.request("GET", "/download/42", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, BYTES);
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename="));

    assert_eq!(server.text("PUT", "/description/42", "a cat").await, (StatusCode::OK, "a cat".to_string()));
    assert_eq!(server.text("GET", "/description/42", "").await, (StatusCode::OK, "a cat".to_string()));

    assert_eq!(server.text("PUT", "/rename/42/new/b", "").await, (StatusCode::OK, "b".to_string()));
    let (_, headers, bytes) = server.request("GET", "/download/42", "").await;
    assert_eq!(headers[header::CONTENT_DISPOSITION], "attachment; filename=\"b\"");
    assert_eq!(bytes, BYTES);

    assert_eq!(server.text("DELETE", "/delete/42", "").await, (StatusCode::OK, "Deleted file: b".to_string()));
    assert_eq!(server.error("GET", "/download/42").await, (StatusCode::NOT_FOUND, "not_found".to_string()));
}

#[tokio::test]
async fn test_download_name_with_separators_is_quoted() {
    let server = TestServer::new();
    server.upload().await;
    let (status, name) = server.text("PUT", "/rename/42/new/my%20cat%3B%20v2.png", "").await;
    assert_eq!((status, name.as_str()), (StatusCode::OK, "my cat; v2.png"));
    let (status, headers, _) = server.request("GET", "/download/42", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_DISPOSITION], "attachment; filename=\"my cat; v2.png\"");
}

#[tokio::test]
async fn test_invalid_source_is_bad_request() {
    let server = TestServer::new();
    let (status, code) = server.error("POST", "/upload?uri=ftp://example/a.png").await;
    assert_eq!((status, code.as_str()), (StatusCode::BAD_REQUEST, "bad_request"));
    assert!(server.metadata.is_empty().await);
}

#[tokio::test]
async fn test_missing_uri_is_rejected() {
    let server = TestServer::new();
    let (status, _, _) = server.request("POST", "/upload", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_fetch_is_server_error() {
    let server = TestServer::new();
    server.content.inject(ContentOperation::Materialize, ContentFault::Fail).await;
    let (status, code) = server.error("POST", &format!("/upload?uri={SOURCE}")).await;
    assert_eq!((status, code.as_str()), (StatusCode::INTERNAL_SERVER_ERROR, "fetch_error"));
    assert!(server.metadata.is_empty().await);
}

#[tokio::test]
async fn test_rename_conflict() {
    let server = TestServer::new();
    server.upload().await;
    server.upload().await;
    server.text("PUT", "/rename/43/new/taken", "").await;
    let (status, code) = server.error("PUT", "/rename/42/new/taken").await;
    assert_eq!((status, code.as_str()), (StatusCode::CONFLICT, "conflict"));
}

#[tokio::test]
async fn test_inconsistent_delete() {
    let server = TestServer::new();
    server.upload().await;
    server.metadata.inject(MetadataOperation::Delete, MetadataFault::Fail).await;
    let (status, code) = server.error("DELETE", "/delete/42").await;
    assert_eq!((status, code.as_str()), (StatusCode::INTERNAL_SERVER_ERROR, "inconsistent_state"));
    assert!(server.content.names().await.is_empty());

    server.metadata.heal(MetadataOperation::Delete).await;
    let (status, body) = server.text("DELETE", "/delete/42", "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("Deleted file: "));
}

#[tokio::test]
async fn test_unknown_ids() {
    let server = TestServer::new();
    for (method, uri) in [
        ("GET", "/download/7"),
        ("GET", "/description/7"),
        ("DELETE", "/delete/7"),
        ("PUT", "/rename/7/new/b"),
    ] {
        let (status, code) = server.error(method, uri).await;
        assert_eq!((status, code.as_str()), (StatusCode::NOT_FOUND, "not_found"), "{method} {uri}");
    }
}
