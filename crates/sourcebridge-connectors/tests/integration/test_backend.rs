//! Ingestion backend client against a mocked backend

use chrono::Utc;
use sourcebridge_connectors::backend::BackendClient;
use sourcebridge_core::{
    domain::{IngestError, ObjectKey},
    ports::{IIndexingService, IObjectStorage, IndexingRequest, StoredObject, UploadContext},
};
use wiremock::matchers::{body_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::downloaded_file;

fn backend(server: &MockServer) -> BackendClient {
    BackendClient::with_base_url(reqwest::Client::new(), server.uri())
}

fn context() -> UploadContext {
    UploadContext::new("alice", "session-42")
}

fn indexing_request() -> IndexingRequest {
    IndexingRequest::for_object(
        &StoredObject {
            url: "gs://bucket/alice/a.pdf".into(),
            file_name: "alice/a.pdf".into(),
        },
        &context(),
        "a.pdf",
    )
}

#[tokio::test]
async fn test_upload_sends_multipart_form() {
    let server = MockServer::start().await;
    let key = ObjectKey::for_upload("alice", "a.pdf", Utc::now()).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/upload-to-gcs"))
        .and(body_string_contains("name=\"file\"; filename=\"a.pdf\""))
        .and(body_string_contains("session-42"))
        .and(body_string_contains(key.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "gcsUrl": "gs://bucket/alice/a.pdf",
            "fileName": "alice/a.pdf"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let stored = backend(&server)
        .upload(&downloaded_file("a.pdf", "application/pdf", b"%PDF"), &key, &context())
        .await
        .unwrap();

    assert_eq!(stored.url, "gs://bucket/alice/a.pdf");
    assert_eq!(stored.file_name, "alice/a.pdf");
}

#[tokio::test]
async fn test_upload_reported_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload-to-gcs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "error": "bucket quota exceeded"
        })))
        .mount(&server)
        .await;

    let key = ObjectKey::for_upload("alice", "a.pdf", Utc::now()).unwrap();
    let err = backend(&server)
        .upload(&downloaded_file("a.pdf", "application/pdf", b"x"), &key, &context())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        IngestError::StorageUploadFailed("a.pdf: bucket quota exceeded".into())
    );
}

#[tokio::test]
async fn test_upload_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload-to-gcs"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let key = ObjectKey::for_upload("alice", "a.pdf", Utc::now()).unwrap();
    let err = backend(&server)
        .upload(&downloaded_file("a.pdf", "not a mime", b"x"), &key, &context())
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::StorageUploadFailed(ref m) if m.contains("500")));
}

#[tokio::test]
async fn test_submit_posts_indexing_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload-gcs-to-rag"))
        .and(body_json(serde_json::json!({
            "gcs_url": "gs://bucket/alice/a.pdf",
            "username": "alice",
            "chat_session_id": "session-42",
            "file_name": "a.pdf"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "chunks": 12
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = backend(&server).submit(&indexing_request()).await.unwrap();
    assert_eq!(ack["chunks"], 12);
}

#[tokio::test]
async fn test_submit_empty_acknowledgement() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload-gcs-to-rag"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ack = backend(&server).submit(&indexing_request()).await.unwrap();
    assert!(ack.is_null());
}

#[tokio::test]
async fn test_submit_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload-gcs-to-rag"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "error": "unsupported file type"
        })))
        .mount(&server)
        .await;

    let err = backend(&server).submit(&indexing_request()).await.unwrap_err();
    assert_eq!(err, IngestError::IndexingFailed("unsupported file type".into()));

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/api/upload-gcs-to-rag"))
        .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
            "detail": "RAG service unavailable"
        })))
        .mount(&server)
        .await;

    let err = backend(&server).submit(&indexing_request()).await.unwrap_err();
    assert_eq!(err, IngestError::IndexingFailed("RAG service unavailable".into()));
}

#[tokio::test]
async fn test_backend_unauthorized_does_not_blame_provider_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload-to-gcs"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "missing API key"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload-gcs-to-rag"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "missing API key"
        })))
        .mount(&server)
        .await;

    let key = ObjectKey::for_upload("alice", "a.pdf", Utc::now()).unwrap();
    let upload = backend(&server)
        .upload(&downloaded_file("a.pdf", "application/pdf", b"x"), &key, &context())
        .await
        .unwrap_err();
    assert!(matches!(upload, IngestError::StorageUploadFailed(ref m) if m.contains("401")));
    assert!(!upload.suggests_reconnect());

    let submit = backend(&server).submit(&indexing_request()).await.unwrap_err();
    assert_eq!(submit, IngestError::IndexingFailed("missing API key".into()));
}
