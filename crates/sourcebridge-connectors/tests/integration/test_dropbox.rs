//! Dropbox adapter against a mocked API v2

use sourcebridge_connectors::dropbox::DropboxProvider;
use sourcebridge_core::{
    domain::{IngestError, ProviderKind},
    ports::IStorageProvider,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    bearer, credential, dropbox_file, mount_dropbox_continue_page, mount_dropbox_first_page,
    remote_file,
};

fn provider(server: &MockServer) -> DropboxProvider {
    DropboxProvider::with_base_url(reqwest::Client::new(), server.uri())
}

#[tokio::test]
async fn test_list_follows_cursor_and_skips_folders() {
    let server = MockServer::start().await;
    mount_dropbox_first_page(
        &server,
        serde_json::json!([
            {".tag": "folder", "name": "Docs", "id": "id:dir", "path_display": "/Docs"},
            dropbox_file("id:a", "a.pdf"),
        ]),
        "c1",
        true,
    )
    .await;
    mount_dropbox_continue_page(
        &server,
        "c1",
        serde_json::json!([dropbox_file("id:b", "b.txt")]),
        "c2",
        false,
    )
    .await;

    let listing = provider(&server)
        .list_files(&credential(ProviderKind::Dropbox), 100)
        .await
        .unwrap();

    let names: Vec<_> = listing.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a.pdf", "b.txt"]);
    assert!(!listing.truncated);
}

#[tokio::test]
async fn test_list_stops_at_max_files() {
    let server = MockServer::start().await;
    mount_dropbox_first_page(
        &server,
        serde_json::json!([
            dropbox_file("id:a", "a.pdf"),
            dropbox_file("id:b", "b.pdf"),
            dropbox_file("id:c", "c.pdf"),
        ]),
        "c1",
        true,
    )
    .await;

    let listing = provider(&server)
        .list_files(&credential(ProviderKind::Dropbox), 2)
        .await
        .unwrap();

    assert_eq!(listing.files.len(), 2);
    assert!(listing.truncated);
    // The continue endpoint was never mounted, so reaching it would have failed
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files/list_folder"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error_summary": "expired_access_token/",
            "error": {".tag": "expired_access_token"}
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .list_files(&credential(ProviderKind::Dropbox), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::CredentialExpired(_)));
    assert!(err.suggests_reconnect());
}

#[tokio::test]
async fn test_list_server_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files/list_folder"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = provider(&server)
        .list_files(&credential(ProviderKind::Dropbox), 10)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        IngestError::ListFailed {
            status: 500,
            message: "internal".into()
        }
    );
}

#[tokio::test]
async fn test_download_sends_path_argument() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files/download"))
        .and(bearer())
        .and(header("Dropbox-API-Arg", r#"{"path":"id:a"}"#))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .set_body_bytes(b"%PDF".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let file = remote_file("id:a", "a.pdf", None);
    let downloaded = provider(&server)
        .download_file(&credential(ProviderKind::Dropbox), &file)
        .await
        .unwrap();

    assert_eq!(downloaded.name, "a.pdf");
    assert_eq!(downloaded.mime_type, "application/pdf");
    assert_eq!(downloaded.bytes, b"%PDF");
    assert_eq!(downloaded.last_modified, file.modified_at);
}

#[tokio::test]
async fn test_download_missing_path_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files/download"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error_summary": "path/not_found/...",
            "error": {".tag": "path", "path": {".tag": "not_found"}}
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .download_file(
            &credential(ProviderKind::Dropbox),
            &remote_file("id:gone", "gone.txt", None),
        )
        .await
        .unwrap_err();
    assert_eq!(err, IngestError::NotFound("gone.txt".into()));
}

#[tokio::test]
async fn test_download_forbidden_is_access_denied() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files/download"))
        .respond_with(ResponseTemplate::new(403).set_body_string("no"))
        .mount(&server)
        .await;

    let err = provider(&server)
        .download_file(
            &credential(ProviderKind::Dropbox),
            &remote_file("id:a", "a.pdf", None),
        )
        .await
        .unwrap_err();
    assert!(err.is_access_denied());
}
