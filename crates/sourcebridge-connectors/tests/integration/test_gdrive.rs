//! Google Drive adapter against a mocked API v3

use sourcebridge_connectors::gdrive::GoogleDriveProvider;
use sourcebridge_core::{
    domain::{IngestError, ProviderKind},
    ports::IStorageProvider,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{bearer, credential, drive_file, remote_file};

fn provider(server: &MockServer) -> GoogleDriveProvider {
    GoogleDriveProvider::with_base_url(reqwest::Client::new(), server.uri())
}

async fn mount_two_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [drive_file("f3", "c.txt", "text/plain")]
        })))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(bearer())
        .and(query_param("orderBy", "modifiedTime desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "nextPageToken": "p2",
            "files": [
                drive_file("f1", "a.pdf", "application/pdf"),
                drive_file("f2", "Plan", "application/vnd.google-apps.document"),
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_list_follows_page_token() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let listing = provider(&server)
        .list_files(&credential(ProviderKind::GoogleDrive), 100)
        .await
        .unwrap();

    let ids: Vec<_> = listing.files.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["f1", "f2", "f3"]);
    assert_eq!(listing.files[0].size, 4);
    assert!(!listing.truncated);
}

#[tokio::test]
async fn test_list_truncates_at_max_files() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let listing = provider(&server)
        .list_files(&credential(ProviderKind::GoogleDrive), 2)
        .await
        .unwrap();

    assert_eq!(listing.files.len(), 2);
    assert!(listing.truncated);
}

#[tokio::test]
async fn test_list_forbidden() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {"code": 403, "message": "Insufficient Permission"}
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .list_files(&credential(ProviderKind::GoogleDrive), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::AccessDenied(ref m) if m.contains("Insufficient Permission")));
}

#[tokio::test]
async fn test_download_binary_uses_alt_media() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/f1"))
        .and(query_param("alt", "media"))
        .and(bearer())
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .set_body_bytes(b"%PDF".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let downloaded = provider(&server)
        .download_file(
            &credential(ProviderKind::GoogleDrive),
            &remote_file("f1", "a.pdf", Some("application/pdf")),
        )
        .await
        .unwrap();

    assert_eq!(downloaded.name, "a.pdf");
    assert_eq!(downloaded.bytes, b"%PDF");
}

#[tokio::test]
async fn test_download_workspace_document_exports_pdf() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/doc1/export"))
        .and(query_param("mimeType", "application/pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .set_body_bytes(b"%PDF-export".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let downloaded = provider(&server)
        .download_file(
            &credential(ProviderKind::GoogleDrive),
            &remote_file("doc1", "Plan", Some("application/vnd.google-apps.document")),
        )
        .await
        .unwrap();

    assert_eq!(downloaded.name, "Plan.pdf");
    assert_eq!(downloaded.mime_type, "application/pdf");
    assert_eq!(downloaded.bytes, b"%PDF-export");
}

#[tokio::test]
async fn test_download_missing_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": 404, "message": "File not found: gone."}
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .download_file(
            &credential(ProviderKind::GoogleDrive),
            &remote_file("gone", "gone.txt", Some("text/plain")),
        )
        .await
        .unwrap_err();
    assert_eq!(err, IngestError::NotFound("gone.txt".into()));
}
