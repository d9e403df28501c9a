//! Shared fixtures: mocked Dropbox and backend servers wired into an orchestrator

use std::sync::Arc;

use sourcebridge_connectors::{backend::BackendClient, dropbox::DropboxProvider};
use sourcebridge_core::{
    domain::{Credential, IngestError, ProviderKind, RemoteFile, RemoteId},
    ports::{ICredentialStore, IOAuthFlow, InMemoryCredentialStore},
    usecases::ProviderConnector,
};
use sourcebridge_pipeline::BatchOrchestrator;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Flow that is never expected to run
struct NoInteractiveFlow;

#[async_trait::async_trait]
impl IOAuthFlow for NoInteractiveFlow {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Dropbox
    }

    async fn authorize(&self) -> Result<Credential, IngestError> {
        Err(IngestError::AuthCancelled("no browser in tests".into()))
    }
}

pub struct Fixture {
    pub dropbox: MockServer,
    pub backend: MockServer,
    pub orchestrator: BatchOrchestrator,
}

/// Builds an orchestrator against fresh mock servers
///
/// With `connected`, a stored Dropbox credential is restored first.
pub async fn fixture(connected: bool) -> Fixture {
    let dropbox = MockServer::start().await;
    let backend = MockServer::start().await;

    let store: Arc<dyn ICredentialStore + Send + Sync> = if connected {
        Arc::new(InMemoryCredentialStore::with_credential(Credential::new(
            ProviderKind::Dropbox,
            "live-token",
        )))
    } else {
        Arc::new(InMemoryCredentialStore::new())
    };
    let connector = Arc::new(ProviderConnector::new(Arc::new(NoInteractiveFlow), store));
    assert_eq!(connector.check_existing_connection().await.unwrap(), connected);

    let http = reqwest::Client::new();
    let orchestrator = BatchOrchestrator::new(
        connector,
        Arc::new(DropboxProvider::with_base_url(http.clone(), dropbox.uri())),
        Arc::new(BackendClient::with_base_url(http.clone(), backend.uri())),
        Arc::new(BackendClient::with_base_url(http, backend.uri())),
    );

    Fixture {
        dropbox,
        backend,
        orchestrator,
    }
}

pub fn remote_file(id: &str, name: &str) -> RemoteFile {
    RemoteFile {
        id: RemoteId::new(id).unwrap(),
        name: name.to_string(),
        path: format!("/{name}"),
        size: 4,
        modified_at: "2026-03-01T12:00:00Z".parse().unwrap(),
        mime_type: None,
    }
}

pub async fn mount_downloads(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/files/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
        .mount(server)
        .await;
}

pub async fn mount_storage_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/upload-to-gcs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "gcsUrl": "gs://bucket/object",
            "fileName": "object"
        })))
        .mount(server)
        .await;
}

pub async fn mount_indexing_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/upload-gcs-to-rag"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true
        })))
        .mount(server)
        .await;
}
