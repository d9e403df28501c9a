//! In-crate test doubles for the pipeline ports

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sourcebridge_core::{
    domain::{
        Credential, DownloadedFile, FileListing, IngestError, ObjectKey, ProviderKind, RemoteFile,
        RemoteId,
    },
    ports::{
        IIndexingService, INotificationService, IOAuthFlow, IObjectStorage, IStorageProvider,
        InMemoryCredentialStore, IndexingRequest, Notification, StoredObject, UploadContext,
    },
    usecases::ProviderConnector,
};
use tokio_util::sync::CancellationToken;

pub(crate) fn remote_file(id: &str, name: &str) -> RemoteFile {
    RemoteFile {
        id: RemoteId::new(id).unwrap(),
        name: name.to_string(),
        path: format!("/{name}"),
        size: 3,
        modified_at: "2026-03-01T12:00:00Z".parse().unwrap(),
        mime_type: None,
    }
}

/// Flow that always issues the same token
pub(crate) struct StaticFlow(pub ProviderKind);

#[async_trait::async_trait]
impl IOAuthFlow for StaticFlow {
    fn provider(&self) -> ProviderKind {
        self.0
    }

    async fn authorize(&self) -> Result<Credential, IngestError> {
        Ok(Credential::new(self.0, "token"))
    }
}

pub(crate) async fn connected_connector(provider: ProviderKind) -> Arc<ProviderConnector> {
    let store = InMemoryCredentialStore::with_credential(Credential::new(provider, "token"));
    let connector = ProviderConnector::new(Arc::new(StaticFlow(provider)), Arc::new(store));
    assert!(connector.check_existing_connection().await.unwrap());
    Arc::new(connector)
}

pub(crate) fn disconnected_connector(provider: ProviderKind) -> Arc<ProviderConnector> {
    Arc::new(ProviderConnector::new(
        Arc::new(StaticFlow(provider)),
        Arc::new(InMemoryCredentialStore::new()),
    ))
}

/// Provider whose downloads return the file name as content
pub(crate) struct MockProvider {
    kind: ProviderKind,
    failures: HashMap<String, IngestError>,
    downloads: Mutex<Vec<String>>,
}

impl MockProvider {
    pub(crate) fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            failures: HashMap::new(),
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail_download(mut self, id: &str, error: IngestError) -> Self {
        self.failures.insert(id.to_string(), error);
        self
    }

    pub(crate) fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IStorageProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn list_files(
        &self,
        _credential: &Credential,
        _max_files: usize,
    ) -> Result<FileListing, IngestError> {
        Ok(FileListing::default())
    }

    async fn download_file(
        &self,
        _credential: &Credential,
        file: &RemoteFile,
    ) -> Result<DownloadedFile, IngestError> {
        self.downloads.lock().unwrap().push(file.id.to_string());
        if let Some(err) = self.failures.get(file.id.as_str()) {
            return Err(err.clone());
        }
        Ok(DownloadedFile::from_remote(
            file,
            file.name.as_bytes().to_vec(),
            None,
        ))
    }
}

/// Storage accepting everything except configured file names
#[derive(Default)]
pub(crate) struct MockStorage {
    failures: HashMap<String, IngestError>,
    cancel_on: Option<(String, CancellationToken)>,
    keys: Mutex<Vec<String>>,
}

impl MockStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_for(mut self, file_name: &str, error: IngestError) -> Self {
        self.failures.insert(file_name.to_string(), error);
        self
    }

    /// Cancels `token` while uploading `file_name`, then never completes
    pub(crate) fn cancel_on(mut self, file_name: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((file_name.to_string(), token));
        self
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IObjectStorage for MockStorage {
    async fn upload(
        &self,
        file: &DownloadedFile,
        key: &ObjectKey,
        _context: &UploadContext,
    ) -> Result<StoredObject, IngestError> {
        if let Some((name, token)) = &self.cancel_on {
            if *name == file.name {
                token.cancel();
                std::future::pending::<()>().await;
            }
        }
        if let Some(err) = self.failures.get(&file.name) {
            return Err(err.clone());
        }
        self.keys.lock().unwrap().push(key.to_string());
        Ok(StoredObject {
            url: format!("gs://bucket/{key}"),
            file_name: key.to_string(),
        })
    }
}

/// Indexing service acknowledging with `{"indexed": <file name>}`
#[derive(Default)]
pub(crate) struct MockIndexing {
    failures: HashMap<String, IngestError>,
    requests: Mutex<Vec<IndexingRequest>>,
}

impl MockIndexing {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_for(mut self, file_name: &str, error: IngestError) -> Self {
        self.failures.insert(file_name.to_string(), error);
        self
    }

    pub(crate) fn requests(&self) -> Vec<IndexingRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IIndexingService for MockIndexing {
    async fn submit(&self, request: &IndexingRequest) -> Result<serde_json::Value, IngestError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(err) = self.failures.get(&request.file_name) {
            return Err(err.clone());
        }
        Ok(serde_json::json!({ "indexed": request.file_name }))
    }
}

/// Notifier recording everything it is asked to show
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
    progress: Mutex<Vec<f64>>,
    cleared: Mutex<usize>,
}

impl RecordingNotifier {
    pub(crate) fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub(crate) fn progress(&self) -> Vec<f64> {
        self.progress.lock().unwrap().clone()
    }

    pub(crate) fn cleared(&self) -> usize {
        *self.cleared.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl INotificationService for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn show_progress(
        &self,
        _progress_id: &str,
        _title: &str,
        percent: f64,
    ) -> anyhow::Result<()> {
        self.progress.lock().unwrap().push(percent);
        Ok(())
    }

    async fn clear_progress(&self, _progress_id: &str) -> anyhow::Result<()> {
        *self.cleared.lock().unwrap() += 1;
        Ok(())
    }
}
