//! Ingestion backend client
//!
//! Two endpoints on the chat backend:
//!
//! - storage upload: multipart `POST` with parts `file`, `username`,
//!   `chat_session_id` and `object_key`, answered with
//!   `{"success": true, "gcsUrl": "...", "fileName": "..."}`
//! - indexing: JSON `POST` of `{gcs_url, username, chat_session_id, file_name}`
//!   answered with an acknowledgement body

use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::Deserialize;
use sourcebridge_core::{
    config::BackendConfig,
    domain::{DownloadedFile, IngestError, ObjectKey},
    ports::{IIndexingService, IObjectStorage, IndexingRequest, StoredObject, UploadContext},
};
use tracing::{debug, info};

use crate::client::{error_for_response, error_message, join_url, network_error, Operation};

/// Storage endpoint response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageResponse {
    #[serde(default)]
    success: bool,
    gcs_url: Option<String>,
    file_name: Option<String>,
    error: Option<String>,
}

/// HTTP client for the ingestion backend
///
/// Implements both [`IObjectStorage`] and [`IIndexingService`].
pub struct BackendClient {
    client: Client,
    base_url: String,
    storage_path: String,
    indexing_path: String,
}

impl BackendClient {
    /// Creates a client from the `backend` configuration section
    pub fn new(client: Client, config: &BackendConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            storage_path: config.storage_path.clone(),
            indexing_path: config.indexing_path.clone(),
        }
    }

    /// Creates a client with default paths against `base_url` (useful for testing)
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        let defaults = BackendConfig::default();
        Self {
            client,
            base_url: base_url.into(),
            storage_path: defaults.storage_path,
            indexing_path: defaults.indexing_path,
        }
    }

    fn file_part(file: &DownloadedFile) -> Part {
        let part = || Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        // An unparseable MIME type still uploads, without a content type
        part().mime_str(&file.mime_type).unwrap_or_else(|_| part())
    }
}

#[async_trait::async_trait]
impl IObjectStorage for BackendClient {
    async fn upload(
        &self,
        file: &DownloadedFile,
        key: &ObjectKey,
        context: &UploadContext,
    ) -> Result<StoredObject, IngestError> {
        let form = Form::new()
            .part("file", Self::file_part(file))
            .text("username", context.username.clone())
            .text("chat_session_id", context.chat_session_id.clone())
            .text("object_key", key.to_string());

        debug!(file = %file.name, key = %key, size = file.size(), "Uploading to storage");
        let response = self
            .client
            .post(join_url(&self.base_url, &self.storage_path))
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_for_response(response, Operation::StorageUpload, &file.name).await);
        }

        let body: StorageResponse = response.json().await.map_err(|e| {
            IngestError::StorageUploadFailed(format!("{}: invalid response: {e}", file.name))
        })?;

        match body {
            StorageResponse {
                success: true,
                gcs_url: Some(url),
                file_name,
                ..
            } if !url.is_empty() => {
                info!(file = %file.name, url = %url, "Stored object");
                Ok(StoredObject {
                    url,
                    file_name: file_name.unwrap_or_else(|| key.to_string()),
                })
            }
            StorageResponse { error, .. } => Err(IngestError::StorageUploadFailed(format!(
                "{}: {}",
                file.name,
                error.unwrap_or_else(|| "storage service reported failure".to_string())
            ))),
        }
    }
}

#[async_trait::async_trait]
impl IIndexingService for BackendClient {
    async fn submit(&self, request: &IndexingRequest) -> Result<serde_json::Value, IngestError> {
        debug!(file = %request.file_name, url = %request.gcs_url, "Submitting for indexing");
        let response = self
            .client
            .post(join_url(&self.base_url, &self.indexing_path))
            .json(request)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(
                error_for_response(response, Operation::Indexing, &request.file_name).await,
            );
        }

        let text = response
            .text()
            .await
            .map_err(|e| IngestError::IndexingFailed(format!("unreadable acknowledgement: {e}")))?;
        let ack = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
        };

        // A 200 carrying `"success": false` is still a rejection
        if ack.get("success").and_then(|v| v.as_bool()) == Some(false) {
            let message = error_message(&ack.to_string())
                .unwrap_or_else(|| "indexing service reported failure".to_string());
            return Err(IngestError::IndexingFailed(message));
        }

        info!(file = %request.file_name, "Indexing accepted");
        Ok(ack)
    }
}
