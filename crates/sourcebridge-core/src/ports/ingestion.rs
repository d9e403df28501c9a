//! Ingestion backend ports
//!
//! The backend exposes two endpoints: an intermediate object storage that
//! accepts the raw file, and an indexing endpoint that makes the stored
//! object retrievable inside a chat session.

use serde::{Deserialize, Serialize};

use crate::domain::{DownloadedFile, IngestError, ObjectKey};

/// Who a batch is being ingested for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadContext {
    pub username: String,
    pub chat_session_id: String,
}

impl UploadContext {
    pub fn new(username: impl Into<String>, chat_session_id: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            chat_session_id: chat_session_id.into(),
        }
    }
}

/// Object accepted by intermediate storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Storage URL handed to the indexing endpoint
    pub url: String,
    /// Object name as reported by storage
    pub file_name: String,
}

/// Body of an indexing submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingRequest {
    pub gcs_url: String,
    pub username: String,
    pub chat_session_id: String,
    pub file_name: String,
}

impl IndexingRequest {
    /// Builds the submission for an object stored on behalf of `context`
    pub fn for_object(stored: &StoredObject, context: &UploadContext, file_name: &str) -> Self {
        Self {
            gcs_url: stored.url.clone(),
            username: context.username.clone(),
            chat_session_id: context.chat_session_id.clone(),
            file_name: file_name.to_string(),
        }
    }
}

/// Port trait for intermediate object storage
#[async_trait::async_trait]
pub trait IObjectStorage: Send + Sync {
    /// Uploads `file` under `key`
    ///
    /// # Errors
    /// `AccessDenied` on 403, `StorageUploadFailed` on any other rejection
    /// or when the service reports `success: false`.
    async fn upload(
        &self,
        file: &DownloadedFile,
        key: &ObjectKey,
        context: &UploadContext,
    ) -> Result<StoredObject, IngestError>;
}

/// Port trait for the retrieval-indexing endpoint
#[async_trait::async_trait]
pub trait IIndexingService: Send + Sync {
    /// Submits a stored object for indexing and returns the acknowledgement body
    ///
    /// # Errors
    /// `IndexingFailed` carrying the service's `error` field when present.
    async fn submit(&self, request: &IndexingRequest) -> Result<serde_json::Value, IngestError>;
}
