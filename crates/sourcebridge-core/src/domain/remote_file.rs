//! Remote file snapshots and downloaded file content

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RemoteId;

/// MIME type used when neither the provider nor the extension tells us more
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Immutable metadata snapshot of one file as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Provider-specific identifier
    pub id: RemoteId,
    /// File name, without directories
    pub name: String,
    /// Display path inside the provider (Dropbox path, or `/<name>` for Drive)
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time reported by the provider
    pub modified_at: DateTime<Utc>,
    /// MIME type when the provider reports one
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl RemoteFile {
    /// MIME type to attach to the downloaded content
    ///
    /// Uses the provider value, then the file extension, then
    /// [`DEFAULT_MIME_TYPE`].
    pub fn effective_mime_type(&self) -> String {
        self.mime_type
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .or_else(|| mime_guess::from_path(&self.name).first_raw().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
    }
}

/// Result of one listing call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    /// Files in provider order
    pub files: Vec<RemoteFile>,
    /// Set when pagination stopped at the configured cap
    pub truncated: bool,
}

/// File content materialized in memory
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub name: String,
    pub mime_type: String,
    pub last_modified: DateTime<Utc>,
    pub bytes: Vec<u8>,
}

impl DownloadedFile {
    /// Builds the in-memory file for `remote` with the fetched `bytes`
    ///
    /// `content_type` is the MIME type announced by the download response;
    /// it is ignored when it only says `application/octet-stream`.
    pub fn from_remote(remote: &RemoteFile, bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        let mime_type = content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
            .filter(|ct| !ct.is_empty() && *ct != DEFAULT_MIME_TYPE)
            .map(str::to_string)
            .unwrap_or_else(|| remote.effective_mime_type());

        Self {
            name: remote.name.clone(),
            mime_type,
            last_modified: remote.modified_at,
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl std::fmt::Debug for DownloadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("last_modified", &self.last_modified)
            .field("size", &self.bytes.len())
            .finish()
    }
}
