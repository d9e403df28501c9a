//! Google Drive API v3 adapter
//!
//! Lists with `GET /files`, excluding folders and trashed files, following
//! `nextPageToken`. Binary files download with `?alt=media`; native Google
//! Workspace documents have no binary content and are exported as PDF.

use chrono::{DateTime, Utc};
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder};
use serde::Deserialize;
use sourcebridge_core::{
    config::ProviderConfig,
    domain::{
        Credential, DownloadedFile, FileListing, IngestError, ProviderKind, RemoteFile, RemoteId,
    },
    ports::IStorageProvider,
};
use tracing::{debug, warn};

use crate::client::{error_for_response, join_url, network_error, Operation};

/// Query excluding folders and trashed files
const LIST_QUERY: &str = "mimeType != 'application/vnd.google-apps.folder' and trashed = false";

/// Fields requested for each listed file
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size, modifiedTime)";

/// Prefix of native Google Workspace document types
const WORKSPACE_MIME_PREFIX: &str = "application/vnd.google-apps.";

/// Format used when exporting Workspace documents
const EXPORT_MIME_TYPE: &str = "application/pdf";

// ============================================================================
// Drive API response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: Option<String>,
    /// Drive encodes int64 values as strings
    size: Option<String>,
    modified_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

fn drive_file_to_remote_file(file: DriveFile) -> Option<RemoteFile> {
    let id = match RemoteId::new(file.id) {
        Ok(id) => id,
        Err(e) => {
            warn!(name = %file.name, error = %e, "Skipping Drive file with invalid id");
            return None;
        }
    };

    Some(RemoteFile {
        id,
        path: format!("/{}", file.name),
        size: file
            .size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        modified_at: file.modified_time.unwrap_or_else(Utc::now),
        mime_type: file.mime_type,
        name: file.name,
    })
}

/// Returns true for Google Docs, Sheets, Slides and other native documents
fn is_workspace_document(file: &RemoteFile) -> bool {
    file.mime_type
        .as_deref()
        .is_some_and(|m| m.starts_with(WORKSPACE_MIME_PREFIX))
}

/// Name given to an exported document
fn export_file_name(name: &str) -> String {
    if name.to_ascii_lowercase().ends_with(".pdf") {
        name.to_string()
    } else {
        format!("{name}.pdf")
    }
}

// ============================================================================
// GoogleDriveProvider
// ============================================================================

/// [`IStorageProvider`] implementation for Google Drive
pub struct GoogleDriveProvider {
    client: Client,
    api_base_url: String,
    page_size: u32,
}

impl GoogleDriveProvider {
    /// Creates the adapter from the `google_drive` configuration section
    pub fn new(client: Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            api_base_url: config.api_base_url.clone(),
            page_size: config.page_size,
        }
    }

    /// Creates the adapter against a custom base URL (useful for testing)
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_base_url: base_url.into(),
            page_size: ProviderConfig::google_drive().page_size,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    fn get(&self, credential: &Credential, path: &str) -> RequestBuilder {
        self.client
            .get(join_url(&self.api_base_url, path))
            .bearer_auth(credential.access_token())
    }
}

#[async_trait::async_trait]
impl IStorageProvider for GoogleDriveProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleDrive
    }

    async fn list_files(
        &self,
        credential: &Credential,
        max_files: usize,
    ) -> Result<FileListing, IngestError> {
        let mut listing = FileListing::default();
        let mut page_token: Option<String> = None;
        let page_size = self.page_size.to_string();

        loop {
            let mut request = self.get(credential, "files").query(&[
                ("q", LIST_QUERY),
                ("fields", LIST_FIELDS),
                ("pageSize", page_size.as_str()),
                ("orderBy", "modifiedTime desc"),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await.map_err(network_error)?;
            if !response.status().is_success() {
                return Err(error_for_response(response, Operation::List, "files").await);
            }

            let page: FileListResponse =
                response.json().await.map_err(|e| IngestError::ListFailed {
                    status: 200,
                    message: format!("invalid files response: {e}"),
                })?;
            debug!(
                files = page.files.len(),
                has_more = page.next_page_token.is_some(),
                "Received Drive listing page"
            );

            listing
                .files
                .extend(page.files.into_iter().filter_map(drive_file_to_remote_file));

            if listing.files.len() >= max_files {
                listing.truncated =
                    listing.files.len() > max_files || page.next_page_token.is_some();
                listing.files.truncate(max_files);
                break;
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(listing)
    }

    async fn download_file(
        &self,
        credential: &Credential,
        file: &RemoteFile,
    ) -> Result<DownloadedFile, IngestError> {
        let export = is_workspace_document(file);
        let request = if export {
            self.get(credential, &format!("files/{}/export", file.id))
                .query(&[("mimeType", EXPORT_MIME_TYPE)])
        } else {
            self.get(credential, &format!("files/{}", file.id))
                .query(&[("alt", "media")])
        };

        let response = request.send().await.map_err(network_error)?;
        if !response.status().is_success() {
            return Err(error_for_response(response, Operation::Download, &file.name).await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| IngestError::DownloadFailed(format!("{}: {e}", file.name)))?;

        debug!(file = %file.name, size = bytes.len(), export, "Downloaded from Google Drive");

        if export {
            let mut downloaded = DownloadedFile::from_remote(file, bytes.to_vec(), None);
            downloaded.name = export_file_name(&file.name);
            downloaded.mime_type = EXPORT_MIME_TYPE.to_string();
            return Ok(downloaded);
        }

        Ok(DownloadedFile::from_remote(
            file,
            bytes.to_vec(),
            content_type.as_deref(),
        ))
    }
}
