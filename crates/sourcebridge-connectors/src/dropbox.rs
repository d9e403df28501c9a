//! Dropbox API v2 adapter
//!
//! Listing uses the RPC endpoints on the `api` host
//! (`files/list_folder` then `files/list_folder/continue` while `has_more`);
//! downloads use the `content` host with the argument passed in the
//! `Dropbox-API-Arg` header.

use chrono::{DateTime, Utc};
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Deserialize;
use serde_json::json;
use sourcebridge_core::{
    config::ProviderConfig,
    domain::{
        Credential, DownloadedFile, FileListing, IngestError, ProviderKind, RemoteFile, RemoteId,
    },
    ports::IStorageProvider,
};
use tracing::{debug, warn};

use crate::client::{error_for_response, join_url, network_error, Operation};

// ============================================================================
// Dropbox API response types
// ============================================================================

/// One entry of a `list_folder` page
#[derive(Debug, Deserialize)]
struct DropboxEntry {
    #[serde(rename = ".tag")]
    tag: String,
    name: String,
    id: Option<String>,
    path_display: Option<String>,
    size: Option<u64>,
    server_modified: Option<DateTime<Utc>>,
}

/// Response of `files/list_folder` and `files/list_folder/continue`
#[derive(Debug, Deserialize)]
struct ListFolderResult {
    entries: Vec<DropboxEntry>,
    cursor: String,
    has_more: bool,
}

/// Converts a listing entry into a [`RemoteFile`]
///
/// Folders, deleted entries and entries without a usable id are dropped.
fn entry_to_remote_file(entry: DropboxEntry) -> Option<RemoteFile> {
    if entry.tag != "file" {
        return None;
    }

    let id = match entry.id.as_deref().map(RemoteId::new) {
        Some(Ok(id)) => id,
        _ => {
            warn!(name = %entry.name, "Skipping Dropbox entry without a valid id");
            return None;
        }
    };

    Some(RemoteFile {
        id,
        path: entry
            .path_display
            .unwrap_or_else(|| format!("/{}", entry.name)),
        name: entry.name,
        size: entry.size.unwrap_or(0),
        modified_at: entry.server_modified.unwrap_or_else(Utc::now),
        mime_type: None,
    })
}

// ============================================================================
// DropboxProvider
// ============================================================================

/// [`IStorageProvider`] implementation for Dropbox
pub struct DropboxProvider {
    client: Client,
    api_base_url: String,
    content_base_url: String,
    page_size: u32,
}

impl DropboxProvider {
    /// Creates the adapter from the `dropbox` configuration section
    pub fn new(client: Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            api_base_url: config.api_base_url.clone(),
            content_base_url: config.content_base_url.clone(),
            page_size: config.page_size,
        }
    }

    /// Creates the adapter with both hosts pointing at `base_url` (useful for testing)
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            api_base_url: base_url.clone(),
            content_base_url: base_url,
            page_size: ProviderConfig::dropbox().page_size,
        }
    }

    async fn rpc(
        &self,
        credential: &Credential,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<ListFolderResult, IngestError> {
        let response = self
            .client
            .post(join_url(&self.api_base_url, endpoint))
            .bearer_auth(credential.access_token())
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_for_response(response, Operation::List, endpoint).await);
        }

        response.json().await.map_err(|e| IngestError::ListFailed {
            status: 200,
            message: format!("invalid {endpoint} response: {e}"),
        })
    }
}

#[async_trait::async_trait]
impl IStorageProvider for DropboxProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Dropbox
    }

    async fn list_files(
        &self,
        credential: &Credential,
        max_files: usize,
    ) -> Result<FileListing, IngestError> {
        let mut listing = FileListing::default();

        let mut page = self
            .rpc(
                credential,
                "files/list_folder",
                json!({
                    "path": "",
                    "recursive": true,
                    "include_deleted": false,
                    "limit": self.page_size,
                }),
            )
            .await?;

        loop {
            debug!(
                entries = page.entries.len(),
                has_more = page.has_more,
                "Received Dropbox listing page"
            );
            listing
                .files
                .extend(page.entries.into_iter().filter_map(entry_to_remote_file));

            if listing.files.len() >= max_files {
                listing.truncated = listing.files.len() > max_files || page.has_more;
                listing.files.truncate(max_files);
                break;
            }
            if !page.has_more {
                break;
            }

            page = self
                .rpc(
                    credential,
                    "files/list_folder/continue",
                    json!({ "cursor": page.cursor }),
                )
                .await?;
        }

        Ok(listing)
    }

    async fn download_file(
        &self,
        credential: &Credential,
        file: &RemoteFile,
    ) -> Result<DownloadedFile, IngestError> {
        let arg = json!({ "path": file.id.as_str() });

        let response = self
            .client
            .post(join_url(&self.content_base_url, "files/download"))
            .bearer_auth(credential.access_token())
            .header("Dropbox-API-Arg", arg.to_string())
            .send()
            .await
            .map_err(network_error)?;

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

        debug!(file = %file.name, size = bytes.len(), "Downloaded from Dropbox");
        Ok(DownloadedFile::from_remote(
            file,
            bytes.to_vec(),
            content_type.as_deref(),
        ))
    }
}
