//! Storage provider port (driven/secondary port)
//!
//! Read-only access to a third-party storage provider. One implementation
//! exists per [`ProviderKind`].
//!
//! ## Design Notes
//!
//! - Returns [`IngestError`] rather than `anyhow::Error`: callers must tell
//!   a permission problem (403) from a missing file (404) to decide whether
//!   a reconnect is worth suggesting.
//! - The credential is passed per call. Adapters hold no token state, so a
//!   reconnect never leaves a stale token inside an adapter.

use crate::domain::{Credential, DownloadedFile, FileListing, IngestError, ProviderKind, RemoteFile};

/// Port trait for provider file operations
#[async_trait::async_trait]
pub trait IStorageProvider: Send + Sync {
    /// Which provider this adapter talks to
    fn kind(&self) -> ProviderKind;

    /// Lists files visible to `credential`, folders excluded
    ///
    /// Pagination is followed until the provider reports no more pages or
    /// `max_files` entries have been collected; in the latter case the
    /// listing is marked `truncated`.
    ///
    /// # Arguments
    /// * `credential` - Live credential for this provider
    /// * `max_files` - Upper bound on the number of returned files
    ///
    /// # Errors
    /// `AccessDenied` on 403, `CredentialExpired` on 401, `ListFailed` for
    /// any other non-success status.
    async fn list_files(
        &self,
        credential: &Credential,
        max_files: usize,
    ) -> Result<FileListing, IngestError>;

    /// Downloads the content of `file`
    ///
    /// # Returns
    /// The file materialized in memory with its MIME type resolved
    ///
    /// # Errors
    /// `AccessDenied` on 403, `NotFound` on 404, `CredentialExpired` on 401,
    /// `DownloadFailed` otherwise.
    async fn download_file(
        &self,
        credential: &Credential,
        file: &RemoteFile,
    ) -> Result<DownloadedFile, IngestError>;
}
