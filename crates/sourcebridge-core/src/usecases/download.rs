//! File download use case
//!
//! Fetches provider files into memory. Multi-file downloads are launched
//! together and every download settles independently.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    domain::{DownloadedFile, FailedUpload, IngestError, RemoteFile},
    ports::IStorageProvider,
    usecases::ProviderConnector,
};

/// Result of a multi-file download, in input order
#[derive(Debug, Default, Serialize)]
pub struct DownloadReport {
    #[serde(skip)]
    pub succeeded: Vec<DownloadedFile>,
    pub failed: Vec<FailedUpload>,
}

impl DownloadReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Use case for downloading provider files
pub struct DownloadFilesUseCase {
    provider: Arc<dyn IStorageProvider + Send + Sync>,
    connector: Arc<ProviderConnector>,
}

impl DownloadFilesUseCase {
    pub fn new(
        provider: Arc<dyn IStorageProvider + Send + Sync>,
        connector: Arc<ProviderConnector>,
    ) -> Self {
        Self {
            provider,
            connector,
        }
    }

    /// Downloads one file
    ///
    /// # Errors
    ///
    /// `NotConnected` without a live credential, otherwise the provider's
    /// classified error (`AccessDenied`, `NotFound`, `CredentialExpired`,
    /// `DownloadFailed`). A rejected token is refreshed and the download
    /// retried once.
    pub async fn download_one(&self, file: &RemoteFile) -> Result<DownloadedFile, IngestError> {
        let credential = self.connector.require_credential().await?;
        debug!(provider = %self.provider.kind(), file = %file.name, "Downloading file");

        let downloaded = match self.provider.download_file(&credential, file).await {
            Err(IngestError::CredentialExpired(reason)) => {
                debug!(file = %file.name, %reason, "Token rejected, refreshing");
                let refreshed = self.connector.refresh_credential(&credential).await?;
                self.provider.download_file(&refreshed, file).await?
            }
            result => result?,
        };
        debug!(
            file = %downloaded.name,
            size = downloaded.size(),
            mime_type = %downloaded.mime_type,
            "Download complete"
        );
        Ok(downloaded)
    }

    /// Downloads several files concurrently
    ///
    /// Per-file failures are collected in the report; only a missing
    /// connection fails the whole call.
    pub async fn download_many(&self, files: &[RemoteFile]) -> Result<DownloadReport, IngestError> {
        let credential = self.connector.require_credential().await?;

        let mut results = join_all(
            files
                .iter()
                .map(|file| self.provider.download_file(&credential, file)),
        )
        .await;

        let rejected: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| matches!(r, Err(IngestError::CredentialExpired(_))))
            .map(|(i, _)| i)
            .collect();
        if !rejected.is_empty() {
            match self.connector.refresh_credential(&credential).await {
                Ok(refreshed) => {
                    let retried = join_all(
                        rejected
                            .iter()
                            .map(|&i| self.provider.download_file(&refreshed, &files[i])),
                    )
                    .await;
                    for (i, result) in rejected.into_iter().zip(retried) {
                        results[i] = result;
                    }
                }
                Err(e) => warn!(error = %e, "Token refresh failed, keeping rejected downloads"),
            }
        }

        let mut report = DownloadReport::default();
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(downloaded) => report.succeeded.push(downloaded),
                Err(e) => {
                    warn!(file = %file.name, error = %e, "Download failed");
                    report.failed.push(
                        FailedUpload::new(file.id.clone(), &file.name, e.to_string())
                            .with_access_denied(e.is_access_denied()),
                    );
                }
            }
        }

        info!(
            provider = %self.provider.kind(),
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Downloads settled"
        );
        Ok(report)
    }
}
