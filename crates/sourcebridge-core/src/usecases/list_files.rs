//! File listing use case
//!
//! Lists the files visible to the connector's live credential. Results are
//! cached per access token: a reconnect produces a new token and therefore
//! a fresh listing, while repeated calls with the same token hit the cache.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    domain::{FileListing, IngestError},
    ports::IStorageProvider,
    usecases::ProviderConnector,
};

/// Default cap on the number of listed files
pub const DEFAULT_MAX_FILES: usize = 1000;

struct CachedListing {
    access_token: String,
    listing: FileListing,
}

/// Use case for listing a provider's files
pub struct ListFilesUseCase {
    provider: Arc<dyn IStorageProvider + Send + Sync>,
    connector: Arc<ProviderConnector>,
    max_files: usize,
    cache: Mutex<Option<CachedListing>>,
}

impl ListFilesUseCase {
    /// Creates a new ListFilesUseCase
    ///
    /// # Arguments
    ///
    /// * `provider` - Adapter for the provider's listing endpoint
    /// * `connector` - Source of the live credential
    pub fn new(
        provider: Arc<dyn IStorageProvider + Send + Sync>,
        connector: Arc<ProviderConnector>,
    ) -> Self {
        Self {
            provider,
            connector,
            max_files: DEFAULT_MAX_FILES,
            cache: Mutex::new(None),
        }
    }

    /// Sets the pagination cap
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files.max(1);
        self
    }

    /// Returns the file listing, from cache when the credential is unchanged
    ///
    /// # Errors
    ///
    /// `NotConnected` when there is no live credential; provider errors
    /// are returned unchanged and never cached. A rejected token is
    /// refreshed and the listing retried once.
    pub async fn list(&self) -> Result<FileListing, IngestError> {
        let mut credential = self.connector.require_credential().await?;

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.access_token == credential.access_token() {
                debug!(
                    provider = %self.provider.kind(),
                    count = cached.listing.files.len(),
                    "Listing served from cache"
                );
                return Ok(cached.listing.clone());
            }
        }

        let listing = match self.provider.list_files(&credential, self.max_files).await {
            Err(IngestError::CredentialExpired(reason)) => {
                debug!(provider = %self.provider.kind(), %reason, "Token rejected, refreshing");
                credential = self.connector.refresh_credential(&credential).await?;
                self.provider
                    .list_files(&credential, self.max_files)
                    .await?
            }
            result => result?,
        };

        if listing.truncated {
            warn!(
                provider = %self.provider.kind(),
                max_files = self.max_files,
                "Listing truncated at configured cap"
            );
        }
        info!(
            provider = %self.provider.kind(),
            count = listing.files.len(),
            "Listed files"
        );

        *cache = Some(CachedListing {
            access_token: credential.access_token().to_string(),
            listing: listing.clone(),
        });
        Ok(listing)
    }

    /// Discards the cache and lists again
    pub async fn refresh(&self) -> Result<FileListing, IngestError> {
        self.invalidate().await;
        self.list().await
    }

    /// Discards the cached listing
    pub async fn invalidate(&self) {
        self.cache.lock().await.take();
    }
}
