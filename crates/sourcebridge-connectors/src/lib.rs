//! SourceBridge Connectors - adapters for the core ports
//!
//! Provides async adapters for:
//! - OAuth2 authentication (Authorization Code with PKCE) for Dropbox and Google Drive
//! - Credential persistence in the system keyring
//! - Listing and downloading provider files
//! - The ingestion backend (intermediate storage upload and indexing submission)
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 PKCE flow, loopback callback server, keyring store
//! - [`client`] - Shared HTTP client and status classification
//! - [`dropbox`] - Dropbox API v2 adapter
//! - [`gdrive`] - Google Drive API v3 adapter
//! - [`backend`] - Ingestion backend client

pub mod auth;
pub mod backend;
pub mod client;
pub mod dropbox;
pub mod gdrive;

use std::sync::Arc;

use sourcebridge_core::{config::Config, domain::ProviderKind, ports::IStorageProvider};

/// Builds the storage adapter for `provider` from configuration
///
/// All adapters share `http`, so connection pools and timeouts are common.
pub fn storage_provider(
    provider: ProviderKind,
    config: &Config,
    http: reqwest::Client,
) -> Arc<dyn IStorageProvider + Send + Sync> {
    let section = config.provider(provider);
    match provider {
        ProviderKind::Dropbox => Arc::new(dropbox::DropboxProvider::new(http, section)),
        ProviderKind::GoogleDrive => Arc::new(gdrive::GoogleDriveProvider::new(http, section)),
    }
}
