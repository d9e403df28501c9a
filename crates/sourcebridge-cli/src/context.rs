//! Wiring of adapters and use cases for one CLI invocation

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use sourcebridge_connectors::{
    auth::{KeyringCredentialStore, PkceAuthorizer},
    backend::BackendClient,
    client::build_http_client,
    storage_provider,
};
use sourcebridge_core::{
    config::Config,
    domain::ProviderKind,
    ports::IStorageProvider,
    usecases::{DownloadFilesUseCase, ListFilesUseCase, ProviderConnector},
};
use tracing::debug;

/// Everything a command needs, built once from configuration
pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub profile: String,
    http: reqwest::Client,
}

impl AppContext {
    /// Builds the context; `profile` overrides `auth.profile`
    ///
    /// # Errors
    /// Fails when the override is not a valid profile name, since it
    /// becomes part of the keyring account key.
    pub fn new(mut config: Config, config_path: PathBuf, profile: Option<String>) -> Result<Self> {
        if let Some(profile) = profile {
            config.auth.profile = profile;
            if let Some(err) = config
                .validate()
                .into_iter()
                .find(|e| e.field == "auth.profile")
            {
                bail!("Invalid --profile '{}': {}", config.auth.profile, err.message);
            }
        }
        let http = build_http_client(Duration::from_secs(config.backend.timeout_secs))
            .context("Failed to build HTTP client")?;
        let profile = config.auth.profile.clone();
        Ok(Self {
            config,
            config_path,
            profile,
            http,
        })
    }

    /// Connector for `provider`, with any stored credential restored
    pub async fn connector(&self, provider: ProviderKind) -> Result<Arc<ProviderConnector>> {
        let flow = PkceAuthorizer::from_config(provider, &self.config, self.http.clone())
            .with_url_sink(Arc::new(|url: &str| {
                eprintln!("Open this URL to authorize SourceBridge:\n\n  {url}\n");
            }));
        let store = KeyringCredentialStore::new(self.profile.clone());

        let connector = Arc::new(ProviderConnector::new(Arc::new(flow), Arc::new(store)));
        let restored = connector
            .check_existing_connection()
            .await
            .with_context(|| format!("Failed to read stored {} credential", provider.display_name()))?;
        debug!(provider = %provider, profile = %self.profile, restored, "Connector ready");
        Ok(connector)
    }

    pub fn storage_provider(&self, provider: ProviderKind) -> Arc<dyn IStorageProvider + Send + Sync> {
        storage_provider(provider, &self.config, self.http.clone())
    }

    pub fn backend(&self) -> Arc<BackendClient> {
        Arc::new(BackendClient::new(self.http.clone(), &self.config.backend))
    }

    pub fn lister(&self, provider: ProviderKind, connector: Arc<ProviderConnector>) -> ListFilesUseCase {
        ListFilesUseCase::new(self.storage_provider(provider), connector)
            .with_max_files(self.config.listing.max_files)
    }

    pub fn downloader(
        &self,
        provider: ProviderKind,
        connector: Arc<ProviderConnector>,
    ) -> DownloadFilesUseCase {
        DownloadFilesUseCase::new(self.storage_provider(provider), connector)
    }
}

/// Parses a provider name given on the command line
pub fn parse_provider(value: &str) -> Result<ProviderKind, String> {
    value.parse().map_err(|_| {
        format!("unknown provider '{value}' (expected 'dropbox' or 'google_drive')")
    })
}
