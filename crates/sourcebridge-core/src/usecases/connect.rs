//! Connection use case
//!
//! Owns the credential of one provider for the lifetime of the process.
//! Every other component borrows the credential through
//! [`ProviderConnector::credential`] and never mutates it.

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    domain::{Credential, IngestError, ProviderKind},
    ports::{ICredentialStore, IOAuthFlow},
};

/// Tokens closer than this to their expiry are refreshed before use
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Connection lifecycle for a single provider
///
/// Concurrent [`connect`](Self::connect) calls are serialised: the first
/// caller runs the authorization flow, later callers wait and then observe
/// the credential it produced.
pub struct ProviderConnector {
    provider: ProviderKind,
    flow: Arc<dyn IOAuthFlow + Send + Sync>,
    store: Arc<dyn ICredentialStore + Send + Sync>,
    credential: RwLock<Option<Credential>>,
    connect_lock: Mutex<()>,
}

impl ProviderConnector {
    /// Creates a disconnected connector
    ///
    /// # Arguments
    ///
    /// * `flow` - Interactive authorization for the provider
    /// * `store` - Persistence for the credential
    pub fn new(
        flow: Arc<dyn IOAuthFlow + Send + Sync>,
        store: Arc<dyn ICredentialStore + Send + Sync>,
    ) -> Self {
        Self {
            provider: flow.provider(),
            flow,
            store,
            credential: RwLock::new(None),
            connect_lock: Mutex::new(()),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Returns the live credential, running the authorization flow if needed
    ///
    /// # Errors
    ///
    /// Propagates the authorization error unchanged, or `CredentialStore`
    /// if the new credential could not be persisted. A failed attempt
    /// leaves the connector disconnected.
    pub async fn connect(&self) -> Result<Credential, IngestError> {
        if let Some(credential) = self.credential().await {
            return Ok(credential);
        }

        let _guard = self.connect_lock.lock().await;

        // Another caller may have finished connecting while we waited
        if let Some(credential) = self.credential().await {
            debug!(provider = %self.provider, "Connection established by concurrent caller");
            return Ok(credential);
        }

        info!(provider = %self.provider, "Starting authorization flow");
        let credential = self.flow.authorize().await.map_err(|e| {
            warn!(provider = %self.provider, error = %e, "Authorization failed");
            e
        })?;

        self.check_issuer(&credential)?;
        self.store.save(&credential).await?;
        *self.credential.write().await = Some(credential.clone());

        info!(provider = %self.provider, "Connected");
        Ok(credential)
    }

    /// Clears the persisted credential and the in-memory state
    ///
    /// The in-memory credential is dropped even when the store fails, so a
    /// failed disconnect never leaves a usable token behind.
    pub async fn disconnect(&self) -> Result<(), IngestError> {
        if let Some(mut credential) = self.credential.write().await.take() {
            credential.revoke();
        }
        self.store.clear(self.provider).await?;
        info!(provider = %self.provider, "Disconnected");
        Ok(())
    }

    /// Restores a previously stored credential
    ///
    /// The token is not validated against the provider; an expired token
    /// surfaces on the first API call.
    ///
    /// # Returns
    ///
    /// Whether the connector is connected afterwards
    pub async fn check_existing_connection(&self) -> Result<bool, IngestError> {
        if self.is_connected().await {
            return Ok(true);
        }

        match self.store.load(self.provider).await? {
            Some(credential) if credential.is_connected() => {
                debug!(provider = %self.provider, "Restored stored credential");
                *self.credential.write().await = Some(credential);
                Ok(true)
            }
            Some(_) => {
                debug!(provider = %self.provider, "Stored credential is revoked");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Discards the current credential and authorizes again
    pub async fn force_reconnect(&self) -> Result<Credential, IngestError> {
        info!(provider = %self.provider, "Forcing reconnect");
        self.disconnect().await?;
        self.connect().await
    }

    pub async fn is_connected(&self) -> bool {
        self.credential
            .read()
            .await
            .as_ref()
            .is_some_and(Credential::is_connected)
    }

    /// Returns a copy of the live credential, if any
    pub async fn credential(&self) -> Option<Credential> {
        self.credential
            .read()
            .await
            .as_ref()
            .filter(|c| c.is_connected())
            .cloned()
    }

    /// Returns the live credential or `NotConnected`
    ///
    /// A credential about to expire is refreshed first when it carries a
    /// refresh token. If that refresh fails the current token is still
    /// returned while it is valid.
    ///
    /// # Errors
    ///
    /// `NotConnected` without a credential; `CredentialExpired` when the
    /// token has expired and could not be refreshed.
    pub async fn require_credential(&self) -> Result<Credential, IngestError> {
        let credential = self.credential().await.ok_or_else(|| self.not_connected())?;
        if credential.refresh_token().is_none()
            || !credential.expires_within(Duration::minutes(REFRESH_MARGIN_MINUTES))
        {
            return Ok(credential);
        }

        match self.refresh_credential(&credential).await {
            Ok(refreshed) => Ok(refreshed),
            Err(e) if !credential.is_expired() => {
                warn!(provider = %self.provider, error = %e, "Token refresh failed, using current token");
                Ok(credential)
            }
            Err(e) => Err(e),
        }
    }

    /// Replaces `stale` with a freshly refreshed credential
    ///
    /// Called when the provider rejected `stale`. Callers racing on the
    /// same stale token share one refresh: later callers get the token the
    /// first one obtained.
    ///
    /// # Errors
    ///
    /// `NotConnected` after a disconnect, otherwise the flow's refresh
    /// error (usually `CredentialExpired`), after which only a reconnect
    /// helps.
    pub async fn refresh_credential(&self, stale: &Credential) -> Result<Credential, IngestError> {
        let _guard = self.connect_lock.lock().await;

        let current = self.credential().await.ok_or_else(|| self.not_connected())?;
        if current.access_token() != stale.access_token() {
            debug!(provider = %self.provider, "Credential already refreshed by concurrent caller");
            return Ok(current);
        }

        let refreshed = self.flow.refresh(&current).await.map_err(|e| {
            warn!(provider = %self.provider, error = %e, "Token refresh failed");
            e
        })?;
        self.check_issuer(&refreshed)?;

        self.store.save(&refreshed).await?;
        *self.credential.write().await = Some(refreshed.clone());

        info!(provider = %self.provider, "Credential refreshed");
        Ok(refreshed)
    }

    fn check_issuer(&self, credential: &Credential) -> Result<(), IngestError> {
        if credential.provider() != self.provider {
            return Err(IngestError::TokenExchangeFailed(format!(
                "expected a {} credential, got {}",
                self.provider,
                credential.provider()
            )));
        }
        Ok(())
    }

    fn not_connected(&self) -> IngestError {
        IngestError::NotConnected(self.provider.display_name().to_string())
    }
}
