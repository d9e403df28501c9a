//! Provider credential
//!
//! A [`Credential`] is the bearer token obtained from one provider's OAuth
//! flow. It is owned by the provider's connector; the lister, downloader
//! and orchestrator only read it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::ProviderKind;

/// Bearer credential for one storage provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Provider that issued the token
    provider: ProviderKind,
    /// Bearer token for API requests
    access_token: String,
    /// Long-lived token, when the provider issued one
    #[serde(default)]
    refresh_token: Option<String>,
    /// When the access token expires, if the provider said so
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    /// Cleared when the credential is revoked locally
    connected: bool,
}

impl Credential {
    /// Creates a connected credential
    pub fn new(provider: ProviderKind, access_token: impl Into<String>) -> Self {
        Self {
            provider,
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            connected: true,
        }
    }

    /// Sets the refresh token
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    /// Sets the expiry timestamp
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// True while the credential has not been revoked locally
    ///
    /// Expiry is not checked here: expired tokens are discovered on the
    /// first rejected API call.
    pub fn is_connected(&self) -> bool {
        self.connected && !self.access_token.is_empty()
    }

    /// Marks the credential as no longer usable
    pub fn revoke(&mut self) {
        self.connected = false;
    }

    /// Returns true if the access token has a known expiry in the past
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|t| Utc::now() >= t).unwrap_or(false)
    }

    /// Returns true if the access token will expire within the given duration
    pub fn expires_within(&self, duration: Duration) -> bool {
        self.expires_at
            .map(|t| Utc::now() + duration >= t)
            .unwrap_or(false)
    }
}

// Access tokens must never reach log output.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("provider", &self.provider)
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("connected", &self.connected)
            .finish()
    }
}
