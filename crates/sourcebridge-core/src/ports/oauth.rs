//! Authorization port
//!
//! Runs the provider's interactive consent flow. Adapters open a browser
//! and wait for the redirect; tests substitute a canned credential.

use crate::domain::{Credential, IngestError, ProviderKind};

/// Port trait for an interactive OAuth authorization
#[async_trait::async_trait]
pub trait IOAuthFlow: Send + Sync {
    /// Provider this flow authorizes against
    fn provider(&self) -> ProviderKind;

    /// Performs one complete authorization and returns the new credential
    ///
    /// # Errors
    /// - `MissingConfiguration` when no client id is configured
    /// - `AuthCancelled` when the user never completed the flow
    /// - `AuthDenied` when the provider redirected with an error
    /// - `TokenExchangeFailed` when the code could not be exchanged
    async fn authorize(&self) -> Result<Credential, IngestError>;

    /// Trades the credential's refresh token for a new access token
    ///
    /// # Errors
    /// `CredentialExpired` when there is no refresh token or the provider
    /// rejects it; the caller then has to authorize again.
    async fn refresh(&self, credential: &Credential) -> Result<Credential, IngestError> {
        let _ = credential;
        Err(IngestError::CredentialExpired(format!(
            "{} does not support token refresh",
            self.provider().display_name()
        )))
    }
}
