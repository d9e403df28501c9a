//! Credential store port
//!
//! Credentials are keyed by provider; implementations add their own
//! namespace (the profile) so that independent sessions never share a key.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::domain::{Credential, IngestError, ProviderKind};

/// Port trait for credential persistence
#[async_trait::async_trait]
pub trait ICredentialStore: Send + Sync {
    /// Loads the stored credential for `provider`, if any
    async fn load(&self, provider: ProviderKind) -> Result<Option<Credential>, IngestError>;

    /// Stores `credential`, replacing any previous one for the same provider
    async fn save(&self, credential: &Credential) -> Result<(), IngestError>;

    /// Removes the credential for `provider`; clearing a missing entry is not an error
    async fn clear(&self, provider: ProviderKind) -> Result<(), IngestError>;
}

/// Process-local credential store
///
/// Used in tests and when the system keyring is unavailable.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    entries: Mutex<HashMap<ProviderKind, Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `credential`
    pub fn with_credential(credential: Credential) -> Self {
        let mut entries = HashMap::new();
        entries.insert(credential.provider(), credential);
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait::async_trait]
impl ICredentialStore for InMemoryCredentialStore {
    async fn load(&self, provider: ProviderKind) -> Result<Option<Credential>, IngestError> {
        Ok(self.entries.lock().await.get(&provider).cloned())
    }

    async fn save(&self, credential: &Credential) -> Result<(), IngestError> {
        self.entries
            .lock()
            .await
            .insert(credential.provider(), credential.clone());
        Ok(())
    }

    async fn clear(&self, provider: ProviderKind) -> Result<(), IngestError> {
        self.entries.lock().await.remove(&provider);
        Ok(())
    }
}
