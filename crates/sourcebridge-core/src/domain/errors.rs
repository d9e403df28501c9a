//! Domain error types
//!
//! Two families live here:
//! - [`DomainError`] for value validation and invalid stage transitions
//! - [`IngestError`] for everything that can go wrong while connecting,
//!   listing, downloading, storing or indexing files. Ports return it so
//!   that use cases can tell an access-denied response apart from a
//!   missing file without parsing strings.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Unknown storage provider name
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

/// Errors surfaced by the ingestion flow
///
/// Variants follow the failure taxonomy of the connector, lister,
/// downloader and orchestrator. HTTP status codes are kept where the
/// caller may want to display them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The user abandoned the authorization flow (or it timed out)
    #[error("Authorization cancelled: {0}")]
    AuthCancelled(String),

    /// The provider refused the requested scopes
    #[error("Authorization denied: {0}")]
    AuthDenied(String),

    /// Exchanging the authorization code for a token failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Client configuration (client id, endpoints) is missing or invalid
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// The provider has no live credential
    #[error("Not connected to {0}")]
    NotConnected(String),

    /// The provider rejected the bearer token (HTTP 401)
    #[error("Credential expired or revoked: {0}")]
    CredentialExpired(String),

    /// The credential store could not be read or written
    #[error("Credential store error: {0}")]
    CredentialStore(String),

    /// Listing remote files failed
    #[error("Failed to list files (HTTP {status}): {message}")]
    ListFailed {
        /// HTTP status code, 0 when no response was received
        status: u16,
        /// Provider message
        message: String,
    },

    /// Permission or scope problem (HTTP 403)
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The remote file no longer exists (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Download failed for any other reason
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// The intermediate storage upload failed
    #[error("Storage upload failed: {0}")]
    StorageUploadFailed(String),

    /// The indexing endpoint rejected the submission
    #[error("Indexing failed: {0}")]
    IndexingFailed(String),

    /// No user identity or chat session is available
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// Input did not pass validation
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The operation was cancelled through its cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// Every file of a batch failed
    #[error("All {} files failed to upload: {}", files.len(), files.join(", "))]
    AllFailed {
        /// Names of every file in the batch
        files: Vec<String>,
    },

    /// Transport-level failure (DNS, TLS, connection reset, timeout)
    #[error("Network error: {0}")]
    Network(String),
}

impl IngestError {
    /// True for permission problems, including backend messages that only
    /// carry the text "Access denied".
    pub fn is_access_denied(&self) -> bool {
        match self {
            IngestError::AccessDenied(_) => true,
            other => other.to_string().contains("Access denied"),
        }
    }

    /// True when re-running the authorization flow is the likely fix
    pub fn suggests_reconnect(&self) -> bool {
        self.is_access_denied() || matches!(self, IngestError::CredentialExpired(_))
    }

    /// Short machine-readable code, used in logs and JSON output
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::AuthCancelled(_) => "auth_cancelled",
            IngestError::AuthDenied(_) => "auth_denied",
            IngestError::TokenExchangeFailed(_) => "token_exchange_failed",
            IngestError::MissingConfiguration(_) => "missing_configuration",
            IngestError::NotConnected(_) => "not_connected",
            IngestError::CredentialExpired(_) => "credential_expired",
            IngestError::CredentialStore(_) => "credential_store",
            IngestError::ListFailed { .. } => "list_failed",
            IngestError::AccessDenied(_) => "access_denied",
            IngestError::NotFound(_) => "not_found",
            IngestError::DownloadFailed(_) => "download_failed",
            IngestError::StorageUploadFailed(_) => "storage_upload_failed",
            IngestError::IndexingFailed(_) => "indexing_failed",
            IngestError::NotAuthenticated(_) => "not_authenticated",
            IngestError::ValidationFailed(_) => "validation_failed",
            IngestError::Cancelled => "cancelled",
            IngestError::AllFailed { .. } => "all_failed",
            IngestError::Network(_) => "network",
        }
    }
}

impl From<DomainError> for IngestError {
    fn from(err: DomainError) -> Self {
        IngestError::ValidationFailed(err.to_string())
    }
}
