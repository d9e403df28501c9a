//! Domain entities and business logic
//!
//! This module contains the core domain types for SourceBridge:
//! - Newtypes for type-safe identifiers and validated domain types
//! - Provider credentials
//! - Remote file snapshots and downloaded content
//! - Upload tasks and their stage machine
//! - Batch outcomes
//! - Domain-specific error types

pub mod batch;
pub mod credential;
pub mod errors;
pub mod newtypes;
pub mod remote_file;
pub mod upload_task;

// Re-export commonly used types
pub use batch::{BatchResult, BatchSummary, FailedUpload, UploadOutcome};
pub use credential::Credential;
pub use errors::{DomainError, IngestError};
pub use newtypes::*;
pub use remote_file::{DownloadedFile, FileListing, RemoteFile, DEFAULT_MIME_TYPE};
pub use upload_task::{UploadStage, UploadTask};
