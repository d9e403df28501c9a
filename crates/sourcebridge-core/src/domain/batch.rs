//! Batch outcome types
//!
//! A [`BatchResult`] is produced once every task of a batch is terminal.
//! Its counts are exact: every selected file appears in exactly one of
//! `succeeded` or `failed`.

use serde::{Deserialize, Serialize};

use super::newtypes::{BatchId, RemoteId};

/// Successful ingestion of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    /// Provider id of the ingested file
    pub file_id: RemoteId,
    /// Original file name
    pub file_name: String,
    /// Location of the stored object (gs:// or https URL)
    pub stored_url: String,
    /// Object name reported by the storage service
    pub stored_name: String,
    /// Acknowledgement body returned by the indexing endpoint
    pub indexing_response: serde_json::Value,
}

/// Failed ingestion of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUpload {
    /// Provider id of the file; names are not unique across folders
    pub file_id: RemoteId,
    pub file_name: String,
    pub error_message: String,
    /// Set when the failure was a permission problem that a reconnect may fix
    #[serde(default)]
    pub access_denied: bool,
}

impl FailedUpload {
    pub fn new(
        file_id: RemoteId,
        file_name: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            file_id,
            file_name: file_name.into(),
            error_message: error_message.into(),
            access_denied: false,
        }
    }

    pub fn with_access_denied(mut self, denied: bool) -> Self {
        self.access_denied = denied;
        self
    }
}

/// Aggregate result of one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: BatchId,
    pub succeeded: Vec<UploadOutcome>,
    pub failed: Vec<FailedUpload>,
    /// True when the batch stopped early because it was cancelled
    pub cancelled: bool,
}

impl BatchResult {
    pub fn new(batch_id: BatchId) -> Self {
        Self {
            batch_id,
            succeeded: Vec::new(),
            failed: Vec::new(),
            cancelled: false,
        }
    }

    /// Number of files the batch accounted for
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Returns true if any failure was a permission problem
    pub fn has_access_denied(&self) -> bool {
        self.failed.iter().any(|f| f.access_denied)
    }

    pub fn summary(&self) -> BatchSummary {
        let succeeded = self.succeeded.len();
        let failed = self.failed.len();

        if self.cancelled {
            BatchSummary::Cancelled { succeeded, failed }
        } else if failed == 0 {
            BatchSummary::AllSucceeded { succeeded }
        } else if succeeded == 0 {
            BatchSummary::AllFailed { failed }
        } else {
            BatchSummary::Partial { succeeded, failed }
        }
    }
}

/// Classification used for the end-of-batch notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BatchSummary {
    AllSucceeded { succeeded: usize },
    Partial { succeeded: usize, failed: usize },
    AllFailed { failed: usize },
    Cancelled { succeeded: usize, failed: usize },
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchSummary::AllSucceeded { succeeded } => {
                write!(f, "{} file(s) uploaded successfully", succeeded)
            }
            BatchSummary::Partial { succeeded, failed } => {
                write!(f, "{} succeeded, {} failed", succeeded, failed)
            }
            BatchSummary::AllFailed { failed } => write!(f, "all {} file(s) failed", failed),
            BatchSummary::Cancelled { succeeded, failed } => write!(
                f,
                "cancelled: {} succeeded, {} failed or skipped",
                succeeded, failed
            ),
        }
    }
}
