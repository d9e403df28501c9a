//! UploadTask domain entity
//!
//! One [`UploadTask`] tracks a single file through a batch.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//!   │ Downloading │──►│ Uploading │──►│ Processing │──►│ Complete │
//!   │     0%      │   │    30%    │   │    70%     │   │   100%   │
//!   └─────────────┘   └───────────┘   └────────────┘   └──────────┘
//!          │                │               │
//!          └────────────────┴───────────────┴──► Error / Cancelled
//! ```
//!
//! Complete, Error and Cancelled are terminal. A new batch creates new tasks
//! rather than rewinding old ones.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::DomainError;
use super::newtypes::TaskId;
use super::remote_file::RemoteFile;

/// Stage of an upload task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage", content = "reason")]
pub enum UploadStage {
    /// Fetching bytes from the provider
    #[default]
    Downloading,
    /// Sending bytes to intermediate storage
    Uploading,
    /// Waiting for the indexing endpoint
    Processing,
    /// Indexed successfully
    Complete,
    /// Failed with a message
    Error(String),
    /// Abandoned because the batch was cancelled
    Cancelled,
}

impl UploadStage {
    /// Position along the forward path; terminal failure states have none
    fn rank(&self) -> Option<u8> {
        match self {
            UploadStage::Downloading => Some(0),
            UploadStage::Uploading => Some(1),
            UploadStage::Processing => Some(2),
            UploadStage::Complete => Some(3),
            UploadStage::Error(_) | UploadStage::Cancelled => None,
        }
    }

    /// Progress shown for the stage
    pub fn progress_percent(&self) -> u8 {
        match self {
            UploadStage::Downloading => 0,
            UploadStage::Uploading => 30,
            UploadStage::Processing => 70,
            UploadStage::Complete => 100,
            UploadStage::Error(_) | UploadStage::Cancelled => 0,
        }
    }

    /// Returns true once no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStage::Complete | UploadStage::Error(_) | UploadStage::Cancelled
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadStage::Complete)
    }

    /// Returns the stage name as a string (without error details)
    pub fn name(&self) -> &'static str {
        match self {
            UploadStage::Downloading => "Downloading",
            UploadStage::Uploading => "Uploading",
            UploadStage::Processing => "Processing",
            UploadStage::Complete => "Complete",
            UploadStage::Error(_) => "Error",
            UploadStage::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStage::Downloading => write!(f, "downloading"),
            UploadStage::Uploading => write!(f, "uploading"),
            UploadStage::Processing => write!(f, "processing"),
            UploadStage::Complete => write!(f, "complete"),
            UploadStage::Error(reason) => write!(f, "error: {}", reason),
            UploadStage::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-file progress record inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTask {
    id: TaskId,
    file: RemoteFile,
    stage: UploadStage,
    progress_percent: u8,
}

impl UploadTask {
    /// Creates a task in the `Downloading` stage at 0%
    pub fn new(file: RemoteFile) -> Self {
        Self {
            id: TaskId::new(),
            file,
            stage: UploadStage::Downloading,
            progress_percent: 0,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn file(&self) -> &RemoteFile {
        &self.file
    }

    pub fn stage(&self) -> &UploadStage {
        &self.stage
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    /// Error message when the task failed
    pub fn error(&self) -> Option<&str> {
        match &self.stage {
            UploadStage::Error(msg) => Some(msg),
            _ => None,
        }
    }

    /// Checks if a stage transition is valid
    ///
    /// Valid transitions:
    /// - forward along Downloading -> Uploading -> Processing -> Complete,
    ///   one or more steps at a time
    /// - any non-terminal stage -> Error or Cancelled
    pub fn can_transition_to(&self, target: &UploadStage) -> bool {
        if self.stage.is_terminal() {
            return false;
        }

        match (self.stage.rank(), target.rank()) {
            (Some(from), Some(to)) => to > from,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// Attempts to transition to a new stage
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the transition is not allowed;
    /// the task is left unchanged.
    pub fn transition_to(&mut self, target: UploadStage) -> Result<(), DomainError> {
        if !self.can_transition_to(&target) {
            return Err(DomainError::InvalidState {
                from: self.stage.name().to_string(),
                to: target.name().to_string(),
            });
        }

        // Failed tasks keep the progress they had reached
        if target.rank().is_some() {
            self.progress_percent = target.progress_percent();
        }
        self.stage = target;
        Ok(())
    }

    /// Convenience method for the terminal error stage
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), DomainError> {
        self.transition_to(UploadStage::Error(message.into()))
    }

    /// Convenience method for the terminal cancelled stage
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        self.transition_to(UploadStage::Cancelled)
    }
}
