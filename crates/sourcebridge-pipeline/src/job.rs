//! Typed stage jobs
//!
//! A [`Job`] carries one file through the pipeline. Each step consumes the
//! job and returns it in the next state, so a file cannot be stored before
//! it was downloaded or indexed before it was stored:
//!
//! ```text
//! Job<Pending> ──download──→ Job<Downloaded> ──store──→ Job<Stored> ──index──→ Job<Indexed>
//! ```
//!
//! The stage a job reports is the stage its task enters once the step that
//! produced it has completed.

use chrono::{DateTime, Utc};
use sourcebridge_core::{
    domain::{
        DownloadedFile, IngestError, ObjectKey, RemoteFile, TaskId, UploadOutcome, UploadStage,
    },
    ports::{IIndexingService, IObjectStorage, IndexingRequest, StoredObject, UploadContext},
    usecases::DownloadFilesUseCase,
};
use tracing::debug;

mod sealed {
    pub trait Sealed {}
}

/// State of a [`Job`]
pub trait JobState: sealed::Sealed {
    /// Stage reported for a job in this state
    fn stage() -> UploadStage;
}

/// Selected, nothing fetched yet
#[derive(Debug)]
pub struct Pending;

/// Content fetched from the provider
#[derive(Debug)]
pub struct Downloaded {
    file: DownloadedFile,
}

/// Accepted by intermediate storage
#[derive(Debug)]
pub struct Stored {
    file_name: String,
    object: StoredObject,
}

/// Accepted by the indexing service
#[derive(Debug)]
pub struct Indexed {
    file_name: String,
    object: StoredObject,
    acknowledgement: serde_json::Value,
}

impl sealed::Sealed for Pending {}
impl sealed::Sealed for Downloaded {}
impl sealed::Sealed for Stored {}
impl sealed::Sealed for Indexed {}

impl JobState for Pending {
    fn stage() -> UploadStage {
        UploadStage::Downloading
    }
}

impl JobState for Downloaded {
    fn stage() -> UploadStage {
        UploadStage::Uploading
    }
}

impl JobState for Stored {
    fn stage() -> UploadStage {
        UploadStage::Processing
    }
}

impl JobState for Indexed {
    fn stage() -> UploadStage {
        UploadStage::Complete
    }
}

/// One file moving through the pipeline
#[derive(Debug)]
pub struct Job<S: JobState> {
    task_id: TaskId,
    remote: RemoteFile,
    state: S,
}

impl<S: JobState> Job<S> {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn remote(&self) -> &RemoteFile {
        &self.remote
    }

    pub fn stage(&self) -> UploadStage {
        S::stage()
    }
}

impl Job<Pending> {
    pub fn new(task_id: TaskId, remote: RemoteFile) -> Self {
        Self {
            task_id,
            remote,
            state: Pending,
        }
    }

    /// Fetches the file content from the provider
    pub async fn download(
        self,
        downloader: &DownloadFilesUseCase,
    ) -> Result<Job<Downloaded>, IngestError> {
        let file = downloader.download_one(&self.remote).await?;
        Ok(Job {
            task_id: self.task_id,
            remote: self.remote,
            state: Downloaded { file },
        })
    }
}

impl Job<Downloaded> {
    pub fn file(&self) -> &DownloadedFile {
        &self.state.file
    }

    /// Uploads the content to intermediate storage under a fresh object key
    ///
    /// The bytes are released once storage has accepted them.
    ///
    /// # Arguments
    /// * `storage` - Intermediate object storage
    /// * `context` - User and chat session the batch runs for
    /// * `now` - Timestamp embedded in the object key
    pub async fn store(
        self,
        storage: &dyn IObjectStorage,
        context: &UploadContext,
        now: DateTime<Utc>,
    ) -> Result<Job<Stored>, IngestError> {
        let file = self.state.file;
        let key = ObjectKey::for_upload(&context.username, &file.name, now)?;
        let object = storage.upload(&file, &key, context).await?;
        debug!(file = %file.name, key = %key, url = %object.url, "Job stored");

        Ok(Job {
            task_id: self.task_id,
            remote: self.remote,
            state: Stored {
                file_name: file.name,
                object,
            },
        })
    }
}

impl Job<Stored> {
    pub fn object(&self) -> &StoredObject {
        &self.state.object
    }

    /// Submits the stored object for indexing
    pub async fn index(
        self,
        indexing: &dyn IIndexingService,
        context: &UploadContext,
    ) -> Result<Job<Indexed>, IngestError> {
        let Stored { file_name, object } = self.state;
        let request = IndexingRequest::for_object(&object, context, &file_name);
        let acknowledgement = indexing.submit(&request).await?;

        Ok(Job {
            task_id: self.task_id,
            remote: self.remote,
            state: Indexed {
                file_name,
                object,
                acknowledgement,
            },
        })
    }
}

impl Job<Indexed> {
    pub fn into_outcome(self) -> UploadOutcome {
        UploadOutcome {
            file_id: self.remote.id,
            file_name: self.state.file_name,
            stored_url: self.state.object.url,
            stored_name: self.state.object.file_name,
            indexing_response: self.state.acknowledgement,
        }
    }
}
