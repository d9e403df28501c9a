//! Batch upload orchestrator
//!
//! The [`BatchOrchestrator`] ingests a selection of provider files into a
//! chat session's knowledge base.
//!
//! ## Batch Flow
//!
//! 1. **Preconditions**: user and session present, provider connected,
//!    selection non-empty. Nothing touches the network before these pass.
//! 2. **Per file**, strictly in selection order: download, upload to
//!    intermediate storage, submit for indexing. A failure marks that file
//!    as errored and the batch moves on to the next one.
//! 3. **Summary**: one aggregate notification, plus one reconnect
//!    notification when any file was refused access.
//!
//! ## Cancellation
//!
//! Every network step races the batch's [`CancellationToken`]. Once it
//! fires, the in-flight file and every file not yet started are marked
//! cancelled and recorded as failures.

use std::sync::Arc;

use chrono::Utc;
use sourcebridge_core::{
    domain::{
        BatchId, BatchResult, BatchSummary, FailedUpload, IngestError, RemoteFile, TaskId,
        UploadOutcome,
    },
    ports::{
        IIndexingService, INotificationService, IObjectStorage, IStorageProvider, Notification,
        UploadContext,
    },
    usecases::{DownloadFilesUseCase, ProviderConnector},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    job::{Job, JobState},
    progress::ProgressReporter,
};

/// Failure message recorded for cancelled files
const CANCELLED_MESSAGE: &str = "cancelled";

// ============================================================================
// BatchRequest
// ============================================================================

/// One user-initiated ingestion
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub username: String,
    pub chat_session_id: String,
    /// Files in the order they will be processed
    pub files: Vec<RemoteFile>,
}

impl BatchRequest {
    pub fn new(
        username: impl Into<String>,
        chat_session_id: impl Into<String>,
        files: Vec<RemoteFile>,
    ) -> Self {
        Self {
            username: username.into(),
            chat_session_id: chat_session_id.into(),
            files,
        }
    }

    fn context(&self) -> UploadContext {
        UploadContext::new(self.username.trim(), self.chat_session_id.trim())
    }
}

// ============================================================================
// BatchOrchestrator
// ============================================================================

/// Runs batches for one provider
pub struct BatchOrchestrator {
    connector: Arc<ProviderConnector>,
    downloader: DownloadFilesUseCase,
    storage: Arc<dyn IObjectStorage + Send + Sync>,
    indexing: Arc<dyn IIndexingService + Send + Sync>,
    notifier: Option<Arc<dyn INotificationService + Send + Sync>>,
    progress: Arc<ProgressReporter>,
}

impl BatchOrchestrator {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    /// * `connector` - Connection to the provider the files come from
    /// * `provider` - Provider adapter used for downloads
    /// * `storage` - Intermediate object storage
    /// * `indexing` - Retrieval-indexing endpoint
    pub fn new(
        connector: Arc<ProviderConnector>,
        provider: Arc<dyn IStorageProvider + Send + Sync>,
        storage: Arc<dyn IObjectStorage + Send + Sync>,
        indexing: Arc<dyn IIndexingService + Send + Sync>,
    ) -> Self {
        Self {
            downloader: DownloadFilesUseCase::new(provider, connector.clone()),
            connector,
            storage,
            indexing,
            notifier: None,
            progress: Arc::new(ProgressReporter::new()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn INotificationService + Send + Sync>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Shares an existing reporter, e.g. one a UI already observes
    pub fn with_progress(mut self, progress: Arc<ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn progress(&self) -> Arc<ProgressReporter> {
        self.progress.clone()
    }

    /// Runs one batch to completion or cancellation
    ///
    /// # Returns
    /// The batch result when at least one file succeeded or the batch was
    /// cancelled. `succeeded.len() + failed.len()` always equals the number
    /// of selected files.
    ///
    /// # Errors
    /// - `NotAuthenticated` when the username or chat session is missing
    /// - `NotConnected` when the provider has no live credential
    /// - `ValidationFailed` when no file is selected
    /// - `AllFailed` when every file failed
    pub async fn run(
        &self,
        request: BatchRequest,
        cancel: CancellationToken,
    ) -> Result<BatchResult, IngestError> {
        let result = self.run_to_result(request, cancel).await?;
        if matches!(result.summary(), BatchSummary::AllFailed { .. }) {
            return Err(IngestError::AllFailed {
                files: result.failed.into_iter().map(|f| f.file_name).collect(),
            });
        }
        Ok(result)
    }

    /// Like [`run`](Self::run), but returns the result even when every
    /// file failed, so callers can inspect the per-file failures
    pub async fn run_to_result(
        &self,
        request: BatchRequest,
        cancel: CancellationToken,
    ) -> Result<BatchResult, IngestError> {
        self.check_preconditions(&request).await?;

        let context = request.context();
        let batch_id = BatchId::new();
        let provider = self.connector.provider();
        let total = request.files.len();

        self.progress.clear();
        let task_ids = self.progress.begin(batch_id, &request.files);

        info!(
            batch_id = %batch_id,
            provider = %provider,
            files = total,
            username = %context.username,
            "Starting ingestion batch"
        );

        let mut result = BatchResult::new(batch_id);

        for (index, (file, task_id)) in request.files.iter().zip(&task_ids).enumerate() {
            if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }

            debug!(batch_id = %batch_id, file = %file.name, position = index + 1, total, "Processing file");
            match self.process(*task_id, file, &context, &cancel, batch_id).await {
                Ok(outcome) => {
                    info!(batch_id = %batch_id, file = %file.name, url = %outcome.stored_url, "File ingested");
                    result.succeeded.push(outcome);
                }
                Err(IngestError::Cancelled) => {
                    result.cancelled = true;
                    break;
                }
                Err(err) => {
                    warn!(batch_id = %batch_id, file = %file.name, error = %err, "File failed");
                    if let Err(e) = self.progress.fail(*task_id, err.to_string()) {
                        warn!(error = %e, "Could not record failure in progress");
                    }
                    result.failed.push(
                        FailedUpload::new(file.id.clone(), file.name.clone(), err.to_string())
                            .with_access_denied(err.is_access_denied()),
                    );
                }
            }
        }

        if result.cancelled {
            self.record_cancelled(&request.files, &task_ids, &mut result);
        }

        let summary = result.summary();
        info!(
            batch_id = %batch_id,
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            cancelled = result.cancelled,
            "Batch finished: {}",
            summary
        );
        self.notify_summary(&result, summary).await;
        if result.has_access_denied() {
            self.notify(&Notification::access_denied(provider)).await;
        }
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.clear_progress(&batch_id.to_string()).await {
                warn!(error = %e, "Failed to clear progress indicator");
            }
        }

        Ok(result)
    }

    async fn check_preconditions(&self, request: &BatchRequest) -> Result<(), IngestError> {
        if request.username.trim().is_empty() || request.chat_session_id.trim().is_empty() {
            return Err(IngestError::NotAuthenticated(
                "a username and chat session are required to ingest files".to_string(),
            ));
        }
        if !self.connector.is_connected().await {
            return Err(IngestError::NotConnected(
                self.connector.provider().display_name().to_string(),
            ));
        }
        if request.files.is_empty() {
            return Err(IngestError::ValidationFailed(
                "no files selected".to_string(),
            ));
        }
        Ok(())
    }

    /// Carries one file through every stage
    async fn process(
        &self,
        task_id: TaskId,
        file: &RemoteFile,
        context: &UploadContext,
        cancel: &CancellationToken,
        batch_id: BatchId,
    ) -> Result<UploadOutcome, IngestError> {
        let job = Job::new(task_id, file.clone());

        let job = cancellable(cancel, job.download(&self.downloader)).await?;
        self.record_stage(&job, batch_id).await;

        let job = cancellable(
            cancel,
            job.store(self.storage.as_ref(), context, Utc::now()),
        )
        .await?;
        self.record_stage(&job, batch_id).await;

        let job = cancellable(cancel, job.index(self.indexing.as_ref(), context)).await?;
        self.record_stage(&job, batch_id).await;

        Ok(job.into_outcome())
    }

    async fn record_stage<S: JobState>(&self, job: &Job<S>, batch_id: BatchId) {
        let stage = job.stage();
        debug!(file = %job.remote().name, stage = %stage, "Stage reached");
        if let Err(e) = self.progress.advance(job.task_id(), stage) {
            warn!(error = %e, "Rejected progress transition");
        }

        if let Some(notifier) = &self.notifier {
            let snapshot = self.progress.snapshot();
            let title = format!(
                "Ingesting {} ({}/{})",
                job.remote().name,
                snapshot.finished(),
                snapshot.tasks.len()
            );
            if let Err(e) = notifier
                .show_progress(&batch_id.to_string(), &title, snapshot.overall_percent())
                .await
            {
                warn!(error = %e, "Failed to update progress indicator");
            }
        }
    }

    /// Marks the in-flight file and every unstarted file as cancelled
    fn record_cancelled(&self, files: &[RemoteFile], task_ids: &[TaskId], result: &mut BatchResult) {
        let cancelled = self.progress.cancel_pending();
        for (file, task_id) in files.iter().zip(task_ids) {
            if cancelled.contains(task_id) {
                result
                    .failed
                    .push(FailedUpload::new(file.id.clone(), file.name.clone(), CANCELLED_MESSAGE));
            }
        }
        info!(
            batch_id = %result.batch_id,
            cancelled = cancelled.len(),
            "Batch cancelled"
        );
    }

    async fn notify_summary(&self, result: &BatchResult, summary: BatchSummary) {
        let notification = match summary {
            BatchSummary::AllSucceeded { .. } => {
                Notification::success("Files uploaded", summary.to_string())
            }
            BatchSummary::Partial { .. } => {
                let failed: Vec<&str> = result.failed.iter().map(|f| f.file_name.as_str()).collect();
                Notification::warning(
                    "Some files failed",
                    format!("{summary}: {}", failed.join(", ")),
                )
            }
            BatchSummary::AllFailed { .. } => {
                Notification::error("Upload failed", summary.to_string())
            }
            BatchSummary::Cancelled { .. } => {
                Notification::warning("Upload cancelled", summary.to_string())
            }
        };
        self.notify(&notification).await;
    }

    async fn notify(&self, notification: &Notification) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(notification).await {
                warn!(error = %e, title = %notification.title, "Failed to deliver notification");
            }
        }
    }
}

/// Runs `step` unless `cancel` fires first
async fn cancellable<T, F>(cancel: &CancellationToken, step: F) -> Result<T, IngestError>
where
    F: std::future::Future<Output = Result<T, IngestError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(IngestError::Cancelled),
        outcome = step => outcome,
    }
}
