//! Batch progress reporter
//!
//! The [`ProgressReporter`] owns the [`UploadTask`]s of the current batch
//! and publishes a [`ProgressSnapshot`] on a `tokio::sync::watch` channel
//! after every change. Observers call [`subscribe`](ProgressReporter::subscribe)
//! and are woken on each update; a slow observer sees the latest snapshot.
//!
//! Stage changes go through [`UploadTask::transition_to`], so a rejected
//! transition leaves the published state untouched.

use serde::Serialize;
use sourcebridge_core::domain::{BatchId, DomainError, RemoteFile, TaskId, UploadStage, UploadTask};
use tokio::sync::watch;
use tracing::debug;

/// Point-in-time view of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Batch the tasks belong to; `None` when nothing is tracked
    pub batch_id: Option<BatchId>,
    /// One task per selected file, in selection order
    pub tasks: Vec<UploadTask>,
}

impl ProgressSnapshot {
    pub fn task(&self, id: TaskId) -> Option<&UploadTask> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks in a terminal stage
    pub fn finished(&self) -> usize {
        self.tasks.iter().filter(|t| t.stage().is_terminal()).count()
    }

    /// True once every task is terminal
    pub fn is_finished(&self) -> bool {
        !self.tasks.is_empty() && self.finished() == self.tasks.len()
    }

    /// Mean progress across tasks, 0.0 to 100.0
    ///
    /// Terminal tasks count as done whatever their outcome.
    pub fn overall_percent(&self) -> f64 {
        if self.tasks.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .tasks
            .iter()
            .map(|t| {
                if t.stage().is_terminal() {
                    100.0
                } else {
                    f64::from(t.progress_percent())
                }
            })
            .sum();
        total / self.tasks.len() as f64
    }
}

/// Observable per-file progress of one batch
pub struct ProgressReporter {
    tx: watch::Sender<ProgressSnapshot>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());
        Self { tx }
    }

    /// Starts tracking a batch, replacing whatever was tracked before
    ///
    /// # Returns
    /// The task ids, in the order of `files`.
    pub fn begin(&self, batch_id: BatchId, files: &[RemoteFile]) -> Vec<TaskId> {
        let tasks: Vec<UploadTask> = files.iter().cloned().map(UploadTask::new).collect();
        let ids = tasks.iter().map(UploadTask::id).collect();

        debug!(batch_id = %batch_id, tasks = tasks.len(), "Tracking batch");
        self.tx.send_replace(ProgressSnapshot {
            batch_id: Some(batch_id),
            tasks,
        });
        ids
    }

    /// Moves a task to `stage`
    ///
    /// # Errors
    /// `DomainError::InvalidState` for a backward or post-terminal
    /// transition, `DomainError::ValidationFailed` for an unknown task.
    pub fn advance(&self, task_id: TaskId, stage: UploadStage) -> Result<(), DomainError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|snapshot| {
            match snapshot.tasks.iter_mut().find(|t| t.id() == task_id) {
                Some(task) => {
                    result = task.transition_to(stage);
                    result.is_ok()
                }
                None => {
                    result = Err(DomainError::ValidationFailed(format!(
                        "unknown task {task_id}"
                    )));
                    false
                }
            }
        });
        result
    }

    /// Marks a task as failed with `message`
    pub fn fail(&self, task_id: TaskId, message: impl Into<String>) -> Result<(), DomainError> {
        self.advance(task_id, UploadStage::Error(message.into()))
    }

    /// Marks every non-terminal task as cancelled
    ///
    /// # Returns
    /// The ids of the tasks that were cancelled, in selection order.
    pub fn cancel_pending(&self) -> Vec<TaskId> {
        let mut cancelled = Vec::new();
        self.tx.send_if_modified(|snapshot| {
            for task in snapshot.tasks.iter_mut() {
                if task.cancel().is_ok() {
                    cancelled.push(task.id());
                }
            }
            !cancelled.is_empty()
        });
        cancelled
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver woken after every published change
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    /// Forgets the tracked batch
    pub fn clear(&self) {
        self.tx.send_replace(ProgressSnapshot::default());
    }
}
