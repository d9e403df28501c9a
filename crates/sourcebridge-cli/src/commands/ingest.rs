//! Ingest command - Run a batch upload into a chat session
//!
//! Downloads the selected provider files, stores them in intermediate
//! storage and submits each for indexing. Ctrl-C cancels the batch; files
//! already ingested stay ingested.

use std::{collections::HashSet, sync::Arc};

use anyhow::Result;
use clap::Args;
use sourcebridge_core::{
    domain::{BatchResult, IngestError, ProviderKind, RemoteFile, RemoteId},
    usecases::ProviderConnector,
};
use sourcebridge_pipeline::{BatchOrchestrator, BatchRequest};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::files::{require_connected, select_files};
use crate::{
    context::{parse_provider, AppContext},
    notifier::ConsoleNotifier,
    output::{get_formatter, print_hint, OutputFormat, OutputFormatter},
};

#[derive(Debug, Args)]
pub struct IngestCommand {
    #[arg(value_parser = parse_provider)]
    provider: ProviderKind,

    /// Provider file ids to ingest, as shown by `files list`
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    ids: Vec<String>,

    /// Ingest every listed file
    #[arg(long)]
    all: bool,

    /// User the files are ingested for
    #[arg(long, env = "SOURCEBRIDGE_USER")]
    user: String,

    /// Chat session receiving the files
    #[arg(long, env = "SOURCEBRIDGE_SESSION")]
    session: String,

    /// Reauthorize and retry once when files are refused access
    #[arg(long)]
    reconnect_on_denied: bool,
}

impl IngestCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format.is_json());

        let connector = require_connected(ctx, self.provider, &*fmt).await?;
        let listing = ctx.lister(self.provider, connector.clone()).list().await?;

        let files = if self.all {
            listing.files
        } else {
            let (selected, missing) = select_files(&listing.files, &self.ids);
            for id in &missing {
                fmt.warn(&format!("No file with id {id}"));
            }
            selected
        };

        let backend = ctx.backend();
        let orchestrator = BatchOrchestrator::new(
            connector.clone(),
            ctx.storage_provider(self.provider),
            backend.clone(),
            backend,
        )
        .with_notifier(Arc::new(ConsoleNotifier::new(format)));

        let cancel = CancellationToken::new();
        let watcher = spawn_interrupt_watcher(cancel.clone());

        let outcome = self.run_batch(&orchestrator, &connector, files, &cancel, &*fmt).await;
        watcher.abort();

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                print_hint(&*fmt, &e, self.provider.as_str());
                return Err(e.into());
            }
        };

        report(&result, &*fmt, format);

        if result.succeeded.is_empty() && !result.cancelled {
            return Err(IngestError::AllFailed {
                files: result.failed.into_iter().map(|f| f.file_name).collect(),
            }
            .into());
        }
        Ok(())
    }

    /// Runs the batch, then retries refused files once after reconnecting
    /// when `--reconnect-on-denied` is set
    async fn run_batch(
        &self,
        orchestrator: &BatchOrchestrator,
        connector: &ProviderConnector,
        files: Vec<RemoteFile>,
        cancel: &CancellationToken,
        fmt: &dyn OutputFormatter,
    ) -> Result<BatchResult, IngestError> {
        let request = BatchRequest::new(&self.user, &self.session, files.clone());
        let mut result = orchestrator.run_to_result(request, cancel.clone()).await?;

        if !self.reconnect_on_denied || result.cancelled || !result.has_access_denied() {
            return Ok(result);
        }

        let refused = refused_files(&files, &result);
        fmt.warn(&format!(
            "{} file(s) were refused access, reconnecting {}",
            refused.len(),
            self.provider.display_name()
        ));
        info!(provider = %self.provider, files = refused.len(), "Reconnecting after access denied");

        connector.force_reconnect().await?;

        let retry = orchestrator
            .run_to_result(
                BatchRequest::new(&self.user, &self.session, refused),
                cancel.clone(),
            )
            .await?;
        merge_retry(&mut result, retry);
        Ok(result)
    }
}

/// Cancels `cancel` on the first Ctrl-C
fn spawn_interrupt_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, cancelling batch");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
        }
    })
}

/// Files whose failure was an access refusal, in selection order
fn refused_files(files: &[RemoteFile], result: &BatchResult) -> Vec<RemoteFile> {
    files
        .iter()
        .filter(|file| {
            result
                .failed
                .iter()
                .any(|f| f.access_denied && f.file_id == file.id)
        })
        .cloned()
        .collect()
}

/// Replaces the refused entries of `result` with the retry's outcome
fn merge_retry(result: &mut BatchResult, retry: BatchResult) {
    let retried: HashSet<RemoteId> = retry
        .succeeded
        .iter()
        .map(|o| o.file_id.clone())
        .chain(retry.failed.iter().map(|f| f.file_id.clone()))
        .collect();
    result
        .failed
        .retain(|f| !(f.access_denied && retried.contains(&f.file_id)));
    result.succeeded.extend(retry.succeeded);
    result.failed.extend(retry.failed);
    result.cancelled = retry.cancelled;
}

fn report(result: &BatchResult, fmt: &dyn OutputFormatter, format: OutputFormat) {
    if format.is_json() {
        fmt.print_json(&serde_json::json!({
            "batch_id": result.batch_id.to_string(),
            "summary": result.summary(),
            "succeeded": result.succeeded,
            "failed": result.failed,
            "cancelled": result.cancelled,
        }));
        return;
    }

    for outcome in &result.succeeded {
        fmt.success(&format!("{} -> {}", outcome.file_name, outcome.stored_url));
    }
    for failure in &result.failed {
        fmt.error(&format!("{}: {}", failure.file_name, failure.error_message));
    }
    fmt.info(&result.summary().to_string());
}
