//! Files commands - List and download provider files
//!
//! - `files list <provider>` prints the files visible to the stored
//!   credential. Each invocation starts with an empty listing cache, so
//!   the listing is always fetched from the provider.
//! - `files download <provider> <id>... [--out DIR]` fetches the selected
//!   files concurrently and writes them to `DIR`; files that fail are
//!   reported without stopping the others.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Subcommand;
use sourcebridge_core::{
    domain::{sanitize_file_name, IngestError, ProviderKind, RemoteFile},
    usecases::ProviderConnector,
};
use tracing::info;

use crate::{
    context::{parse_provider, AppContext},
    output::{format_size, get_formatter, print_hint, OutputFormat, OutputFormatter},
};

#[derive(Debug, Subcommand)]
pub enum FilesCommand {
    /// List files in the connected account
    List {
        #[arg(value_parser = parse_provider)]
        provider: ProviderKind,
    },
    /// Download files by id
    Download {
        #[arg(value_parser = parse_provider)]
        provider: ProviderKind,
        /// Provider file ids, as shown by `files list`
        #[arg(required = true)]
        ids: Vec<String>,
        /// Directory to write the files to
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

impl FilesCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format.is_json());
        match self {
            FilesCommand::List { provider } => execute_list(ctx, *provider, &*fmt, format).await,
            FilesCommand::Download { provider, ids, out } => {
                execute_download(ctx, *provider, ids, out, &*fmt, format).await
            }
        }
    }
}

/// Restores the connector for `provider`, failing when nothing is stored
pub(crate) async fn require_connected(
    ctx: &AppContext,
    provider: ProviderKind,
    fmt: &dyn OutputFormatter,
) -> Result<Arc<ProviderConnector>> {
    let connector = ctx.connector(provider).await?;
    if !connector.is_connected().await {
        let err = IngestError::NotConnected(provider.display_name().to_string());
        print_hint(fmt, &err, provider.as_str());
        return Err(err.into());
    }
    Ok(connector)
}

/// Picks the listed files matching `ids`, in the order given
///
/// # Returns
/// The selected files and the ids that matched nothing.
pub(crate) fn select_files(files: &[RemoteFile], ids: &[String]) -> (Vec<RemoteFile>, Vec<String>) {
    let mut selected = Vec::new();
    let mut missing = Vec::new();
    for id in ids {
        match files.iter().find(|f| f.id.as_str() == id) {
            Some(file) if !selected.iter().any(|s: &RemoteFile| s.id == file.id) => {
                selected.push(file.clone())
            }
            Some(_) => {}
            None => missing.push(id.clone()),
        }
    }
    (selected, missing)
}

async fn execute_list(
    ctx: &AppContext,
    provider: ProviderKind,
    fmt: &dyn OutputFormatter,
    format: OutputFormat,
) -> Result<()> {
    let connector = require_connected(ctx, provider, fmt).await?;
    let lister = ctx.lister(provider, connector);

    let listing = match lister.list().await {
        Ok(listing) => listing,
        Err(e) => {
            print_hint(fmt, &e, provider.as_str());
            return Err(e.into());
        }
    };

    if format.is_json() {
        fmt.print_json(&serde_json::json!({
            "provider": provider.as_str(),
            "truncated": listing.truncated,
            "files": listing.files,
        }));
        return Ok(());
    }

    fmt.success(&format!(
        "{} file(s) in {}",
        listing.files.len(),
        provider.display_name()
    ));
    for file in &listing.files {
        fmt.info(&format!(
            "{:<40} {:>10}  {}  {}",
            file.id.as_str(),
            format_size(file.size),
            file.modified_at.format("%Y-%m-%d %H:%M"),
            file.path
        ));
    }
    if listing.truncated {
        fmt.warn(&format!(
            "Listing stopped at {} files (listing.max_files)",
            listing.files.len()
        ));
    }
    Ok(())
}

async fn execute_download(
    ctx: &AppContext,
    provider: ProviderKind,
    ids: &[String],
    out: &Path,
    fmt: &dyn OutputFormatter,
    format: OutputFormat,
) -> Result<()> {
    let connector = require_connected(ctx, provider, fmt).await?;
    let listing = ctx.lister(provider, connector.clone()).list().await?;

    let (selected, missing) = select_files(&listing.files, ids);
    for id in &missing {
        fmt.warn(&format!("No file with id {id}"));
    }
    if selected.is_empty() {
        anyhow::bail!("None of the requested files were found");
    }

    let report = ctx.downloader(provider, connector).download_many(&selected).await?;

    tokio::fs::create_dir_all(out)
        .await
        .with_context(|| format!("Failed to create {}", out.display()))?;

    let mut written = Vec::new();
    for file in &report.succeeded {
        let path = out.join(sanitize_file_name(&file.name));
        tokio::fs::write(&path, &file.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), size = file.size(), "Wrote file");
        written.push((path, file.size()));
    }

    if format.is_json() {
        fmt.print_json(&serde_json::json!({
            "written": written
                .iter()
                .map(|(path, size)| serde_json::json!({"path": path, "size": size}))
                .collect::<Vec<_>>(),
            "failed": report.failed,
            "missing": missing,
        }));
    } else {
        for (path, size) in &written {
            fmt.success(&format!("{} ({})", path.display(), format_size(*size)));
        }
        for failure in &report.failed {
            fmt.error(&format!("{}: {}", failure.file_name, failure.error_message));
        }
    }

    if written.is_empty() {
        anyhow::bail!("No file could be downloaded");
    }
    Ok(())
}
