//! Shared HTTP plumbing
//!
//! Every adapter in this crate talks HTTP through one `reqwest::Client` and
//! turns non-success responses into [`IngestError`] with
//! [`error_for_response`], so status handling is identical across
//! providers and the backend.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use sourcebridge_core::domain::IngestError;
use tracing::debug;

/// User agent sent with every request
const USER_AGENT: &str = concat!("sourcebridge/", env!("CARGO_PKG_VERSION"));

/// Longest error body excerpt carried into an error message
const MAX_ERROR_EXCERPT: usize = 200;

/// Builds the HTTP client shared by all adapters
///
/// # Arguments
/// * `timeout` - Per-request timeout
pub fn build_http_client(timeout: Duration) -> Result<Client, IngestError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| IngestError::Network(format!("failed to build HTTP client: {e}")))
}

/// What the failed request was trying to do
///
/// Decides which error variant a generic failure status maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Download,
    StorageUpload,
    Indexing,
}

impl Operation {
    /// True for requests made with the provider credential
    pub fn uses_provider_credential(self) -> bool {
        matches!(self, Operation::List | Operation::Download)
    }
}

/// Converts a transport-level failure
pub fn network_error(err: reqwest::Error) -> IngestError {
    if err.is_timeout() {
        IngestError::Network(format!("request timed out: {err}"))
    } else {
        IngestError::Network(err.to_string())
    }
}

/// Consumes a non-success response and classifies it
///
/// - 401 on a provider request is an expired or revoked credential; the
///   backend never sees that credential, so its 401 is a plain failure
/// - 403 is a permission problem
/// - 404, or a Dropbox `path/not_found` summary, is a missing file when
///   downloading
/// - anything else maps to the operation's generic failure
///
/// # Arguments
/// * `response` - The response whose status is not a success
/// * `operation` - What the request was for
/// * `subject` - File name or endpoint, used in the message
pub async fn error_for_response(
    response: Response,
    operation: Operation,
    subject: &str,
) -> IngestError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    });
    debug!(status = status.as_u16(), subject, %message, "Request failed");

    classify(status, &body, message, operation, subject)
}

fn classify(
    status: StatusCode,
    body: &str,
    message: String,
    operation: Operation,
    subject: &str,
) -> IngestError {
    match status {
        StatusCode::UNAUTHORIZED if operation.uses_provider_credential() => {
            IngestError::CredentialExpired(format!("{subject}: {message}"))
        }
        StatusCode::FORBIDDEN => IngestError::AccessDenied(format!("{subject}: {message}")),
        _ if operation == Operation::Download
            && (status == StatusCode::NOT_FOUND || body.contains("path/not_found")) =>
        {
            IngestError::NotFound(subject.to_string())
        }
        _ => match operation {
            Operation::List => IngestError::ListFailed {
                status: status.as_u16(),
                message,
            },
            Operation::Download => {
                IngestError::DownloadFailed(format!("{subject}: HTTP {}: {message}", status.as_u16()))
            }
            Operation::StorageUpload => IngestError::StorageUploadFailed(format!(
                "{subject}: HTTP {}: {message}",
                status.as_u16()
            )),
            Operation::Indexing => IngestError::IndexingFailed(message),
        },
    }
}

/// Pulls a human-readable message out of an error body
///
/// Understands Dropbox (`error_summary`), Google (`error.message`) and the
/// backend (`error` / `message` strings); falls back to a plain-text excerpt.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let candidates = [
            json.get("error_summary"),
            json.get("error").and_then(|e| e.get("message")),
            json.get("error").filter(|e| e.is_string()),
            json.get("message"),
            json.get("detail"),
        ];
        if let Some(msg) = candidates
            .into_iter()
            .flatten()
            .find_map(|v| v.as_str())
            .map(str::trim)
            .filter(|m| !m.is_empty())
        {
            return Some(msg.to_string());
        }
    }

    Some(trimmed.chars().take(MAX_ERROR_EXCERPT).collect())
}

/// Joins a base URL and a path without doubling the slash
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
