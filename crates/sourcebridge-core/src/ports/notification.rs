//! Notification service port (driven/secondary port)
//!
//! Tells the user how a batch went and shows its progress while it runs.
//! The CLI prints to the terminal; a desktop front end would map the same
//! calls onto toasts and a progress bar.
//!
//! Delivery is fire-and-forget: callers log a failed delivery and carry on,
//! so a broken notifier never fails a batch. That is also why the trait
//! returns `anyhow::Result` rather than [`IngestError`](crate::domain::IngestError).

use serde::{Deserialize, Serialize};

use crate::domain::ProviderKind;

/// How prominently a notification should be shown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    /// A batch that went as expected
    Low,
    #[default]
    Normal,
    /// Partial failures and cancellations
    High,
    /// Nothing was ingested
    Critical,
}

/// What a notification is about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTopic {
    #[default]
    Ingest,
    /// Credential problems the user has to resolve with the provider
    Auth,
}

/// Follow-up the user can trigger from a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "provider")]
pub enum NotificationAction {
    /// Re-run the authorization flow for the provider
    Reconnect(ProviderKind),
}

/// One message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub priority: NotificationPriority,
    pub topic: NotificationTopic,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<NotificationAction>,
}

impl Notification {
    fn ingest(
        title: impl Into<String>,
        body: impl Into<String>,
        priority: NotificationPriority,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority,
            topic: NotificationTopic::Ingest,
            action: None,
        }
    }

    pub fn success(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::ingest(title, body, NotificationPriority::Low)
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::ingest(title, body, NotificationPriority::High)
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::ingest(title, body, NotificationPriority::Critical)
    }

    /// Actionable notice sent once per batch when a provider refused access
    pub fn access_denied(provider: ProviderKind) -> Self {
        let name = provider.display_name();
        Self {
            title: format!("{name} access denied"),
            body: format!(
                "{name} refused access to one or more files. Reconnecting may restore access."
            ),
            priority: NotificationPriority::High,
            topic: NotificationTopic::Auth,
            action: Some(NotificationAction::Reconnect(provider)),
        }
    }
}

/// Port trait for notifications and progress reporting
///
/// `show_progress` creates or updates the indicator named `progress_id`;
/// `percent` ranges from 0.0 to 100.0. `clear_progress` removes it once
/// the batch is over.
#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;

    async fn show_progress(
        &self,
        progress_id: &str,
        title: &str,
        percent: f64,
    ) -> anyhow::Result<()>;

    async fn clear_progress(&self, progress_id: &str) -> anyhow::Result<()>;
}
