//! Terminal rendering of pipeline notifications
//!
//! Human mode goes through the regular formatter. Under `--json` every
//! notification and progress update is one JSON object on stderr, leaving
//! stdout to the command's result document.

use std::{
    io::{self, Write},
    sync::Mutex,
};

use anyhow::anyhow;
use sourcebridge_core::ports::{
    INotificationService, Notification, NotificationAction, NotificationPriority,
    NotificationTopic,
};

use crate::output::{HumanFormatter, OutputFormat, OutputFormatter};

enum Sink {
    Human(Box<dyn OutputFormatter>),
    Json(Mutex<Box<dyn Write + Send>>),
}

/// [`INotificationService`] that prints to the terminal
pub struct ConsoleNotifier {
    sink: Sink,
}

impl ConsoleNotifier {
    pub fn new(format: OutputFormat) -> Self {
        if format.is_json() {
            Self::json_to(io::stderr())
        } else {
            Self {
                sink: Sink::Human(Box::new(HumanFormatter)),
            }
        }
    }

    /// JSON lines written to `out`
    pub fn json_to(out: impl Write + Send + 'static) -> Self {
        Self {
            sink: Sink::Json(Mutex::new(Box::new(out))),
        }
    }

    fn write_json(&self, value: serde_json::Value) -> anyhow::Result<()> {
        let Sink::Json(out) = &self.sink else {
            return Ok(());
        };
        let mut out = out
            .lock()
            .map_err(|_| anyhow!("notification output lock poisoned"))?;
        writeln!(out, "{value}")?;
        out.flush()?;
        Ok(())
    }
}

fn level(priority: NotificationPriority) -> &'static str {
    match priority {
        NotificationPriority::Critical => "error",
        NotificationPriority::High => "warning",
        NotificationPriority::Low | NotificationPriority::Normal => "success",
    }
}

/// Follow-up command for notifications the user has to act on
fn hint(notification: &Notification) -> Option<String> {
    match (notification.topic, notification.action) {
        (NotificationTopic::Auth, Some(NotificationAction::Reconnect(provider))) => Some(format!(
            "Run `sourcebridge auth reconnect {}` or pass --reconnect-on-denied",
            provider.as_str()
        )),
        (NotificationTopic::Auth, None) => {
            Some("Run `sourcebridge auth status` to check your connections".to_string())
        }
        (NotificationTopic::Ingest, _) => None,
    }
}

#[async_trait::async_trait]
impl INotificationService for ConsoleNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        let Sink::Human(fmt) = &self.sink else {
            return self.write_json(serde_json::json!({
                "level": level(notification.priority),
                "topic": notification.topic,
                "title": notification.title,
                "message": notification.body,
                "hint": hint(notification),
            }));
        };

        let line = format!("{}: {}", notification.title, notification.body);
        match notification.priority {
            NotificationPriority::Critical => fmt.error(&line),
            NotificationPriority::High => fmt.warn(&line),
            NotificationPriority::Low | NotificationPriority::Normal => fmt.success(&line),
        }
        if let Some(hint) = hint(notification) {
            fmt.info(&hint);
        }
        Ok(())
    }

    async fn show_progress(&self, progress_id: &str, title: &str, percent: f64) -> anyhow::Result<()> {
        match &self.sink {
            Sink::Human(fmt) => {
                fmt.info(&format!("[{percent:>3.0}%] {title}"));
                Ok(())
            }
            Sink::Json(_) => self.write_json(serde_json::json!({
                "level": "progress",
                "progress_id": progress_id,
                "title": title,
                "percent": percent.round(),
            })),
        }
    }

    async fn clear_progress(&self, _progress_id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
