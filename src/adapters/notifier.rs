use crate::domain::ports::{Alert, Notifier};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Mutex;

/// Writes alerts to the log. Mail delivery is left to the hosting platform.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        tracing::info!(
            kind = ?alert.kind,
            author = %alert.author,
            recipients = %alert.recipients.join(", "),
            "📧 {}",
            alert.subject
        );
        tracing::debug!("Alert body:\n{}", alert.body);
        Ok(())
    }
}

/// Keeps every alert in memory; used by tests and demo runs.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Alert> {
        self.sent
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        if let Ok(mut alerts) = self.sent.lock() {
            alerts.push(alert.clone());
        }
        Ok(())
    }
}
