//! Composes alert messages. Delivery belongs to a `Notifier`.

use crate::config::toml_config::AlertsConfig;
use crate::domain::model::{
    AnalysisReport, CleanupOutcome, Priority, ReconciliationExceptions, UnauthorizedTransfer,
};
use crate::domain::ports::{Alert, AlertKind};

pub struct AlertComposer<'a> {
    config: &'a AlertsConfig,
}

impl<'a> AlertComposer<'a> {
    pub fn new(config: &'a AlertsConfig) -> Self {
        Self { config }
    }

    /// Critical alerts reach the standard list plus the critical list.
    pub fn recipients_for(&self, kind: AlertKind) -> Vec<String> {
        match kind {
            AlertKind::UnauthorizedTransfer => self.config.unauthorized_transfer_recipients.clone(),
            AlertKind::Critical => self
                .config
                .standard_recipients
                .iter()
                .chain(self.config.critical_recipients.iter())
                .cloned()
                .collect(),
            _ => self.config.standard_recipients.clone(),
        }
    }

    fn build(&self, kind: AlertKind, subject: String, body: String) -> Option<Alert> {
        if !self.config.enabled {
            return None;
        }
        let recipients = self.recipients_for(kind);
        if recipients.is_empty() {
            tracing::warn!("No recipients configured for {:?} alert, skipping", kind);
            return None;
        }
        Some(Alert {
            kind,
            author: self.config.author.clone(),
            recipients,
            subject,
            body,
        })
    }

    pub fn analysis_summary(&self, report: &AnalysisReport, artifact: &str) -> Option<Alert> {
        let mut body = format!(
            "Duplicate analysis has completed.\n\nTotal Duplicates: {}\n",
            report.groups.len()
        );
        for priority in [Priority::Critical, Priority::High, Priority::Medium, Priority::Low] {
            body.push_str(&format!("  {}: {}\n", priority, report.count_by_priority(priority)));
        }
        if !report.failures.is_empty() {
            body.push_str(&format!("Failed Scans: {}\n", report.failures.len()));
        }
        body.push_str(&format!(
            "Report File: {}\n\nPlease review the report before running cleanup.",
            artifact
        ));

        self.build(
            AlertKind::DuplicateAnalysis,
            format!(
                "Duplicate Analysis Complete - {} duplicates found",
                report.groups.len()
            ),
            body,
        )
    }

    /// Only when at least one group scored CRITICAL.
    pub fn critical_escalation(&self, report: &AnalysisReport) -> Option<Alert> {
        let critical: Vec<_> = report
            .groups
            .iter()
            .filter(|g| g.priority == Priority::Critical)
            .collect();
        if critical.is_empty() {
            return None;
        }

        let lines: Vec<String> = critical
            .iter()
            .map(|g| format!("{} {} ({} occurrences)", g.type_label(), g.value, g.occurrence_count))
            .collect();
        self.build(
            AlertKind::Critical,
            format!("CRITICAL: {} duplicate numbers need attention", critical.len()),
            format!("Critical duplicates detected:\n\n{}", lines.join("\n")),
        )
    }

    pub fn cleanup_complete(&self, outcome: &CleanupOutcome, artifact: &str) -> Option<Alert> {
        let mode = if outcome.dry_run { " (DRY RUN)" } else { "" };
        self.build(
            AlertKind::CleanupComplete,
            format!("Duplicate Cleanup Complete{} - {} processed", mode, outcome.processed),
            format!(
                "Processed: {}\nSuccess: {}\nFailed: {}\nSkipped Lines: {}\nFlagged: {}\nReport File: {}",
                outcome.processed,
                outcome.success_count(),
                outcome.failed_count(),
                outcome.skipped_member_count(),
                outcome.flagged.len(),
                artifact
            ),
        )
    }

    pub fn unauthorized_transfers(&self, transfers: &[UnauthorizedTransfer]) -> Option<Alert> {
        if transfers.is_empty() {
            return None;
        }
        let numbers: Vec<&str> = transfers.iter().map(|t| t.transaction_number.as_str()).collect();
        self.build(
            AlertKind::UnauthorizedTransfer,
            format!("ALERT: {} Unauthorized Transfers", transfers.len()),
            format!("Unauthorized transfers detected:\n\n{}", numbers.join("\n")),
        )
    }

    /// Sent only when the sweep found something.
    pub fn reconciliation_summary(
        &self,
        exceptions: &ReconciliationExceptions,
        artifact: &str,
    ) -> Option<Alert> {
        let total = exceptions.total();
        if total == 0 {
            return None;
        }
        self.build(
            AlertKind::Reconciliation,
            format!("Daily Reconciliation: {} exceptions", total),
            format!(
                "Daily reconciliation complete.\n\nDuplicates: {}\nUnauthorized: {}\nVariances: {}\nStale Work Orders: {}\n\nReport File: {}",
                exceptions.duplicates.len(),
                exceptions.unauthorized.len(),
                exceptions.variances.len(),
                exceptions.stale_work_orders.len(),
                artifact
            ),
        )
    }
}
