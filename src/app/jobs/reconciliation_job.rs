use super::analysis_job::DuplicateAnalyzer;
use super::{dispatch, timed};
use crate::app::engine::{artifact_path, artifact_timestamp, OutputFolders};
use crate::config::toml_config::InventoryConfig;
use crate::core::alerts::AlertComposer;
use crate::core::priority::score_all;
use crate::core::reconciliation::{filter_unauthorized, find_stale_work_orders, find_variances};
use crate::core::report::{render_exceptions_csv, render_reconciliation_report};
use crate::domain::model::{ReconciliationExceptions, ScanFailure};
use crate::domain::ports::{FieldDirectory, InventoryStore, Job, JobSummary, Notifier, Storage};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ReconciliationArtifacts {
    pub exceptions: ReconciliationExceptions,
    pub report: String,
    pub csv: String,
}

/// Daily sweep. Each check runs on its own; a failing check is listed in the
/// report instead of aborting the others.
pub struct ReconciliationJob<S: Storage, R: InventoryStore + FieldDirectory> {
    config: Arc<InventoryConfig>,
    folders: OutputFolders,
    store: Arc<R>,
    storage: S,
    notifier: Arc<dyn Notifier>,
    now: DateTime<Utc>,
}

impl<S: Storage, R: InventoryStore + FieldDirectory> ReconciliationJob<S, R> {
    pub fn new(
        config: Arc<InventoryConfig>,
        store: Arc<R>,
        storage: S,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let folders = OutputFolders::resolve(&config.output);
        Self {
            config,
            folders,
            store,
            storage,
            notifier,
            now: Utc::now(),
        }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    fn record_failure(exceptions: &mut ReconciliationExceptions, check: &str, message: String) {
        tracing::warn!("⚠️ Reconciliation check '{}' failed: {}", check, message);
        exceptions.failures.push(ScanFailure {
            target: check.to_string(),
            message,
        });
    }
}

#[async_trait]
impl<S: Storage, R: InventoryStore + FieldDirectory> Job for ReconciliationJob<S, R> {
    type Extracted = ReconciliationExceptions;
    type Output = ReconciliationArtifacts;

    fn name(&self) -> &str {
        "daily-reconciliation"
    }

    async fn extract(&self) -> Result<ReconciliationExceptions> {
        let rc = &self.config.reconciliation;
        let limit = self.config.store_timeout();
        let today = self.now.date_naive();
        let mut exceptions = ReconciliationExceptions::default();

        if rc.check_duplicates {
            let report = DuplicateAnalyzer::new(&self.config, self.store.as_ref())
                .analyze(self.now)
                .await;
            exceptions.duplicates = report.groups;
            exceptions.failures.extend(report.failures);
        }

        let since = today - Duration::days(rc.lookback_days);
        match timed(
            "unauthorized_fulfillments",
            limit,
            self.store.unauthorized_fulfillments(
                since,
                &rc.authorization_field,
                &rc.authorization_approved_value,
            ),
        )
        .await
        {
            Ok(transfers) => {
                exceptions.unauthorized =
                    filter_unauthorized(transfers, &rc.authorization_approved_value)
            }
            Err(e) => Self::record_failure(&mut exceptions, "unauthorized transfers", e.to_string()),
        }

        let stale_cutoff = today - Duration::days(rc.stale_wo_days);
        match timed(
            "open_work_orders",
            limit,
            self.store.open_work_orders(&rc.open_wo_statuses, stale_cutoff),
        )
        .await
        {
            Ok(orders) => {
                exceptions.stale_work_orders = find_stale_work_orders(
                    &orders,
                    &rc.open_wo_statuses,
                    today,
                    rc.stale_wo_days,
                    rc.critical_wo_days,
                )
            }
            Err(e) => Self::record_failure(&mut exceptions, "stale work orders", e.to_string()),
        }

        match timed("quantity_snapshots", limit, self.store.quantity_snapshots()).await {
            Ok(snapshots) => {
                exceptions.variances = find_variances(&snapshots, rc.variance_threshold_pct)
            }
            Err(e) => Self::record_failure(&mut exceptions, "quantity variances", e.to_string()),
        }

        tracing::info!(
            "Reconciliation found {} exceptions ({} checks incomplete)",
            exceptions.total(),
            exceptions.failures.len()
        );
        Ok(exceptions)
    }

    async fn transform(
        &self,
        mut exceptions: ReconciliationExceptions,
    ) -> Result<ReconciliationArtifacts> {
        score_all(&mut exceptions.duplicates, self.now);
        let report = render_reconciliation_report(&exceptions, self.now);
        let csv = render_exceptions_csv(&exceptions)?;
        Ok(ReconciliationArtifacts {
            exceptions,
            report,
            csv,
        })
    }

    async fn load(&self, artifacts: ReconciliationArtifacts) -> Result<JobSummary> {
        let stamp = artifact_timestamp(self.now);
        let report_path = artifact_path(
            &self.folders.reconciliation,
            &format!("Reconciliation_{}.txt", stamp),
        );
        let csv_path = artifact_path(
            &self.folders.reconciliation,
            &format!("Reconciliation_Exceptions_{}.csv", stamp),
        );

        self.storage
            .write_file(&report_path, artifacts.report.as_bytes())
            .await?;
        self.storage
            .write_file(&csv_path, artifacts.csv.as_bytes())
            .await?;
        tracing::info!("📁 Reconciliation saved to: {}", report_path);

        let composer = AlertComposer::new(&self.config.alerts);
        dispatch(
            self.notifier.as_ref(),
            [
                composer.unauthorized_transfers(&artifacts.exceptions.unauthorized),
                composer.reconciliation_summary(&artifacts.exceptions, &report_path),
            ],
        )
        .await;

        Ok(JobSummary {
            job: self.name().to_string(),
            artifacts: vec![report_path, csv_path],
            items: artifacts.exceptions.total(),
            failures: artifacts.exceptions.failures.len(),
        })
    }
}
