//! Scheduled duplicate analysis: resolve fields, scan every source, score,
//! write the analysis CSV plus its summary and send the alerts.

use super::{dispatch, timed};
use crate::app::engine::{artifact_path, artifact_timestamp, OutputFolders};
use crate::config::toml_config::InventoryConfig;
use crate::core::alerts::AlertComposer;
use crate::core::field_catalog::FieldCatalog;
use crate::core::priority::score_all;
use crate::core::report::{render_analysis_csv, render_analysis_summary};
use crate::core::scanner::{normalize, scan};
use crate::domain::model::{
    AnalysisReport, DuplicateGroup, FieldKind, ScanFailure, ScanSource,
};
use crate::domain::ports::{FieldDirectory, InventoryStore, Job, JobSummary, Notifier, Storage};
use crate::utils::error::{InventoryError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

pub const ANALYSIS_PREFIX: &str = "Duplicate_Analysis_";
pub const SUMMARY_PREFIX: &str = "Analysis_Summary_";

/// Store-backed scanner shared by the analysis and reconciliation jobs.
pub struct DuplicateAnalyzer<'a, R: InventoryStore + FieldDirectory> {
    config: &'a InventoryConfig,
    store: &'a R,
}

impl<'a, R: InventoryStore + FieldDirectory> DuplicateAnalyzer<'a, R> {
    pub fn new(config: &'a InventoryConfig, store: &'a R) -> Self {
        Self { config, store }
    }

    /// Sources in scan order: native registries first, then custom lot
    /// fields, then custom unit fields. Resolution failures are returned
    /// alongside and do not stop the other kind.
    pub async fn sources(&self) -> (Vec<ScanSource>, Vec<ScanFailure>) {
        let mut sources = Vec::new();
        let mut failures = Vec::new();

        if self.config.fields.include_native {
            sources.push(ScanSource::NativeSerial);
            sources.push(ScanSource::NativeLot);
        }

        let catalog = FieldCatalog::new(self.config, self.store);
        for kind in [FieldKind::Lot, FieldKind::Unit] {
            let resolved = timed(
                &format!("resolve {} fields", kind),
                self.config.store_timeout(),
                catalog.resolve_fields(kind),
            )
            .await;

            match resolved {
                Ok(fields) => {
                    tracing::info!("Found {} {} fields", fields.len(), kind);
                    sources.extend(fields.into_iter().map(|id| ScanSource::custom(kind, id)));
                }
                Err(e) => {
                    tracing::warn!("⚠️ Skipping {} fields: {}", kind, e);
                    failures.push(ScanFailure {
                        target: format!("{} fields", kind),
                        message: e.to_string(),
                    });
                }
            }
        }

        (sources, failures)
    }

    /// Grouped count first, detail lookups only for repeated values.
    ///
    /// With normalization on, a group's members arrive one raw spelling at a
    /// time: spellings in the store's count order, stored order within each.
    /// A store that counts in first-seen order (the in-memory one does) thus
    /// still puts the earliest stored line first, and that member is the one
    /// a cleanup keeps.
    pub async fn scan_source(&self, source: &ScanSource) -> Result<Vec<DuplicateGroup>> {
        let label = source.label();
        let limit = self.config.store_timeout();
        let normalization = self.config.fields.value_normalization;

        let counts = timed(
            &format!("count_by_value({})", label),
            limit,
            self.store.count_by_value(source),
        )
        .await?;

        // 正規化後合併計數，挑出仍重複的原始值
        let mut totals: HashMap<String, u32> = HashMap::new();
        for vc in &counts {
            *totals.entry(normalize(&vc.value, normalization)).or_default() += vc.count;
        }
        let repeated: Vec<&str> = counts
            .iter()
            .filter(|vc| !vc.value.is_empty())
            .filter(|vc| {
                totals
                    .get(&normalize(&vc.value, normalization))
                    .is_some_and(|total| *total > 1)
            })
            .map(|vc| vc.value.as_str())
            .collect();

        let mut rows = Vec::new();
        for value in repeated {
            let lines = timed(
                &format!("lines_with_value({}, {})", label, value),
                limit,
                self.store.lines_with_value(source, value),
            )
            .await?;
            rows.extend(lines.into_iter().map(|line| (Some(value.to_string()), line)));
        }

        Ok(scan(source, rows, normalization))
    }

    /// Unscored report. A failing source becomes a failure entry.
    pub async fn analyze(&self, generated_at: DateTime<Utc>) -> AnalysisReport {
        let (sources, mut failures) = self.sources().await;
        let mut groups = Vec::new();

        for source in &sources {
            match self.scan_source(source).await {
                Ok(found) => {
                    tracing::debug!("{}: {} duplicate values", source.label(), found.len());
                    groups.extend(found);
                }
                Err(e) => {
                    let err = InventoryError::Scan {
                        source_label: source.label(),
                        message: e.to_string(),
                    };
                    tracing::warn!("⚠️ {}", err);
                    failures.push(ScanFailure {
                        target: source.label(),
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Scanned {} sources: {} duplicate groups, {} failures",
            sources.len(),
            groups.len(),
            failures.len()
        );

        AnalysisReport {
            generated_at,
            groups,
            failures,
        }
    }
}

/// Rendered artifacts waiting to be written.
#[derive(Debug, Clone)]
pub struct AnalysisArtifacts {
    pub report: AnalysisReport,
    pub csv: String,
    pub summary: String,
}

pub struct AnalysisJob<S: Storage, R: InventoryStore + FieldDirectory> {
    config: Arc<InventoryConfig>,
    folders: OutputFolders,
    store: Arc<R>,
    storage: S,
    notifier: Arc<dyn Notifier>,
    now: DateTime<Utc>,
}

impl<S: Storage, R: InventoryStore + FieldDirectory> AnalysisJob<S, R> {
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

    /// Fixes the evaluation time (priority window and artifact names).
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

#[async_trait]
impl<S: Storage, R: InventoryStore + FieldDirectory> Job for AnalysisJob<S, R> {
    type Extracted = AnalysisReport;
    type Output = AnalysisArtifacts;

    fn name(&self) -> &str {
        "duplicate-analysis"
    }

    async fn extract(&self) -> Result<AnalysisReport> {
        let analyzer = DuplicateAnalyzer::new(&self.config, self.store.as_ref());
        Ok(analyzer.analyze(self.now).await)
    }

    async fn transform(&self, mut report: AnalysisReport) -> Result<AnalysisArtifacts> {
        score_all(&mut report.groups, self.now);
        let csv = render_analysis_csv(&report.groups)?;
        let summary = render_analysis_summary(&report);
        Ok(AnalysisArtifacts {
            report,
            csv,
            summary,
        })
    }

    async fn load(&self, artifacts: AnalysisArtifacts) -> Result<JobSummary> {
        let stamp = artifact_timestamp(self.now);
        let csv_path = artifact_path(
            &self.folders.analysis,
            &format!("{}{}.csv", ANALYSIS_PREFIX, stamp),
        );
        let summary_path = artifact_path(
            &self.folders.analysis,
            &format!("{}{}.txt", SUMMARY_PREFIX, stamp),
        );

        self.storage
            .write_file(&csv_path, artifacts.csv.as_bytes())
            .await?;
        self.storage
            .write_file(&summary_path, artifacts.summary.as_bytes())
            .await?;
        tracing::info!("📁 Analysis saved to: {}", csv_path);

        let composer = AlertComposer::new(&self.config.alerts);
        dispatch(
            self.notifier.as_ref(),
            [
                composer.analysis_summary(&artifacts.report, &csv_path),
                composer.critical_escalation(&artifacts.report),
            ],
        )
        .await;

        Ok(JobSummary {
            job: self.name().to_string(),
            artifacts: vec![csv_path, summary_path],
            items: artifacts.report.groups.len(),
            failures: artifacts.report.failures.len(),
        })
    }
}
