//! Cleanup run: loads the latest analysis artifact and renumbers (or flags)
//! the duplicate groups it lists.

use super::analysis_job::ANALYSIS_PREFIX;
use super::{dispatch, timed};
use crate::app::engine::{artifact_path, artifact_timestamp, OutputFolders};
use crate::config::toml_config::InventoryConfig;
use crate::core::alerts::AlertComposer;
use crate::core::renumber::{RenumberPlanner, SequentialSuffix};
use crate::core::report::{parse_analysis_csv, render_backup_csv, render_cleanup_report};
use crate::domain::model::{
    CleanupOutcome, CleanupStrategy, DuplicateGroup, MemberFailure, RenumberChange,
};
use crate::domain::ports::{InventoryStore, Job, JobSummary, Notifier, Storage};
use crate::utils::error::{InventoryError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use std::io::Write;
use std::sync::Arc;
use zip::write::{FileOptions, ZipWriter};

/// `start > end` wraps past midnight (e.g. 22 -> 4).
pub fn is_off_peak(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// Newest `Duplicate_Analysis_*.csv` by name.
pub fn latest_analysis_artifact(names: &[String]) -> Option<&String> {
    names
        .iter()
        .filter(|n| n.starts_with(ANALYSIS_PREFIX) && n.ends_with(".csv"))
        .max()
}

#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub path: String,
    pub groups: Vec<DuplicateGroup>,
}

pub struct CleanupJob<S: Storage, R: InventoryStore> {
    config: Arc<InventoryConfig>,
    folders: OutputFolders,
    store: Arc<R>,
    storage: S,
    notifier: Arc<dyn Notifier>,
    strategy: CleanupStrategy,
    dry_run: bool,
    now: DateTime<Utc>,
}

impl<S: Storage, R: InventoryStore> CleanupJob<S, R> {
    pub fn new(
        config: Arc<InventoryConfig>,
        store: Arc<R>,
        storage: S,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let folders = OutputFolders::resolve(&config.output);
        let strategy = config.cleanup.strategy;
        let dry_run = config.cleanup.dry_run;
        Self {
            config,
            folders,
            store,
            storage,
            notifier,
            strategy,
            dry_run,
            now: Utc::now(),
        }
    }

    pub fn with_strategy(mut self, strategy: CleanupStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Only live renumbering is restricted to the off-peak window.
    fn check_window(&self) -> Result<()> {
        if self.dry_run || self.strategy == CleanupStrategy::Flag {
            return Ok(());
        }
        let hour = self.now.hour();
        let (start, end) = (
            self.config.cleanup.off_peak_start_hour,
            self.config.cleanup.off_peak_end_hour,
        );
        if is_off_peak(hour, start, end) {
            Ok(())
        } else {
            Err(InventoryError::OutsideOffPeakWindow { hour, start, end })
        }
    }

    async fn load_latest_artifact(&self) -> Result<LoadedArtifact> {
        let names = self.storage.list_files(&self.folders.analysis).await?;
        let name = latest_analysis_artifact(&names).ok_or_else(|| InventoryError::ArtifactLoad {
            path: self.folders.analysis.clone(),
            message: "no analysis file found".to_string(),
        })?;
        let path = artifact_path(&self.folders.analysis, name);
        tracing::info!("📥 Loading analysis artifact {}", path);

        let bytes = self
            .storage
            .read_file(&path)
            .await
            .map_err(|e| InventoryError::ArtifactLoad {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let contents = String::from_utf8(bytes).map_err(|e| InventoryError::ArtifactLoad {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let groups = parse_analysis_csv(&path, &contents)?;

        Ok(LoadedArtifact { path, groups })
    }

    /// Re-reads the members of a group so renumbering acts on current data.
    /// Falls back to the artifact rows if the store lookup fails.
    async fn refresh_members(&self, group: &mut DuplicateGroup) {
        if let Some(source) = group.source() {
            let lookup = timed(
                &format!("lines_with_value({}, {})", source.label(), group.value),
                self.config.store_timeout(),
                self.store.lines_with_value(&source, &group.value),
            )
            .await;
            match lookup {
                Ok(lines) => group.members = lines,
                Err(e) => tracing::warn!(
                    "⚠️ Using artifact rows for '{}' ({}): {}",
                    group.value,
                    source.label(),
                    e
                ),
            }
        }
    }

    async fn write_backup(&self, groups: &[DuplicateGroup]) -> Result<String> {
        let csv = render_backup_csv(groups)?;
        let stamp = artifact_timestamp(self.now);
        let csv_name = format!("Backup_{}.csv", stamp);

        if !self.config.output.compress_backups {
            let path = artifact_path(&self.folders.backups, &csv_name);
            self.storage.write_file(&path, csv.as_bytes()).await?;
            return Ok(path);
        }

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            zip.start_file::<_, ()>(csv_name.as_str(), FileOptions::default())?;
            zip.write_all(csv.as_bytes())?;
            zip.finish()?.into_inner()
        };
        let path = artifact_path(&self.folders.backups, &format!("Backup_{}.zip", stamp));
        tracing::debug!("Writing backup ZIP ({} bytes)", zip_data.len());
        self.storage.write_file(&path, &zip_data).await?;
        Ok(path)
    }

    /// Rewrites the planned members after the first. Failures are recorded on
    /// the change and the remaining members still run; members over the
    /// per-group limit are left untouched and keep the change unapplied.
    async fn apply(&self, group: &DuplicateGroup, change: &mut RenumberChange) {
        let Some(source) = group.source() else {
            change.failures.push(MemberFailure {
                member_id: "N/A".to_string(),
                message: format!("group '{}' has no field id", group.value),
            });
            return;
        };

        let planned = change.affected_member_ids.len();
        for member in group.members.iter().skip(1).take(planned) {
            let member_id = member.member_label();
            let result = timed(
                &format!("renumber_line({}, {})", source.label(), member_id),
                self.config.store_timeout(),
                self.store
                    .renumber_line(&source, member, &change.original_value, &change.new_value),
            )
            .await;

            if let Err(e) = result {
                let err = InventoryError::RenumberApply {
                    value: change.original_value.clone(),
                    member_id: member_id.clone(),
                    message: e.to_string(),
                };
                tracing::warn!("⚠️ {}", err);
                change.failures.push(MemberFailure {
                    member_id,
                    message: e.to_string(),
                });
            }
        }

        change.applied = change.failures.is_empty() && change.skipped_member_ids.is_empty();
        if !change.skipped_member_ids.is_empty() {
            tracing::warn!(
                "⚠️ {} -> {} left {} lines on the old value",
                change.original_value,
                change.new_value,
                change.skipped_member_ids.len()
            );
        }
        if change.applied {
            tracing::info!(
                "Renumbered {} -> {} ({} lines)",
                change.original_value,
                change.new_value,
                change.affected_member_ids.len()
            );
        }
    }
}

#[async_trait]
impl<S: Storage, R: InventoryStore> Job for CleanupJob<S, R> {
    type Extracted = LoadedArtifact;
    type Output = CleanupOutcome;

    fn name(&self) -> &str {
        "duplicate-cleanup"
    }

    async fn extract(&self) -> Result<LoadedArtifact> {
        self.check_window()?;
        let artifact = self.load_latest_artifact().await?;
        tracing::info!(
            "Loaded {} duplicate groups from {}",
            artifact.groups.len(),
            artifact.path
        );
        Ok(artifact)
    }

    async fn transform(&self, artifact: LoadedArtifact) -> Result<CleanupOutcome> {
        let cap = self.config.cleanup.max_records_per_run;
        let mut batch: Vec<DuplicateGroup> = artifact.groups.iter().take(cap).cloned().collect();

        if self.strategy == CleanupStrategy::Flag {
            tracing::info!("🚩 Flagging {} groups for manual review", batch.len());
            return Ok(CleanupOutcome {
                strategy: self.strategy,
                dry_run: self.dry_run,
                processed: batch.len(),
                changes: Vec::new(),
                flagged: batch,
            });
        }

        for group in batch.iter_mut() {
            self.refresh_members(group).await;
        }

        if !self.dry_run && self.config.cleanup.create_backup {
            let backup = self.write_backup(&batch).await?;
            tracing::info!("💾 Backup saved to: {}", backup);
        }

        let mut planner = RenumberPlanner::new(
            self.config.cleanup.renumber_prefix.clone(),
            cap,
            SequentialSuffix::starting_at(self.config.cleanup.renumber_start),
        )
        .with_member_limit(self.config.cleanup.max_lines_per_group)
        .with_catalog(artifact.groups.iter().map(|g| g.value.clone()));
        let mut changes = planner.plan(&batch, self.dry_run);

        if !self.dry_run {
            for (group, change) in batch.iter().zip(changes.iter_mut()) {
                self.apply(group, change).await;
            }
        }

        Ok(CleanupOutcome {
            strategy: self.strategy,
            dry_run: self.dry_run,
            processed: changes.len(),
            changes,
            flagged: Vec::new(),
        })
    }

    async fn load(&self, outcome: CleanupOutcome) -> Result<JobSummary> {
        let path = artifact_path(
            &self.folders.cleanup,
            &format!("Cleanup_Report_{}.txt", artifact_timestamp(self.now)),
        );
        self.storage
            .write_file(&path, render_cleanup_report(&outcome).as_bytes())
            .await?;
        tracing::info!("📁 Cleanup report saved to: {}", path);

        let composer = AlertComposer::new(&self.config.alerts);
        dispatch(
            self.notifier.as_ref(),
            [composer.cleanup_complete(&outcome, &path)],
        )
        .await;

        Ok(JobSummary {
            job: self.name().to_string(),
            artifacts: vec![path],
            items: outcome.processed,
            failures: outcome.failed_count(),
        })
    }
}
