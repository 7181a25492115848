use crate::config::toml_config::OutputConfig;
use crate::domain::ports::{Job, JobSummary};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Report folders, relative to the storage root. Resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFolders {
    pub analysis: String,
    pub cleanup: String,
    pub reconciliation: String,
    pub backups: String,
}

impl OutputFolders {
    pub fn resolve(output: &OutputConfig) -> Self {
        Self {
            analysis: output.analysis_dir.trim_matches('/').to_string(),
            cleanup: output.cleanup_dir.trim_matches('/').to_string(),
            reconciliation: output.reconciliation_dir.trim_matches('/').to_string(),
            backups: output.backups_dir.trim_matches('/').to_string(),
        }
    }
}

/// Timestamp used in artifact names. Sorts lexicographically in time order.
pub fn artifact_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%SZ").to_string()
}

pub fn artifact_path(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder, name)
    }
}

/// Runs one job through extract -> transform -> load.
pub struct JobEngine<J: Job> {
    job: J,
    run_id: Uuid,
}

impl<J: Job> JobEngine<J> {
    pub fn new(job: J) -> Self {
        Self {
            job,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub async fn run(&self) -> Result<JobSummary> {
        let span = tracing::info_span!("job", name = %self.job.name(), run_id = %self.run_id);
        self.run_stages().instrument(span).await
    }

    async fn run_stages(&self) -> Result<JobSummary> {
        let name = self.job.name().to_string();
        let started = Instant::now();
        tracing::info!("Starting {} job", name);

        tracing::debug!("Extracting...");
        let extracted = self.job.extract().await?;

        tracing::debug!("Transforming...");
        let output = self.job.transform(extracted).await?;

        tracing::debug!("Loading...");
        let summary = self.job.load(output).await?;

        tracing::info!(
            "Finished {} job in {:.2}s: {} items, {} failures, {} artifacts",
            name,
            started.elapsed().as_secs_f64(),
            summary.items,
            summary.failures,
            summary.artifacts.len()
        );
        Ok(summary)
    }
}
