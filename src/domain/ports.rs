use crate::domain::model::{
    QuantitySnapshot, ScanSource, TransactionLineRef, UnauthorizedTransfer, WorkOrderRef,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Artifact storage (report folders).
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// File names (not paths) directly inside `dir`, unsorted.
    fn list_files(
        &self,
        dir: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// One row of a grouped-count query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: u32,
}

/// Lists custom field identifiers defined on transaction lines.
#[async_trait]
pub trait FieldDirectory: Send + Sync {
    async fn list_candidate_field_ids(&self) -> Result<Vec<String>>;
}

/// The system of record. Inactive records and header lines are filtered
/// store-side; callers never re-apply those filters.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn count_by_value(&self, source: &ScanSource) -> Result<Vec<ValueCount>>;

    async fn lines_with_value(
        &self,
        source: &ScanSource,
        value: &str,
    ) -> Result<Vec<TransactionLineRef>>;

    async fn renumber_line(
        &self,
        source: &ScanSource,
        line: &TransactionLineRef,
        from: &str,
        to: &str,
    ) -> Result<()>;

    async fn unauthorized_fulfillments(
        &self,
        since: NaiveDate,
        authorization_field: &str,
        approved_value: &str,
    ) -> Result<Vec<UnauthorizedTransfer>>;

    async fn open_work_orders(
        &self,
        statuses: &[String],
        on_or_before: NaiveDate,
    ) -> Result<Vec<WorkOrderRef>>;

    async fn quantity_snapshots(&self) -> Result<Vec<QuantitySnapshot>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    DuplicateAnalysis,
    CleanupComplete,
    UnauthorizedTransfer,
    Reconciliation,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub author: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<()>;
}

/// 一次排程工作：擷取 -> 轉換 -> 輸出
#[async_trait]
pub trait Job: Send + Sync {
    type Extracted: Send;
    type Output: Send;

    fn name(&self) -> &str;
    async fn extract(&self) -> Result<Self::Extracted>;
    async fn transform(&self, data: Self::Extracted) -> Result<Self::Output>;
    async fn load(&self, output: Self::Output) -> Result<JobSummary>;
}

/// What a finished job reports back to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job: String,
    pub artifacts: Vec<String>,
    pub items: usize,
    pub failures: usize,
}
