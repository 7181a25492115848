#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use inventory_control::adapters::memory_store::{Dataset, InMemoryStore, StoredLine};
use inventory_control::domain::model::{
    QuantitySnapshot, ScanSource, TransactionLineRef, UnauthorizedTransfer, WorkOrderRef,
};
use inventory_control::domain::ports::{FieldDirectory, InventoryStore, ValueCount};
use inventory_control::utils::error::{InventoryError, Result};
use inventory_control::InventoryConfig;
use std::collections::{HashMap, HashSet};

pub const LOT_FIELD: &str = "L100000001";

/// 03:00 UTC, inside the default off-peak window.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap()
}

pub fn config(base_path: &str, extra: &str) -> InventoryConfig {
    let toml = format!(
        r#"
[job]
name = "integration"

[source]
type = "memory"
dataset_path = "unused.json"

[fields]
include_native = false
known_lot_fields = ["{lot}"]

[output]
base_path = "{base}"

[alerts]
standard_recipients = ["inventory.manager@company.com"]
unauthorized_transfer_recipients = ["security@company.com"]
critical_recipients = ["cfo@company.com"]

{extra}
"#,
        lot = LOT_FIELD,
        base = base_path.replace('\\', "/"),
        extra = extra
    );
    InventoryConfig::from_toml_str(&toml).unwrap()
}

pub fn line(
    id: &str,
    field: &str,
    value: &str,
    quantity: f64,
    modified_days_ago: i64,
) -> StoredLine {
    StoredLine {
        line: TransactionLineRef {
            transaction_id: id.to_string(),
            line_id: "1".to_string(),
            transaction_number: Some(format!("TXN-{}", id)),
            transaction_type: "Item Receipt".to_string(),
            date: Some((now() - Duration::days(modified_days_ago)).date_naive()),
            item: "Widget A".to_string(),
            item_id: "100".to_string(),
            quantity: Some(quantity),
            location: Some("Main Warehouse".to_string()),
            created_by: Some("buyer".to_string()),
            last_modified: Some(now() - Duration::days(modified_days_ago)),
        },
        values: HashMap::from([(field.to_string(), value.to_string())]),
        mainline: false,
        active: true,
    }
}

/// Lots A (qty 5, 1 day), A (qty 0, 400 days), B (qty 0, 400 days).
pub fn scenario_dataset() -> Dataset {
    Dataset {
        lines: vec![
            line("1", LOT_FIELD, "A", 5.0, 1),
            line("2", LOT_FIELD, "A", 0.0, 400),
            line("3", LOT_FIELD, "B", 0.0, 400),
        ],
        ..Dataset::default()
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn transfer(id: &str, status: Option<&str>, date: NaiveDate) -> UnauthorizedTransfer {
    UnauthorizedTransfer {
        transaction_id: id.to_string(),
        transaction_number: format!("IF-{}", id),
        created_by: Some("clerk".to_string()),
        date: Some(date),
        authorization_status: status.map(str::to_string),
    }
}

pub fn work_order(id: &str, status: &str, date: NaiveDate) -> WorkOrderRef {
    WorkOrderRef {
        transaction_id: id.to_string(),
        transaction_number: format!("WO-{}", id),
        item: "Assembly Z".to_string(),
        status: status.to_string(),
        date,
    }
}

pub fn snapshot(item: &str, expected: f64, actual: f64) -> QuantitySnapshot {
    QuantitySnapshot {
        item: item.to_string(),
        item_id: "100".to_string(),
        location: None,
        expected,
        actual,
    }
}

/// Wraps the in-memory store and fails selected calls.
pub struct FlakyStore {
    pub inner: InMemoryStore,
    pub failing_fields: HashSet<String>,
    pub failing_renumber_ids: HashSet<String>,
    pub fail_snapshots: bool,
}

impl FlakyStore {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            inner: InMemoryStore::new(dataset),
            failing_fields: HashSet::new(),
            failing_renumber_ids: HashSet::new(),
            fail_snapshots: false,
        }
    }

    fn check(&self, source: &ScanSource) -> Result<()> {
        match source.field_id() {
            Some(id) if self.failing_fields.contains(id) => Err(InventoryError::Store {
                status: 500,
                message: format!("search on {} failed", id),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl FieldDirectory for FlakyStore {
    async fn list_candidate_field_ids(&self) -> Result<Vec<String>> {
        self.inner.list_candidate_field_ids().await
    }
}

#[async_trait]
impl InventoryStore for FlakyStore {
    async fn count_by_value(&self, source: &ScanSource) -> Result<Vec<ValueCount>> {
        self.check(source)?;
        self.inner.count_by_value(source).await
    }

    async fn lines_with_value(
        &self,
        source: &ScanSource,
        value: &str,
    ) -> Result<Vec<TransactionLineRef>> {
        self.check(source)?;
        self.inner.lines_with_value(source, value).await
    }

    async fn renumber_line(
        &self,
        source: &ScanSource,
        line: &TransactionLineRef,
        from: &str,
        to: &str,
    ) -> Result<()> {
        if self.failing_renumber_ids.contains(&line.transaction_id) {
            return Err(InventoryError::Store {
                status: 409,
                message: "record locked".to_string(),
            });
        }
        self.inner.renumber_line(source, line, from, to).await
    }

    async fn unauthorized_fulfillments(
        &self,
        since: NaiveDate,
        authorization_field: &str,
        approved_value: &str,
    ) -> Result<Vec<UnauthorizedTransfer>> {
        self.inner
            .unauthorized_fulfillments(since, authorization_field, approved_value)
            .await
    }

    async fn open_work_orders(
        &self,
        statuses: &[String],
        on_or_before: NaiveDate,
    ) -> Result<Vec<WorkOrderRef>> {
        self.inner.open_work_orders(statuses, on_or_before).await
    }

    async fn quantity_snapshots(&self) -> Result<Vec<QuantitySnapshot>> {
        if self.fail_snapshots {
            return Err(InventoryError::Timeout {
                operation: "quantity_snapshots".to_string(),
                seconds: 30,
            });
        }
        self.inner.quantity_snapshots().await
    }
}
