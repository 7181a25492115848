//! JSON-backed record store used by demo mode and tests.

use crate::config::toml_config::ValueNormalization;
use crate::core::reconciliation::is_unauthorized;
use crate::core::scanner::GroupAccumulator;
use crate::domain::model::{
    QuantitySnapshot, ScanSource, TransactionLineRef, UnauthorizedTransfer, WorkOrderRef,
};
use crate::domain::ports::{FieldDirectory, InventoryStore, ValueCount};
use crate::utils::error::{InventoryError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;

/// One transaction line with its custom field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLine {
    #[serde(flatten)]
    pub line: TransactionLineRef,
    /// field id -> value
    #[serde(default)]
    pub values: HashMap<String, String>,
    #[serde(default)]
    pub mainline: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeNumberKind {
    Serial,
    Lot,
}

/// Entry of the native inventory-number registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryNumberRecord {
    pub id: String,
    pub number: String,
    pub kind: NativeNumberKind,
    pub item: String,
    pub item_id: String,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub quantity_on_hand: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl InventoryNumberRecord {
    fn as_line(&self) -> TransactionLineRef {
        TransactionLineRef {
            transaction_id: self.id.clone(),
            line_id: String::new(),
            transaction_number: None,
            transaction_type: "Inventory".to_string(),
            date: self.expiration_date,
            item: self.item.clone(),
            item_id: self.item_id.clone(),
            quantity: self.quantity_on_hand,
            location: self.location.clone(),
            created_by: None,
            last_modified: None,
        }
    }

    fn matches(&self, source: &ScanSource) -> bool {
        self.active
            && matches!(
                (source, self.kind),
                (ScanSource::NativeSerial, NativeNumberKind::Serial)
                    | (ScanSource::NativeLot, NativeNumberKind::Lot)
            )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub custom_fields: Vec<String>,
    #[serde(default)]
    pub lines: Vec<StoredLine>,
    #[serde(default)]
    pub inventory_numbers: Vec<InventoryNumberRecord>,
    /// Item fulfillments with whatever authorization status they carry.
    #[serde(default)]
    pub fulfillments: Vec<UnauthorizedTransfer>,
    #[serde(default)]
    pub work_orders: Vec<WorkOrderRef>,
    #[serde(default)]
    pub snapshots: Vec<QuantitySnapshot>,
}

fn default_active() -> bool {
    true
}

impl Dataset {
    /// 沒有行識別碼的明細依其在單據內的順序編號（1 起算）
    fn assign_line_ids(&mut self) {
        let mut positions: HashMap<String, usize> = HashMap::new();
        for stored in &mut self.lines {
            let position = positions
                .entry(stored.line.transaction_id.clone())
                .or_default();
            *position += 1;
            if stored.line.line_id.is_empty() {
                stored.line.line_id = position.to_string();
            }
        }
    }

    /// Rows a scan of `source` sees, in stored order. Inactive records and
    /// header lines never appear.
    fn keyed_rows(&self, source: &ScanSource) -> Vec<(Option<String>, TransactionLineRef)> {
        match source {
            ScanSource::CustomField { field_id, .. } => self
                .lines
                .iter()
                .filter(|l| l.active && !l.mainline)
                .map(|l| (l.values.get(field_id).cloned(), l.line.clone()))
                .collect(),
            native => self
                .inventory_numbers
                .iter()
                .filter(|n| n.matches(native))
                .map(|n| (Some(n.number.clone()), n.as_line()))
                .collect(),
        }
    }
}

pub struct InMemoryStore {
    dataset: Mutex<Dataset>,
}

impl InMemoryStore {
    pub fn new(mut dataset: Dataset) -> Self {
        dataset.assign_line_ids();
        Self {
            dataset: Mutex::new(dataset),
        }
    }

    /// 從 JSON 檔案載入資料集
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let dataset: Dataset = serde_json::from_str(&content)?;
        tracing::debug!(
            "Loaded dataset: {} lines, {} inventory numbers",
            dataset.lines.len(),
            dataset.inventory_numbers.len()
        );
        Ok(Self::new(dataset))
    }

    /// Copy of the current state.
    pub async fn dataset(&self) -> Dataset {
        self.dataset.lock().await.clone()
    }
}

#[async_trait]
impl FieldDirectory for InMemoryStore {
    async fn list_candidate_field_ids(&self) -> Result<Vec<String>> {
        let dataset = self.dataset.lock().await;
        let mut ids = dataset.custom_fields.clone();
        for line in &dataset.lines {
            let mut keys: Vec<&String> = line.values.keys().collect();
            keys.sort();
            for key in keys {
                if !ids.contains(key) {
                    ids.push(key.clone());
                }
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn count_by_value(&self, source: &ScanSource) -> Result<Vec<ValueCount>> {
        let dataset = self.dataset.lock().await;
        let mut acc = GroupAccumulator::new(ValueNormalization::None);
        acc.extend(dataset.keyed_rows(source));

        Ok(acc
            .counts()
            .into_iter()
            .map(|(value, count)| ValueCount {
                value,
                count: u32::try_from(count).unwrap_or(u32::MAX),
            })
            .collect())
    }

    async fn lines_with_value(
        &self,
        source: &ScanSource,
        value: &str,
    ) -> Result<Vec<TransactionLineRef>> {
        let dataset = self.dataset.lock().await;
        Ok(dataset
            .keyed_rows(source)
            .into_iter()
            .filter(|(key, _)| key.as_deref() == Some(value))
            .map(|(_, line)| line)
            .collect())
    }

    async fn renumber_line(
        &self,
        source: &ScanSource,
        line: &TransactionLineRef,
        from: &str,
        to: &str,
    ) -> Result<()> {
        let mut dataset = self.dataset.lock().await;
        let mut updated = 0usize;

        match source {
            ScanSource::CustomField { field_id, .. } => {
                // 只改這一行，同單據的其他行保持原值
                let target = dataset
                    .lines
                    .iter_mut()
                    .filter(|l| l.line.same_line(line))
                    .find_map(|l| l.values.get_mut(field_id).filter(|v| v.as_str() == from));
                if let Some(value) = target {
                    *value = to.to_string();
                    updated += 1;
                }
            }
            native => {
                for record in dataset
                    .inventory_numbers
                    .iter_mut()
                    .filter(|n| n.id == line.transaction_id && n.matches(native))
                {
                    if record.number == from {
                        record.number = to.to_string();
                        updated += 1;
                    }
                }
            }
        }

        if updated == 0 {
            return Err(InventoryError::Store {
                status: 404,
                message: format!(
                    "no {} line {} holds '{}'",
                    source.label(),
                    line.member_label(),
                    from
                ),
            });
        }
        Ok(())
    }

    async fn unauthorized_fulfillments(
        &self,
        since: NaiveDate,
        _authorization_field: &str,
        approved_value: &str,
    ) -> Result<Vec<UnauthorizedTransfer>> {
        let dataset = self.dataset.lock().await;
        Ok(dataset
            .fulfillments
            .iter()
            .filter(|f| f.date.is_some_and(|d| d >= since))
            .filter(|f| is_unauthorized(f, approved_value))
            .cloned()
            .collect())
    }

    async fn open_work_orders(
        &self,
        statuses: &[String],
        on_or_before: NaiveDate,
    ) -> Result<Vec<WorkOrderRef>> {
        let dataset = self.dataset.lock().await;
        Ok(dataset
            .work_orders
            .iter()
            .filter(|wo| statuses.contains(&wo.status) && wo.date <= on_or_before)
            .cloned()
            .collect())
    }

    async fn quantity_snapshots(&self) -> Result<Vec<QuantitySnapshot>> {
        Ok(self.dataset.lock().await.snapshots.clone())
    }
}
