use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One line of one inventory transaction, as read from the system of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLineRef {
    pub transaction_id: String,
    /// 交易內的行識別碼；同一張單據可有多行持有相同批號
    #[serde(default)]
    pub line_id: String,
    #[serde(default)]
    pub transaction_number: Option<String>,
    pub transaction_type: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub item: String,
    pub item_id: String,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl TransactionLineRef {
    /// `transaction/line` label used in change records and reports.
    pub fn member_label(&self) -> String {
        if self.line_id.is_empty() {
            self.transaction_id.clone()
        } else {
            format!("{}/{}", self.transaction_id, self.line_id)
        }
    }

    pub fn same_line(&self, other: &TransactionLineRef) -> bool {
        self.transaction_id == other.transaction_id && self.line_id == other.line_id
    }

    /// 最後活動時間：優先 last_modified，否則使用交易日期 (UTC 午夜)
    pub fn activity_at(&self) -> Option<DateTime<Utc>> {
        self.last_modified.or_else(|| {
            self.date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldKind {
    Lot,
    Unit,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Lot => "LOT",
            FieldKind::Unit => "UNIT",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateCategory {
    NativeSerial,
    NativeLot,
    CustomLot,
    CustomUnit,
}

impl DuplicateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateCategory::NativeSerial => "native-serial",
            DuplicateCategory::NativeLot => "native-lot",
            DuplicateCategory::CustomLot => "custom-lot",
            DuplicateCategory::CustomUnit => "custom-unit",
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(
            self,
            DuplicateCategory::NativeSerial | DuplicateCategory::NativeLot
        )
    }

    /// Label written to the report's Type column for native categories.
    pub fn native_label(&self) -> Option<&'static str> {
        match self {
            DuplicateCategory::NativeSerial => Some("Native Serial"),
            DuplicateCategory::NativeLot => Some("Native Lot"),
            _ => None,
        }
    }
}

impl fmt::Display for DuplicateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicateCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "native-serial" => Ok(DuplicateCategory::NativeSerial),
            "native-lot" => Ok(DuplicateCategory::NativeLot),
            "custom-lot" => Ok(DuplicateCategory::CustomLot),
            "custom-unit" => Ok(DuplicateCategory::CustomUnit),
            other => Err(format!("unknown duplicate category '{}'", other)),
        }
    }
}

/// What a single scan runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum ScanSource {
    NativeSerial,
    NativeLot,
    CustomField { kind: FieldKind, field_id: String },
}

impl ScanSource {
    pub fn custom(kind: FieldKind, field_id: impl Into<String>) -> Self {
        ScanSource::CustomField {
            kind,
            field_id: field_id.into(),
        }
    }

    pub fn category(&self) -> DuplicateCategory {
        match self {
            ScanSource::NativeSerial => DuplicateCategory::NativeSerial,
            ScanSource::NativeLot => DuplicateCategory::NativeLot,
            ScanSource::CustomField {
                kind: FieldKind::Lot,
                ..
            } => DuplicateCategory::CustomLot,
            ScanSource::CustomField {
                kind: FieldKind::Unit,
                ..
            } => DuplicateCategory::CustomUnit,
        }
    }

    pub fn field_id(&self) -> Option<&str> {
        match self {
            ScanSource::CustomField { field_id, .. } => Some(field_id.as_str()),
            _ => None,
        }
    }

    /// Human readable label used in logs and failure entries.
    pub fn label(&self) -> String {
        match self {
            ScanSource::NativeSerial => "native serial".to_string(),
            ScanSource::NativeLot => "native lot".to_string(),
            ScanSource::CustomField { kind, field_id } => {
                format!("{} field {}", kind.as_str().to_lowercase(), field_id)
            }
        }
    }

    /// Rebuilds the source a persisted group came from.
    pub fn from_group(category: DuplicateCategory, field_id: Option<&str>) -> Option<Self> {
        match (category, field_id) {
            (DuplicateCategory::NativeSerial, _) => Some(ScanSource::NativeSerial),
            (DuplicateCategory::NativeLot, _) => Some(ScanSource::NativeLot),
            (DuplicateCategory::CustomLot, Some(id)) => Some(ScanSource::custom(FieldKind::Lot, id)),
            (DuplicateCategory::CustomUnit, Some(id)) => {
                Some(ScanSource::custom(FieldKind::Unit, id))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            "CRITICAL" => Ok(Priority::Critical),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

/// A value that occurs more than once for one scan source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub category: DuplicateCategory,
    pub field_id: Option<String>,
    pub value: String,
    pub occurrence_count: u32,
    pub members: Vec<TransactionLineRef>,
    pub priority: Priority,
}

impl DuplicateGroup {
    /// Groups start at LOW until the scorer runs over them.
    pub fn new(
        source: &ScanSource,
        value: impl Into<String>,
        occurrence_count: u32,
        members: Vec<TransactionLineRef>,
    ) -> Self {
        Self {
            category: source.category(),
            field_id: source.field_id().map(str::to_string),
            value: value.into(),
            occurrence_count,
            members,
            priority: Priority::Low,
        }
    }

    pub fn source(&self) -> Option<ScanSource> {
        ScanSource::from_group(self.category, self.field_id.as_deref())
    }

    /// Report Type column: the field id for custom fields, a label for native numbers.
    pub fn type_label(&self) -> &str {
        match (&self.field_id, self.category.native_label()) {
            (Some(field_id), _) => field_id.as_str(),
            (None, Some(label)) => label,
            (None, None) => "N/A",
        }
    }
}

/// A field whose resolution or scan failed during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub target: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub groups: Vec<DuplicateGroup>,
    pub failures: Vec<ScanFailure>,
}

impl AnalysisReport {
    pub fn count_by_priority(&self, priority: Priority) -> usize {
        self.groups.iter().filter(|g| g.priority == priority).count()
    }

    pub fn count_by_category(&self, category: DuplicateCategory) -> usize {
        self.groups.iter().filter(|g| g.category == category).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberFailure {
    pub member_id: String,
    pub message: String,
}

/// Before/after record for one renumbered duplicate group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenumberChange {
    pub category: DuplicateCategory,
    pub field_id: Option<String>,
    pub original_value: String,
    pub new_value: String,
    pub kept_member_id: Option<String>,
    pub affected_member_ids: Vec<String>,
    /// Members beyond the per-group limit; they keep the original value.
    #[serde(default)]
    pub skipped_member_ids: Vec<String>,
    pub applied: bool,
    pub dry_run: bool,
    pub failures: Vec<MemberFailure>,
}

impl RenumberChange {
    /// 超出上限而未改號的成員也算失敗（試跑除外）
    pub fn is_failed(&self) -> bool {
        !self.failures.is_empty() || (!self.dry_run && !self.skipped_member_ids.is_empty())
    }

    pub fn status_label(&self) -> &'static str {
        if self.dry_run {
            "DRY RUN"
        } else if self.applied {
            "COMPLETED"
        } else {
            "FAILED"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CleanupStrategy {
    Renumber,
    Flag,
}

impl FromStr for CleanupStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RENUMBER" => Ok(CleanupStrategy::Renumber),
            "FLAG" | "MANUAL" => Ok(CleanupStrategy::Flag),
            other => Err(format!("unsupported cleanup strategy '{}'", other)),
        }
    }
}

/// Result of one cleanup run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupOutcome {
    pub strategy: CleanupStrategy,
    pub dry_run: bool,
    pub processed: usize,
    pub changes: Vec<RenumberChange>,
    pub flagged: Vec<DuplicateGroup>,
}

impl CleanupOutcome {
    pub fn success_count(&self) -> usize {
        self.changes.iter().filter(|c| c.applied).count()
    }

    pub fn failed_count(&self) -> usize {
        self.changes.iter().filter(|c| c.is_failed()).count()
    }

    pub fn skipped_member_count(&self) -> usize {
        self.changes.iter().map(|c| c.skipped_member_ids.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnauthorizedTransfer {
    pub transaction_id: String,
    pub transaction_number: String,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub authorization_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderRef {
    pub transaction_id: String,
    pub transaction_number: String,
    pub item: String,
    pub status: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleWorkOrder {
    pub work_order: WorkOrderRef,
    pub age_days: i64,
    pub critical: bool,
}

/// Expected versus counted quantity for one item at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitySnapshot {
    pub item: String,
    pub item_id: String,
    #[serde(default)]
    pub location: Option<String>,
    pub expected: f64,
    pub actual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityVariance {
    pub snapshot: QuantitySnapshot,
    pub variance_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReconciliationExceptions {
    pub duplicates: Vec<DuplicateGroup>,
    pub unauthorized: Vec<UnauthorizedTransfer>,
    pub variances: Vec<QuantityVariance>,
    pub stale_work_orders: Vec<StaleWorkOrder>,
    pub failures: Vec<ScanFailure>,
}

impl ReconciliationExceptions {
    pub fn total(&self) -> usize {
        self.duplicates.len()
            + self.unauthorized.len()
            + self.variances.len()
            + self.stale_work_orders.len()
    }
}
