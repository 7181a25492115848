use crate::domain::model::{CleanupStrategy, FieldKind};
use crate::utils::error::{InventoryError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Immutable per-run configuration. Loaded once and passed by reference into
/// every job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    pub job: JobInfo,
    pub source: SourceConfig,
    #[serde(default)]
    pub fields: FieldsConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Http,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub r#type: SourceType,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// JSON dataset for the in-memory store
    #[serde(default)]
    pub dataset_path: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueNormalization {
    #[default]
    None,
    Trim,
    TrimUppercase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsConfig {
    #[serde(default = "default_lot_prefix")]
    pub lot_prefix: String,
    #[serde(default = "default_unit_prefix")]
    pub unit_prefix: String,
    /// 留空則依前綴自動搜尋欄位
    #[serde(default)]
    pub known_lot_fields: Vec<String>,
    #[serde(default)]
    pub known_unit_fields: Vec<String>,
    #[serde(default = "default_true")]
    pub include_native: bool,
    #[serde(default)]
    pub value_normalization: ValueNormalization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_strategy")]
    pub strategy: CleanupStrategy,
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default = "default_max_records_per_run")]
    pub max_records_per_run: usize,
    #[serde(default = "default_max_lines_per_group")]
    pub max_lines_per_group: usize,
    #[serde(default = "default_renumber_prefix")]
    pub renumber_prefix: String,
    #[serde(default = "default_renumber_start")]
    pub renumber_start: u64,
    #[serde(default = "default_true")]
    pub create_backup: bool,
    #[serde(default = "default_off_peak_start")]
    pub off_peak_start_hour: u32,
    #[serde(default = "default_off_peak_end")]
    pub off_peak_end_hour: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "default_stale_wo_days")]
    pub stale_wo_days: i64,
    #[serde(default = "default_critical_wo_days")]
    pub critical_wo_days: i64,
    #[serde(default = "default_open_wo_statuses")]
    pub open_wo_statuses: Vec<String>,
    #[serde(default = "default_variance_threshold_pct")]
    pub variance_threshold_pct: f64,
    #[serde(default = "default_authorization_field")]
    pub authorization_field: String,
    #[serde(default = "default_approved_value")]
    pub authorization_approved_value: String,
    #[serde(default = "default_true")]
    pub check_duplicates: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_analysis_dir")]
    pub analysis_dir: String,
    #[serde(default = "default_cleanup_dir")]
    pub cleanup_dir: String,
    #[serde(default = "default_reconciliation_dir")]
    pub reconciliation_dir: String,
    #[serde(default = "default_backups_dir")]
    pub backups_dir: String,
    #[serde(default)]
    pub compress_backups: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default)]
    pub standard_recipients: Vec<String>,
    #[serde(default)]
    pub unauthorized_transfer_recipients: Vec<String>,
    #[serde(default)]
    pub critical_recipients: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_version() -> String {
    "1.0.0".to_string()
}
fn default_timeout_seconds() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_lot_prefix() -> String {
    "L".to_string()
}
fn default_unit_prefix() -> String {
    "U".to_string()
}
fn default_strategy() -> CleanupStrategy {
    CleanupStrategy::Renumber
}
fn default_max_records_per_run() -> usize {
    100
}
fn default_max_lines_per_group() -> usize {
    10
}
fn default_renumber_prefix() -> String {
    "CLN-".to_string()
}
fn default_renumber_start() -> u64 {
    100_000
}
fn default_off_peak_start() -> u32 {
    2
}
fn default_off_peak_end() -> u32 {
    6
}
fn default_lookback_days() -> i64 {
    1
}
fn default_stale_wo_days() -> i64 {
    30
}
fn default_critical_wo_days() -> i64 {
    90
}
fn default_open_wo_statuses() -> Vec<String> {
    vec![
        "In Process".to_string(),
        "Released".to_string(),
        "Built".to_string(),
    ]
}
fn default_variance_threshold_pct() -> f64 {
    1.0
}
fn default_authorization_field() -> String {
    "custbody_authorization_status".to_string()
}
fn default_approved_value() -> String {
    "Approved".to_string()
}
fn default_base_path() -> String {
    "./output".to_string()
}
fn default_analysis_dir() -> String {
    "Duplicate Analysis".to_string()
}
fn default_cleanup_dir() -> String {
    "Cleanup Reports".to_string()
}
fn default_reconciliation_dir() -> String {
    "Daily Reconciliation".to_string()
}
fn default_backups_dir() -> String {
    "Backups".to_string()
}
fn default_author() -> String {
    "system".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            lot_prefix: default_lot_prefix(),
            unit_prefix: default_unit_prefix(),
            known_lot_fields: Vec::new(),
            known_unit_fields: Vec::new(),
            include_native: true,
            value_normalization: ValueNormalization::None,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            dry_run: true,
            max_records_per_run: default_max_records_per_run(),
            max_lines_per_group: default_max_lines_per_group(),
            renumber_prefix: default_renumber_prefix(),
            renumber_start: default_renumber_start(),
            create_backup: true,
            off_peak_start_hour: default_off_peak_start(),
            off_peak_end_hour: default_off_peak_end(),
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            stale_wo_days: default_stale_wo_days(),
            critical_wo_days: default_critical_wo_days(),
            open_wo_statuses: default_open_wo_statuses(),
            variance_threshold_pct: default_variance_threshold_pct(),
            authorization_field: default_authorization_field(),
            authorization_approved_value: default_approved_value(),
            check_duplicates: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            analysis_dir: default_analysis_dir(),
            cleanup_dir: default_cleanup_dir(),
            reconciliation_dir: default_reconciliation_dir(),
            backups_dir: default_backups_dir(),
            compress_backups: false,
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            author: default_author(),
            standard_recipients: Vec::new(),
            unauthorized_transfer_recipients: Vec::new(),
            critical_recipients: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl InventoryConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(InventoryError::Io)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| InventoryError::ConfigValidation {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${PLATFORM_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| InventoryError::Config {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Configured fixed field list for `kind` (may be empty).
    pub fn known_fields(&self, kind: FieldKind) -> &[String] {
        match kind {
            FieldKind::Lot => &self.fields.known_lot_fields,
            FieldKind::Unit => &self.fields.known_unit_fields,
        }
    }

    pub fn field_prefix(&self, kind: FieldKind) -> &str {
        match kind {
            FieldKind::Lot => &self.fields.lot_prefix,
            FieldKind::Unit => &self.fields.unit_prefix,
        }
    }

    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.source.timeout_seconds)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("job.name", &self.job.name)?;

        match self.source.r#type {
            SourceType::Http => {
                let endpoint =
                    validation::validate_required_field("source.endpoint", &self.source.endpoint)?;
                validation::validate_url("source.endpoint", endpoint)?;
            }
            SourceType::Memory => {
                let path = validation::validate_required_field(
                    "source.dataset_path",
                    &self.source.dataset_path,
                )?;
                validation::validate_path("source.dataset_path", path)?;
            }
        }
        validation::validate_range("source.timeout_seconds", self.source.timeout_seconds, 1, 3600)?;

        validation::validate_field_prefix("fields.lot_prefix", &self.fields.lot_prefix)?;
        validation::validate_field_prefix("fields.unit_prefix", &self.fields.unit_prefix)?;

        validation::validate_positive_number(
            "cleanup.max_records_per_run",
            self.cleanup.max_records_per_run,
            1,
        )?;
        validation::validate_positive_number(
            "cleanup.max_lines_per_group",
            self.cleanup.max_lines_per_group,
            2,
        )?;
        validation::validate_non_empty_string("cleanup.renumber_prefix", &self.cleanup.renumber_prefix)?;
        validation::validate_range("cleanup.off_peak_start_hour", self.cleanup.off_peak_start_hour, 0, 23)?;
        validation::validate_range("cleanup.off_peak_end_hour", self.cleanup.off_peak_end_hour, 0, 24)?;

        if self.reconciliation.variance_threshold_pct <= 0.0 {
            return Err(InventoryError::InvalidConfigValue {
                field: "reconciliation.variance_threshold_pct".to_string(),
                value: self.reconciliation.variance_threshold_pct.to_string(),
                reason: "Variance threshold must be positive".to_string(),
            });
        }
        validation::validate_range("reconciliation.lookback_days", self.reconciliation.lookback_days, 1, 365)?;
        if self.reconciliation.critical_wo_days < self.reconciliation.stale_wo_days {
            return Err(InventoryError::InvalidConfigValue {
                field: "reconciliation.critical_wo_days".to_string(),
                value: self.reconciliation.critical_wo_days.to_string(),
                reason: "Critical age must not be below the stale age".to_string(),
            });
        }

        validation::validate_path("output.base_path", &self.output.base_path)?;

        if self.alerts.enabled {
            if self.alerts.standard_recipients.is_empty() {
                return Err(InventoryError::ConfigValidation {
                    field: "alerts.standard_recipients".to_string(),
                    message: "No email recipients configured".to_string(),
                });
            }
            validation::validate_recipients("alerts.standard_recipients", &self.alerts.standard_recipients)?;
            validation::validate_recipients(
                "alerts.unauthorized_transfer_recipients",
                &self.alerts.unauthorized_transfer_recipients,
            )?;
            validation::validate_recipients("alerts.critical_recipients", &self.alerts.critical_recipients)?;
        }

        Ok(())
    }
}

impl Validate for InventoryConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
pub(crate) fn test_config(base_path: &str) -> InventoryConfig {
    InventoryConfig {
        job: JobInfo {
            name: "test".to_string(),
            description: None,
            version: default_version(),
        },
        source: SourceConfig {
            r#type: SourceType::Memory,
            endpoint: None,
            dataset_path: Some("dataset.json".to_string()),
            timeout_seconds: 5,
            headers: None,
        },
        fields: FieldsConfig::default(),
        cleanup: CleanupConfig::default(),
        reconciliation: ReconciliationConfig::default(),
        output: OutputConfig {
            base_path: base_path.to_string(),
            ..OutputConfig::default()
        },
        alerts: AlertsConfig {
            standard_recipients: vec!["inventory.manager@company.com".to_string()],
            ..AlertsConfig::default()
        },
        logging: LoggingConfig::default(),
    }
}
