use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Field resolution failed for {kind} fields: {message}")]
    FieldResolution { kind: String, message: String },

    #[error("Scan failed for {source_label}: {message}")]
    Scan {
        source_label: String,
        message: String,
    },

    #[error("Renumber of '{value}' failed on {member_id}: {message}")]
    RenumberApply {
        value: String,
        member_id: String,
        message: String,
    },

    #[error("Analysis artifact '{path}' could not be loaded: {message}")]
    ArtifactLoad { path: String, message: String },

    #[error("Record store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Record store returned {status}: {message}")]
    Store { status: u16, message: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Zip operation failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration '{field}'")]
    MissingConfig { field: String },

    #[error("Destructive cleanup is only allowed between {start}:00 and {end}:00 (current hour: {hour})")]
    OutsideOffPeakWindow { hour: u32, start: u32, end: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    RecordStore,
    Artifact,
    Cleanup,
    Scheduling,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl InventoryError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            InventoryError::Config { .. }
            | InventoryError::ConfigValidation { .. }
            | InventoryError::InvalidConfigValue { .. }
            | InventoryError::MissingConfig { .. } => ErrorCategory::Configuration,
            InventoryError::FieldResolution { .. }
            | InventoryError::Scan { .. }
            | InventoryError::Http(_)
            | InventoryError::Store { .. }
            | InventoryError::Timeout { .. } => ErrorCategory::RecordStore,
            InventoryError::ArtifactLoad { .. }
            | InventoryError::Csv(_)
            | InventoryError::Zip(_)
            | InventoryError::Serialization(_) => ErrorCategory::Artifact,
            InventoryError::RenumberApply { .. } => ErrorCategory::Cleanup,
            InventoryError::OutsideOffPeakWindow { .. } => ErrorCategory::Scheduling,
            InventoryError::Io(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 時段限制：下次排程再跑即可
            InventoryError::OutsideOffPeakWindow { .. } => ErrorSeverity::Low,
            InventoryError::Http(_)
            | InventoryError::Store { .. }
            | InventoryError::Timeout { .. }
            | InventoryError::Scan { .. }
            | InventoryError::FieldResolution { .. } => ErrorSeverity::Medium,
            InventoryError::RenumberApply { .. }
            | InventoryError::ArtifactLoad { .. }
            | InventoryError::Csv(_)
            | InventoryError::Serialization(_)
            | InventoryError::Config { .. }
            | InventoryError::ConfigValidation { .. }
            | InventoryError::InvalidConfigValue { .. }
            | InventoryError::MissingConfig { .. } => ErrorSeverity::High,
            InventoryError::Io(_) | InventoryError::Zip(_) => ErrorSeverity::Critical,
        }
    }

    /// Whether this error must abort the whole run instead of being recorded
    /// as a partial failure.
    pub fn is_run_fatal(&self) -> bool {
        !matches!(
            self,
            InventoryError::FieldResolution { .. }
                | InventoryError::Scan { .. }
                | InventoryError::RenumberApply { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the TOML configuration file and any ${VAR} environment substitutions"
            }
            ErrorCategory::RecordStore => {
                "Verify the record store endpoint is reachable and retry the run"
            }
            ErrorCategory::Artifact => {
                "Run the duplicate analysis first so a valid Duplicate_Analysis_*.csv exists"
            }
            ErrorCategory::Cleanup => "Review the cleanup report and re-run for the failed groups",
            ErrorCategory::Scheduling => {
                "Schedule the cleanup inside the off-peak window or run it as a dry run"
            }
            ErrorCategory::System => "Check disk space and permissions on the output directory",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            InventoryError::ArtifactLoad { path, .. } => {
                format!("No usable duplicate analysis found at {}", path)
            }
            InventoryError::OutsideOffPeakWindow { start, end, .. } => {
                format!("Cleanup may only modify records between {}:00 and {}:00", start, end)
            }
            InventoryError::Timeout { operation, .. } => {
                format!("The record store did not answer in time ({})", operation)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;
