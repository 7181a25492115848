//! Resolves which custom lot / unit fields a run scans.

use crate::config::toml_config::InventoryConfig;
use crate::domain::model::FieldKind;
use crate::domain::ports::FieldDirectory;
use crate::utils::error::{InventoryError, Result};
use regex::Regex;

/// Compiled `^<prefix>\d{9}$` matcher. The prefix is case-insensitive, the
/// suffix must be exactly nine ASCII digits.
#[derive(Debug, Clone)]
pub struct FieldPattern {
    regex: Regex,
}

impl FieldPattern {
    pub fn new(prefix: &str) -> Result<Self> {
        let pattern = format!(r"^(?i:{})[0-9]{{9}}$", regex::escape(prefix));
        let regex = Regex::new(&pattern).map_err(|e| InventoryError::Config {
            message: format!("invalid field prefix '{}': {}", prefix, e),
        })?;
        Ok(Self { regex })
    }

    pub fn matches(&self, field_id: &str) -> bool {
        self.regex.is_match(field_id)
    }
}

/// Keeps candidates matching `pattern`, in listing order.
pub fn filter_candidates(pattern: &FieldPattern, candidates: &[String]) -> Vec<String> {
    candidates
        .iter()
        .filter(|id| pattern.matches(id))
        .cloned()
        .collect()
}

pub struct FieldCatalog<'a, D: FieldDirectory + ?Sized> {
    config: &'a InventoryConfig,
    directory: &'a D,
}

impl<'a, D: FieldDirectory + ?Sized> FieldCatalog<'a, D> {
    pub fn new(config: &'a InventoryConfig, directory: &'a D) -> Self {
        Self { config, directory }
    }

    /// Fixed list when configured, otherwise pattern discovery over the
    /// directory listing.
    pub async fn resolve_fields(&self, kind: FieldKind) -> Result<Vec<String>> {
        let known = self.config.known_fields(kind);
        if !known.is_empty() {
            tracing::debug!("Using {} configured {} fields", known.len(), kind);
            return Ok(known.to_vec());
        }

        let pattern = FieldPattern::new(self.config.field_prefix(kind)).map_err(|e| {
            InventoryError::FieldResolution {
                kind: kind.to_string(),
                message: e.to_string(),
            }
        })?;

        let candidates = self
            .directory
            .list_candidate_field_ids()
            .await
            .map_err(|e| InventoryError::FieldResolution {
                kind: kind.to_string(),
                message: e.to_string(),
            })?;

        let fields = filter_candidates(&pattern, &candidates);
        tracing::debug!(
            "Discovered {} {} fields out of {} candidates",
            fields.len(),
            kind,
            candidates.len()
        );
        Ok(fields)
    }
}
