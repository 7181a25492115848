pub mod mock_data;

pub use mock_data::{demo_rng, generate_transactions, to_dataset};

use crate::config::toml_config::InventoryConfig;
use crate::utils::error::Result;

/// Used by `demo` when no configuration file is present.
const DEMO_CONFIG: &str = r#"
[job]
name = "inventory-control-demo"
description = "Mock transactions against the in-memory store"

[source]
type = "memory"
dataset_path = "demo-dataset.json"

[output]
base_path = "./demo-output"

[alerts]
author = "demo"
standard_recipients = ["inventory.manager@company.com"]
unauthorized_transfer_recipients = ["security@company.com"]
critical_recipients = ["cost.accountant@company.com"]
"#;

pub fn demo_config() -> Result<InventoryConfig> {
    InventoryConfig::from_toml_str(DEMO_CONFIG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::Validate;

    #[test]
    fn test_builtin_demo_config_is_valid() {
        let config = demo_config().unwrap();
        assert!(config.validate().is_ok());
        assert!(config.cleanup.dry_run);
        assert_eq!(config.output.base_path, "./demo-output");
    }
}
