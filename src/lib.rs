pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod demo;
pub mod domain;
pub mod utils;

pub use adapters::{HttpInventoryStore, InMemoryStore, LocalStorage, LogNotifier};
pub use app::{AnalysisJob, CleanupJob, JobEngine, ReconciliationJob};
pub use config::InventoryConfig;
pub use utils::error::{InventoryError, Result};
