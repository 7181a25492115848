pub mod alerts;
pub mod field_catalog;
pub mod priority;
pub mod reconciliation;
pub mod renumber;
pub mod report;
pub mod scanner;

pub use crate::domain::ports::{FieldDirectory, InventoryStore, Job, Notifier, Storage};
pub use crate::utils::error::Result;
