pub mod engine;
pub mod jobs;

pub use engine::{JobEngine, OutputFolders};
pub use jobs::{AnalysisJob, CleanupJob, ReconciliationJob};
