pub mod http_store;
pub mod local_storage;
pub mod memory_store;
pub mod notifier;

pub use http_store::HttpInventoryStore;
pub use local_storage::LocalStorage;
pub use memory_store::{Dataset, InMemoryStore};
pub use notifier::{LogNotifier, RecordingNotifier};
