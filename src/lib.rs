// Jiffy - single-user task tracking over a local JSON document store

pub mod blob;
pub mod config;
pub mod error;
pub mod filter;
pub mod manager;
pub mod models;
pub mod store;

// Re-export main types for convenience
pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use config::Config;
pub use error::{BlobError, StoreError};
pub use filter::{StatusFilter, TaskFilter, TaskStats};
pub use manager::{NewTask, TaskManager};
pub use models::{AppState, Priority, Task, TaskUpdate, now_ms};
pub use store::{STORAGE_KEY, Store};
