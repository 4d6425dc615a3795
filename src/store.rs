// Task persistence over a key-value blob store

use crate::blob::BlobStore;
use crate::error::StoreError;
use crate::models::{AppState, CURRENT_VERSION, Task, TaskUpdate, now_ms};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Key the whole task document is stored under
pub const STORAGE_KEY: &str = "jiffy_app_state";

/// Persistent task collection stored as a single JSON document
///
/// Every mutation is a full load, an in-memory change, and a full save.
/// Mutating methods take `&mut self`, so one store instance never has two
/// read-modify-write cycles in flight.
pub struct Store<B: BlobStore> {
    blob: B,
}

/// Document as read from storage, before per-task validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    tasks: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    last_sync: i64,
}

impl<B: BlobStore> Store<B> {
    pub fn new(blob: B) -> Self {
        Self { blob }
    }

    pub fn blob(&self) -> &B {
        &self.blob
    }

    pub fn into_inner(self) -> B {
        self.blob
    }

    // ========================================================================
    // Whole-document operations
    // ========================================================================

    /// Replace the stored document with `tasks`, stamping `lastSync`
    pub fn save_tasks(&mut self, tasks: &[Task]) -> Result<(), StoreError> {
        let state = AppState::new(tasks.to_vec(), now_ms());
        let json = serde_json::to_string(&state).map_err(StoreError::Encode)?;

        self.blob.set(STORAGE_KEY, &json).map_err(|e| {
            warn!(error = %e, "Failed to save tasks");
            StoreError::StorageWrite(e)
        })?;

        debug!(count = tasks.len(), last_sync = state.last_sync, "Saved tasks");
        Ok(())
    }

    /// Load every stored task
    ///
    /// Never fails: nothing stored, an unreadable blob and an undecodable
    /// document all come back as an empty list. Read failures are logged.
    pub fn load_tasks(&self) -> Vec<Task> {
        match self.load_state() {
            Ok(Some(state)) => state.tasks,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load tasks, starting from an empty list");
                Vec::new()
            }
        }
    }

    /// Load the stored document, reporting read and decode failures
    ///
    /// Returns `Ok(None)` when nothing has been saved yet. Individual task
    /// entries that fail to decode are skipped with a warning rather than
    /// failing the whole document.
    pub fn load_state(&self) -> Result<Option<AppState>, StoreError> {
        let raw = match self.blob.get(STORAGE_KEY).map_err(StoreError::StorageRead)? {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return Ok(None),
        };

        let doc: RawDocument = serde_json::from_str(&raw).map_err(StoreError::MalformedDocument)?;
        Ok(Some(Self::migrate(doc)))
    }

    /// `lastSync` of the stored document, if one can be read
    pub fn last_sync(&self) -> Option<i64> {
        self.load_state().ok().flatten().map(|state| state.last_sync)
    }

    /// Remove the stored document entirely
    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        self.blob.remove(STORAGE_KEY).map_err(|e| {
            warn!(error = %e, "Failed to clear tasks");
            StoreError::StorageWrite(e)
        })?;

        info!("Cleared all tasks");
        Ok(())
    }

    // ========================================================================
    // Per-task operations
    // ========================================================================

    /// Append a task to the stored list
    pub fn add_task(&mut self, task: Task) -> Result<(), StoreError> {
        let mut tasks = self.load_tasks();

        if tasks.iter().any(|t| t.id == task.id) {
            return Err(StoreError::DuplicateId(task.id));
        }

        debug!(id = %task.id, "Adding task");
        tasks.push(task);
        self.save_tasks(&tasks)
    }

    /// Merge `update` into the task with `id` and stamp `updated_at`
    ///
    /// Returns the updated task, or `None` without writing anything when no
    /// task has that id.
    pub fn update_task(&mut self, id: &str, update: &TaskUpdate) -> Result<Option<Task>, StoreError> {
        let mut tasks = self.load_tasks();

        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "update_task: no such task");
            return Ok(None);
        };

        task.apply(update, now_ms());
        let updated = task.clone();

        self.save_tasks(&tasks)?;
        debug!(id, updated_at = updated.updated_at, "Updated task");
        Ok(Some(updated))
    }

    /// Remove the task with `id`, returning whether one was removed
    ///
    /// A missing id leaves the stored document untouched.
    pub fn delete_task(&mut self, id: &str) -> Result<bool, StoreError> {
        let mut tasks = self.load_tasks();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);

        if tasks.len() == before {
            debug!(id, "delete_task: no such task");
            return Ok(false);
        }

        self.save_tasks(&tasks)?;
        debug!(id, remaining = tasks.len(), "Deleted task");
        Ok(true)
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    /// Bring a raw document up to the current schema
    ///
    /// Undecodable entries are skipped, the first of any duplicated id wins,
    /// and `updated_at` is raised to at least `created_at`.
    fn migrate(doc: RawDocument) -> AppState {
        if doc.version > CURRENT_VERSION {
            warn!(
                version = doc.version,
                supported = CURRENT_VERSION,
                "Task document is newer than supported, loading best-effort"
            );
        } else if doc.version < CURRENT_VERSION {
            info!(from = doc.version, to = CURRENT_VERSION, "Migrating task document");
        }

        let entries = doc.tasks.unwrap_or_default();
        let mut seen = HashSet::new();
        let mut tasks = Vec::with_capacity(entries.len());

        for (index, entry) in entries.into_iter().enumerate() {
            let mut task: Task = match serde_json::from_value(entry) {
                Ok(t) => t,
                Err(e) => {
                    warn!(index, error = %e, "Failed to parse stored task, skipping");
                    continue;
                }
            };

            if !seen.insert(task.id.clone()) {
                warn!(index, id = %task.id, "Duplicate task id in stored document, skipping");
                continue;
            }

            if task.updated_at < task.created_at {
                task.updated_at = task.created_at;
            }

            tasks.push(task);
        }

        AppState {
            version: CURRENT_VERSION,
            tasks,
            last_sync: doc.last_sync,
        }
    }
}
