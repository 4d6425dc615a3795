// Task-level operations on top of the store

use crate::blob::BlobStore;
use crate::error::StoreError;
use crate::filter::{StatusFilter, TaskFilter, TaskStats, sort_newest_first};
use crate::models::{Priority, Task, TaskUpdate, now_ms};
use crate::store::Store;
use tracing::{debug, info};
use uuid::Uuid;

/// Input for [`TaskManager::create_task`]
///
/// Only the title is required; everything else has the usual defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<i64>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            priority: Priority::default(),
            due_date: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn due_date(mut self, due_date: Option<i64>) -> Self {
        self.due_date = due_date;
        self
    }
}

/// Task service: assigns ids and timestamps, validates titles, and derives
/// the filtered and sorted views the UI shows
pub struct TaskManager<B: BlobStore> {
    store: Store<B>,
}

impl<B: BlobStore> TaskManager<B> {
    pub fn new(store: Store<B>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store<B> {
        &self.store
    }

    /// Create and persist a new task
    pub fn create_task(&mut self, new: NewTask) -> Result<Task, StoreError> {
        validate_title(&new.title)?;

        let now = now_ms();
        let task = Task {
            id: Uuid::now_v7().to_string(),
            title: new.title,
            description: new.description,
            completed: false,
            created_at: now,
            updated_at: now,
            due_date: new.due_date,
            priority: new.priority,
        };

        self.store.add_task(task.clone())?;
        info!(id = %task.id, priority = %task.priority, "Created task");
        Ok(task)
    }

    pub fn get_all_tasks(&self) -> Vec<Task> {
        self.store.load_tasks()
    }

    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.store.load_tasks().into_iter().find(|t| t.id == id)
    }

    /// Tasks matching every criterion set in `filter`, in stored order
    pub fn get_tasks_by_filter(&self, filter: &TaskFilter) -> Vec<Task> {
        filter.apply(self.store.load_tasks())
    }

    /// Tasks for one status tab, newest first
    pub fn list(&self, status: StatusFilter) -> Vec<Task> {
        let mut tasks = self.get_tasks_by_filter(&status.into());
        sort_newest_first(&mut tasks);
        tasks
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.store.load_tasks())
    }

    /// Flip `completed` on the task with `id`; a missing id does nothing
    pub fn toggle_task_completion(&mut self, id: &str) -> Result<Option<Task>, StoreError> {
        let Some(task) = self.get_task(id) else {
            debug!(id, "toggle_task_completion: no such task");
            return Ok(None);
        };

        let toggled = self
            .store
            .update_task(id, &TaskUpdate::new().completed(!task.completed))?;

        if let Some(t) = &toggled {
            info!(id, completed = t.completed, "Toggled task");
        }
        Ok(toggled)
    }

    /// Apply a partial update; a missing id does nothing
    pub fn update_task(&mut self, id: &str, update: TaskUpdate) -> Result<Option<Task>, StoreError> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }

        let updated = self.store.update_task(id, &update)?;
        if updated.is_some() {
            info!(id, "Updated task");
        }
        Ok(updated)
    }

    /// Delete the task with `id`, returning whether one was removed
    pub fn delete_task(&mut self, id: &str) -> Result<bool, StoreError> {
        let removed = self.store.delete_task(id)?;
        if removed {
            info!(id, "Deleted task");
        }
        Ok(removed)
    }

    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        self.store.clear_all()
    }
}

fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation(
            "task title cannot be empty or whitespace-only".to_string(),
        ));
    }
    Ok(())
}
