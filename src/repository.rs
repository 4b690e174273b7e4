//! Task repository: the single entry point the UI layers use to change
//! tasks.
//!
//! Validation and id checks happen here, before the store is touched. Store
//! failures come back as [`TodoError`] values; nothing panics or escapes.

use std::sync::Arc;

use crate::error::TodoError;
use crate::models::Task;
use crate::store::{Listener, TaskStore};

#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<dyn TaskStore>,
}

impl TaskRepository {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        TaskRepository { store }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Validates and stores a new task, returning its assigned id.
    pub async fn add(&self, task: Task) -> Result<String, TodoError> {
        task.validate()?;
        tracing::debug!(title = %task.title, "adding todo");
        match self.store.add(task).await {
            Ok(id) => {
                tracing::info!(id = %id, "todo added");
                Ok(id)
            }
            Err(e) => {
                tracing::error!(error = %e, "error adding todo");
                Err(e)
            }
        }
    }

    /// Replaces a saved task. Tasks without an id are refused locally.
    pub async fn update(&self, mut task: Task) -> Result<(), TodoError> {
        let Some(id) = task.saved_id().map(str::to_string) else {
            tracing::error!("cannot update todo without an id");
            return Err(TodoError::MissingId);
        };
        task.validate()?;
        task.id = Some(id.clone());
        tracing::debug!(id = %id, "updating todo");
        self.store.set(task).await.inspect_err(|e| {
            tracing::error!(id = %id, error = %e, "error updating todo");
        })
    }

    pub async fn delete(&self, id: &str) -> Result<(), TodoError> {
        let id = require_id(id)?;
        tracing::debug!(id, "deleting todo");
        self.store.delete(id).await.inspect_err(|e| {
            tracing::error!(id, error = %e, "error deleting todo");
        })
    }

    /// Flips the completion flag without resubmitting the rest of the record.
    pub async fn set_completed(&self, id: &str, completed: bool) -> Result<(), TodoError> {
        let id = require_id(id)?;
        tracing::debug!(id, completed, "toggling todo completion");
        self.store.set_completed(id, completed).await.inspect_err(|e| {
            tracing::error!(id, error = %e, "error updating todo completion");
        })
    }

    pub async fn get(&self, id: &str) -> Result<Task, TodoError> {
        self.store.get(require_id(id)?).await
    }

    /// One-shot fetch of the owner's tasks, newest first.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<Task>, TodoError> {
        if owner_id.trim().is_empty() {
            return Err(TodoError::NotAuthenticated);
        }
        self.store.list_for_owner(owner_id).await
    }

    /// Opens a raw live query. Most callers want [`crate::live::LiveQuery`].
    pub fn listen(&self, owner_id: &str) -> Listener {
        self.store.listen(owner_id)
    }
}

fn require_id(id: &str) -> Result<&str, TodoError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(TodoError::MissingId);
    }
    Ok(id)
}
