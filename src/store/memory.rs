//! Shared in-process task collection.
//!
//! [`MemoryStore`] plays the part of the cloud document collection: it
//! assigns document ids and server timestamps, fans changes out to live
//! queries, and can be switched offline to exercise failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::TodoError;
use crate::models::Task;
use crate::store::{order_for_delivery, require_owner, Listener, ListenerHub, ServerClock, TaskStore};

/// Message reported while the store is offline.
pub const OFFLINE_MESSAGE: &str = "Network unavailable";

#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, Task>>,
    hub: ListenerHub,
    clock: ServerClock,
    offline: AtomicBool,
    /// Held from reading a snapshot until it is handed to the listeners, so
    /// a listener never receives an older snapshot after a newer one.
    publishing: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents across all owners.
    pub fn len(&self) -> usize {
        self.docs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live queries currently open against this store.
    pub fn listener_count(&self) -> usize {
        self.hub.len()
    }

    /// Simulates losing (or regaining) the network.
    ///
    /// While offline every call fails and open live queries receive an
    /// error push. Coming back online redelivers every open query.
    pub fn set_offline(&self, offline: bool) {
        let was = self.offline.swap(offline, Ordering::SeqCst);
        if was == offline {
            return;
        }
        if offline {
            tracing::warn!("memory store going offline");
            let _order = self.publishing.lock();
            self.hub.notify_error(&TodoError::remote(OFFLINE_MESSAGE));
        } else {
            tracing::info!("memory store back online");
            for owner in self.hub.owners() {
                self.publish(&owner);
            }
        }
    }

    fn ensure_online(&self) -> Result<(), TodoError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TodoError::remote(OFFLINE_MESSAGE));
        }
        Ok(())
    }

    fn query(&self, owner_id: &str) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .docs
            .lock()
            .values()
            .filter(|t| t.user_id == owner_id)
            .cloned()
            .collect();
        order_for_delivery(&mut tasks);
        tasks
    }

    fn publish(&self, owner_id: &str) {
        let _order = self.publishing.lock();
        let tasks = self.query(owner_id);
        tracing::debug!(owner = owner_id, count = tasks.len(), "pushing snapshot");
        self.hub.notify(owner_id, Ok(tasks));
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn add(&self, mut task: Task) -> Result<String, TodoError> {
        self.ensure_online()?;
        require_owner(&task)?;
        let id = Uuid::new_v4().to_string();
        let now = self.clock.now();
        task.id = Some(id.clone());
        task.created_at = Some(now);
        task.updated_at = Some(now);
        let owner = task.user_id.clone();
        self.docs.lock().insert(id.clone(), task);
        tracing::debug!(id = %id, owner = %owner, "document added");
        self.publish(&owner);
        Ok(id)
    }

    async fn set(&self, mut task: Task) -> Result<(), TodoError> {
        self.ensure_online()?;
        require_owner(&task)?;
        let id = task.saved_id().ok_or(TodoError::MissingId)?.to_string();
        task.id = Some(id.clone());
        let now = self.clock.now();
        let previous_owner = {
            let mut docs = self.docs.lock();
            let previous = docs.get(&id);
            task.created_at = previous.and_then(|p| p.created_at).or(Some(now));
            task.updated_at = Some(now);
            let previous_owner = previous.map(|p| p.user_id.clone());
            docs.insert(id.clone(), task.clone());
            previous_owner
        };
        tracing::debug!(id = %id, "document set");
        if let Some(prev) = previous_owner.filter(|p| *p != task.user_id) {
            self.publish(&prev);
        }
        self.publish(&task.user_id);
        Ok(())
    }

    async fn set_completed(&self, id: &str, completed: bool) -> Result<(), TodoError> {
        self.ensure_online()?;
        let now = self.clock.now();
        let owner = {
            let mut docs = self.docs.lock();
            let task = docs.get_mut(id).ok_or_else(|| TodoError::NotFound(id.to_string()))?;
            task.completed = completed;
            task.updated_at = Some(now);
            task.user_id.clone()
        };
        tracing::debug!(id, completed, "completion updated");
        self.publish(&owner);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), TodoError> {
        self.ensure_online()?;
        let removed = self.docs.lock().remove(id);
        match removed {
            Some(task) => {
                tracing::debug!(id, "document deleted");
                self.publish(&task.user_id);
            }
            None => tracing::debug!(id, "delete of unknown document ignored"),
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Task, TodoError> {
        self.ensure_online()?;
        self.docs
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| TodoError::NotFound(id.to_string()))
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Task>, TodoError> {
        self.ensure_online()?;
        Ok(self.query(owner_id))
    }

    fn listen(&self, owner_id: &str) -> Listener {
        let _order = self.publishing.lock();
        let initial = self.ensure_online().map(|_| self.query(owner_id));
        self.hub.register(owner_id, initial)
    }
}
