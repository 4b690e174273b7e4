//! Task collection backends.
//!
//! [`TaskStore`] is the contract every backend satisfies: document-style
//! add/set/delete keyed by task id, plus an owner-filtered live query that
//! pushes the full result set after every change. Two backends ship:
//!
//! - [`memory::MemoryStore`]: the shared cloud collection, with
//!   store-assigned ids and timestamps and a switch to simulate losing the
//!   network.
//! - [`file::JsonFileStore`]: an on-device JSON file, also observed for
//!   changes made by other processes.
//!
//! Stores never validate form content; they only refuse records without an
//! owner. Form validation lives in [`crate::repository`].

pub mod file;
pub mod listener;
pub mod memory;

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::TodoError;
use crate::models::Task;

pub use listener::{Listener, ListenerHub, ListenerRegistration, Push};

/// A collection of tasks keyed by id.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Stores a new task and returns the id the store assigned to it.
    ///
    /// Any id already on `task` is ignored. `created_at` and `updated_at`
    /// are set by the store.
    async fn add(&self, task: Task) -> Result<String, TodoError>;

    /// Writes the whole record under its id, creating it if needed.
    ///
    /// `created_at` is preserved from the stored copy; `updated_at` is
    /// refreshed.
    async fn set(&self, task: Task) -> Result<(), TodoError>;

    /// Changes only the completion flag (and `updated_at`) of a stored task.
    async fn set_completed(&self, id: &str, completed: bool) -> Result<(), TodoError>;

    /// Removes a task. Removing an id that does not exist is not an error.
    async fn delete(&self, id: &str) -> Result<(), TodoError>;

    /// Fetches one task by id.
    async fn get(&self, id: &str) -> Result<Task, TodoError>;

    /// One-shot query: every task owned by `owner_id`, newest first.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Task>, TodoError>;

    /// Opens a live query for `owner_id`.
    ///
    /// The current result set is pushed immediately, then again after every
    /// change to the collection, until the returned listener's registration
    /// is removed or dropped.
    fn listen(&self, owner_id: &str) -> Listener;
}

/// Refuses records that would be stored without an owner.
pub(crate) fn require_owner(task: &Task) -> Result<(), TodoError> {
    if task.user_id.trim().is_empty() {
        return Err(TodoError::Validation {
            field: "userId",
            message: "Todo has no owner".to_string(),
        });
    }
    Ok(())
}

/// Orders a result set the way live queries deliver it: newest `created_at`
/// first, ties broken by id. Records still waiting for a timestamp go first.
pub(crate) fn order_for_delivery(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| match (&a.created_at, &b.created_at) {
        (Some(x), Some(y)) => y.cmp(x).then_with(|| a.id.cmp(&b.id)),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
}

/// Hands out strictly increasing timestamps so that creation order is
/// preserved even when several writes land within the same clock tick.
#[derive(Debug, Default)]
pub(crate) struct ServerClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl ServerClock {
    pub(crate) fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock();
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }

    /// Makes sure future stamps come after `seen`.
    pub(crate) fn observe(&self, seen: DateTime<Utc>) {
        let mut last = self.last.lock();
        if last.map_or(true, |prev| seen > prev) {
            *last = Some(seen);
        }
    }
}
