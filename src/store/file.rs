//! On-device task store backed by a single JSON file.
//!
//! The whole collection is read, modified and written back on each change;
//! writes go through a temp file and a rename. Live queries are refreshed
//! after every local write and, when a poll interval is set, whenever the
//! file is changed by another process.
//!
//! File I/O runs on the blocking thread pool, except in [`TaskStore::listen`]
//! and [`JsonFileStore::reset`], which read or remove the file in place.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::TodoError;
use crate::models::Task;
use crate::store::{order_for_delivery, require_owner, Listener, ListenerHub, ServerClock, TaskStore};

struct FileInner {
    path: PathBuf,
    hub: ListenerHub,
    clock: ServerClock,
    /// Serializes read-modify-write cycles; holds the file mtime we last saw.
    seen: Mutex<Option<SystemTime>>,
    poll_interval: Option<Duration>,
    watching: Mutex<bool>,
    /// Held from reading a snapshot until it is handed to the listeners, so
    /// snapshots reach listeners in the order they were read.
    publishing: Mutex<()>,
}

#[derive(Clone)]
pub struct JsonFileStore {
    inner: Arc<FileInner>,
}

impl JsonFileStore {
    /// Opens (without creating) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_poll_interval(path, None)
    }

    /// Like [`open`](Self::open), also watching the file for outside changes.
    pub fn with_poll_interval(path: impl Into<PathBuf>, poll_interval: Option<Duration>) -> Self {
        JsonFileStore {
            inner: Arc::new(FileInner {
                path: path.into(),
                hub: ListenerHub::new(),
                clock: ServerClock::default(),
                seen: Mutex::new(None),
                poll_interval,
                watching: Mutex::new(false),
                publishing: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn listener_count(&self) -> usize {
        self.inner.hub.len()
    }

    /// Deletes the backing file.
    pub fn reset(&self) -> Result<(), TodoError> {
        {
            let mut seen = self.inner.seen.lock();
            if self.inner.path.exists() {
                fs::remove_file(&self.inner.path)?;
            }
            *seen = None;
        }
        self.inner.publish_all();
        Ok(())
    }

    /// Runs `f` against the file on the blocking thread pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, TodoError>
    where
        T: Send + 'static,
        F: FnOnce(&FileInner) -> Result<T, TodoError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| TodoError::remote(format!("task file access failed: {}", e)))?
    }

    fn start_watching(&self) {
        let Some(interval) = self.inner.poll_interval else { return };
        let mut watching = self.inner.watching.lock();
        if *watching {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no runtime, file changes from other processes will not be pushed");
            return;
        };
        *watching = true;
        let weak = Arc::downgrade(&self.inner);
        handle.spawn(watch_file(weak, interval));
    }
}

impl FileInner {
    /// Runs `f` over the whole collection and saves the result.
    fn modify<T>(&self, f: impl FnOnce(&mut Vec<Task>) -> Result<T, TodoError>) -> Result<T, TodoError> {
        let mut seen = self.seen.lock();
        let mut tasks = self.load_all()?;
        let out = f(&mut tasks)?;
        self.save_all(&tasks)?;
        *seen = modified_time(&self.path);
        Ok(out)
    }

    fn load_all(&self) -> Result<Vec<Task>, TodoError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut s = String::new();
        File::open(&self.path)?.read_to_string(&mut s)?;
        if s.trim().is_empty() {
            return Ok(Vec::new());
        }
        let tasks: Vec<Task> = serde_json::from_str(&s)?;
        for stamp in tasks.iter().filter_map(|t| t.created_at.max(t.updated_at)) {
            self.clock.observe(stamp);
        }
        Ok(tasks)
    }

    fn save_all(&self, tasks: &[Task]) -> Result<(), TodoError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(tasks)?;
        let mut f = File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }

    fn query(&self, owner_id: &str) -> Result<Vec<Task>, TodoError> {
        let mut tasks: Vec<Task> = self.load_all()?.into_iter().filter(|t| t.user_id == owner_id).collect();
        order_for_delivery(&mut tasks);
        Ok(tasks)
    }

    fn publish(&self, owner_id: &str) {
        let _order = self.publishing.lock();
        let push = self.query(owner_id);
        if let Err(e) = &push {
            tracing::warn!(owner = owner_id, error = %e, "could not read task file for live query");
        }
        self.hub.notify(owner_id, push);
    }

    fn publish_all(&self) {
        for owner in self.hub.owners() {
            self.publish(&owner);
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Polls the file's modification time and redelivers live queries when it
/// changes. Ends once the store is dropped.
async fn watch_file(inner: Weak<FileInner>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let Some(inner) = inner.upgrade() else { return };
        if inner.hub.is_empty() {
            continue;
        }
        let changed = {
            let mut seen = inner.seen.lock();
            let now = modified_time(&inner.path);
            let changed = now != *seen;
            *seen = now;
            changed
        };
        if changed {
            tracing::debug!(path = %inner.path.display(), "task file changed on disk");
            if let Err(e) = tokio::task::spawn_blocking(move || inner.publish_all()).await {
                tracing::warn!(error = %e, "redelivering task file changes failed");
            }
        }
    }
}

#[async_trait]
impl TaskStore for JsonFileStore {
    async fn add(&self, mut task: Task) -> Result<String, TodoError> {
        require_owner(&task)?;
        let id = Uuid::new_v4().to_string();
        let now = self.inner.clock.now();
        task.id = Some(id.clone());
        task.created_at = Some(now);
        task.updated_at = Some(now);
        self.blocking(move |inner| {
            let owner = task.user_id.clone();
            inner.modify(|tasks| {
                tasks.push(task);
                Ok(())
            })?;
            tracing::debug!(id = %id, owner = %owner, "task written to file");
            inner.publish(&owner);
            Ok(id)
        })
        .await
    }

    async fn set(&self, mut task: Task) -> Result<(), TodoError> {
        require_owner(&task)?;
        let id = task.saved_id().ok_or(TodoError::MissingId)?.to_string();
        task.id = Some(id.clone());
        let now = self.inner.clock.now();
        self.blocking(move |inner| {
            let owner = task.user_id.clone();
            let previous_owner = inner.modify(|tasks| {
                task.updated_at = Some(now);
                match tasks.iter_mut().find(|t| t.id.as_deref() == Some(id.as_str())) {
                    Some(existing) => {
                        task.created_at = existing.created_at.or(Some(now));
                        let previous_owner = existing.user_id.clone();
                        *existing = task;
                        Ok(Some(previous_owner))
                    }
                    None => {
                        task.created_at = Some(now);
                        tasks.push(task);
                        Ok(None)
                    }
                }
            })?;
            if let Some(prev) = previous_owner.filter(|p| *p != owner) {
                inner.publish(&prev);
            }
            inner.publish(&owner);
            Ok(())
        })
        .await
    }

    async fn set_completed(&self, id: &str, completed: bool) -> Result<(), TodoError> {
        let now = self.inner.clock.now();
        let id = id.to_string();
        self.blocking(move |inner| {
            let owner = inner.modify(|tasks| {
                let t = tasks
                    .iter_mut()
                    .find(|t| t.id.as_deref() == Some(id.as_str()))
                    .ok_or_else(|| TodoError::NotFound(id.clone()))?;
                t.completed = completed;
                t.updated_at = Some(now);
                Ok(t.user_id.clone())
            })?;
            inner.publish(&owner);
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<(), TodoError> {
        let id = id.to_string();
        self.blocking(move |inner| {
            let owner = inner.modify(|tasks| {
                let pos = tasks.iter().position(|t| t.id.as_deref() == Some(id.as_str()));
                Ok(pos.map(|i| tasks.remove(i).user_id))
            })?;
            if let Some(owner) = owner {
                inner.publish(&owner);
            }
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Task, TodoError> {
        let id = id.to_string();
        self.blocking(move |inner| {
            inner
                .load_all()?
                .into_iter()
                .find(|t| t.id.as_deref() == Some(id.as_str()))
                .ok_or(TodoError::NotFound(id))
        })
        .await
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Task>, TodoError> {
        let owner_id = owner_id.to_string();
        self.blocking(move |inner| inner.query(&owner_id)).await
    }

    fn listen(&self, owner_id: &str) -> Listener {
        let listener = {
            let _order = self.inner.publishing.lock();
            let initial = self.inner.query(owner_id);
            self.inner.hub.register(owner_id, initial)
        };
        self.start_watching();
        listener
    }
}
