//! Screen-facing glue: forwards UI intents to the repository, keeps the
//! live query pointed at the signed-in user and publishes short notices
//! for the screen to show.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::IdentityProvider;
use crate::error::TodoError;
use crate::live::{LiveQuery, PushStatus, TaskSlot};
use crate::models::Task;
use crate::repository::TaskRepository;

/// Message shown to the user after an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Notice {
    #[default]
    None,
    Success(String),
    Error(String),
}

pub struct TodoViewModel {
    repo: TaskRepository,
    identity: Arc<dyn IdentityProvider>,
    live: LiveQuery,
    notice: watch::Sender<Notice>,
}

impl TodoViewModel {
    pub fn new(repo: TaskRepository, identity: Arc<dyn IdentityProvider>) -> Self {
        let live = LiveQuery::new(repo.clone());
        TodoViewModel { repo, identity, live, notice: watch::Sender::new(Notice::None) }
    }

    /// Points the task list at whoever is signed in.
    pub fn attach(&mut self) -> Result<(), TodoError> {
        match self.identity.current_user() {
            Some(user) => self.set_user(&user.uid, false),
            None => {
                tracing::warn!("no signed-in user, task list left empty");
                self.error(TodoError::NotAuthenticated.to_string());
                Err(TodoError::NotAuthenticated)
            }
        }
    }

    /// Subscribes to `user_id`'s tasks. With `force`, an existing
    /// subscription for the same user is reopened.
    pub fn set_user(&mut self, user_id: &str, force: bool) -> Result<(), TodoError> {
        tracing::debug!(user = user_id, force, "setting user");
        if force && self.live.owner_id() == Some(user_id.trim()) {
            self.live.refresh();
            return Ok(());
        }
        self.live.subscribe(user_id).inspect_err(|e| self.error(e.to_string()))
    }

    /// Reopens the live query for the current user.
    pub fn refresh(&mut self) {
        self.live.refresh();
    }

    pub fn user_id(&self) -> Option<&str> {
        self.live.owner_id()
    }

    /// Slot holding the latest delivered task list.
    pub fn tasks(&self) -> TaskSlot {
        self.live.slot()
    }

    pub fn push_status(&self) -> watch::Receiver<PushStatus> {
        self.live.status()
    }

    pub fn notices(&self) -> watch::Receiver<Notice> {
        self.notice.subscribe()
    }

    pub fn clear_notice(&self) {
        self.notice.send_replace(Notice::None);
    }

    /// Adds `task` for the current user. The owner is filled in when blank.
    ///
    /// Validation failures are returned for the form to show next to the
    /// field and are not published as notices.
    pub async fn add(&self, mut task: Task) -> Result<String, TodoError> {
        let owner = self.require_user()?;
        if task.user_id.trim().is_empty() {
            task.user_id = owner;
        }
        let result = self.repo.add(task).await;
        self.report(&result, "add", Some("Todo added successfully"));
        result
    }

    /// Saves an edited task. Only the current user's tasks can be edited,
    /// and a blank owner is filled in.
    pub async fn update(&self, mut task: Task) -> Result<(), TodoError> {
        let owner = self.require_user()?;
        if task.user_id.trim().is_empty() {
            task.user_id = owner.clone();
        }
        let result = match task.saved_id().map(str::to_string) {
            Some(id) if task.user_id != owner => Err(self.foreign(&id, &owner)),
            Some(id) => match self.owned(&id, &owner).await {
                Ok(()) => self.repo.update(task).await,
                Err(e) => Err(e),
            },
            None => self.repo.update(task).await,
        };
        self.report(&result, "update", Some("Todo updated successfully"));
        result
    }

    pub async fn delete(&self, id: &str) -> Result<(), TodoError> {
        let owner = self.require_user()?;
        let result = match self.repo.get(id).await {
            Ok(task) if task.user_id != owner => Err(self.foreign(id, &owner)),
            Ok(_) | Err(TodoError::NotFound(_)) => self.repo.delete(id).await,
            Err(e) => Err(e),
        };
        self.report(&result, "delete", Some("Todo deleted successfully"));
        result
    }

    /// Sets the completion flag. Success is silent.
    pub async fn toggle(&self, id: &str, completed: bool) -> Result<(), TodoError> {
        let owner = self.require_user()?;
        let result = match self.owned(id, &owner).await {
            Ok(()) => self.repo.set_completed(id, completed).await,
            Err(e) => Err(e),
        };
        self.report(&result, "update", None);
        result
    }

    /// Drops the subscription and signs out of the identity platform.
    pub fn sign_out(&mut self) -> Result<(), TodoError> {
        self.live.unsubscribe();
        self.identity.sign_out()
    }

    fn require_user(&self) -> Result<String, TodoError> {
        match self.live.owner_id() {
            Some(owner) => Ok(owner.to_string()),
            None => {
                tracing::error!("operation attempted with no user set");
                self.error(TodoError::NotAuthenticated.to_string());
                Err(TodoError::NotAuthenticated)
            }
        }
    }

    /// Fails unless the stored task `id` belongs to `owner`. Another
    /// user's task is reported as missing.
    async fn owned(&self, id: &str, owner: &str) -> Result<(), TodoError> {
        let task = self.repo.get(id).await?;
        if task.user_id == owner {
            Ok(())
        } else {
            Err(self.foreign(id, owner))
        }
    }

    fn foreign(&self, id: &str, owner: &str) -> TodoError {
        tracing::warn!(id = id.trim(), user = owner, "task belongs to another user");
        TodoError::NotFound(id.trim().to_string())
    }

    fn report<T>(&self, result: &Result<T, TodoError>, op: &str, success: Option<&str>) {
        match result {
            Ok(_) => {
                if let Some(msg) = success {
                    self.notice.send_replace(Notice::Success(msg.to_string()));
                }
            }
            Err(TodoError::Validation { .. }) => {}
            Err(e) => self.error(format!("Failed to {} todo: {}", op, e)),
        }
    }

    fn error(&self, message: String) {
        self.notice.send_replace(Notice::Error(message));
    }
}
