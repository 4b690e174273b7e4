//! Owner-scoped live query feeding an observable slot.
//!
//! A [`LiveQuery`] is either unsubscribed or subscribed to exactly one
//! owner. Switching owners cancels the previous store-side listener before
//! the new one opens, so pushes for an old owner can never reach the slot.
//!
//! Pushes are received on a background task and written into a
//! [`tokio::sync::watch`] slot. Display code reads the slot from its own
//! thread (see [`crate::binder`]), which is where re-marshalling happens.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::TodoError;
use crate::models::Task;
use crate::repository::TaskRepository;
use crate::store::{ListenerRegistration, Push};

/// Latest result set delivered for the subscribed owner. `None` until the
/// first push after subscribing.
pub type TaskSlot = watch::Receiver<Option<Vec<Task>>>;

/// Delivery counters for the current subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushStatus {
    /// Result sets written to the slot.
    pub delivered: u64,
    /// Pushes that carried an error and left the slot untouched.
    pub failed: u64,
    /// Message of the most recent failed push, cleared by the next good one.
    pub last_error: Option<String>,
}

enum State {
    Unsubscribed,
    Subscribed {
        owner_id: String,
        registration: ListenerRegistration,
        pump: JoinHandle<()>,
    },
}

pub struct LiveQuery {
    repo: TaskRepository,
    slot: watch::Sender<Option<Vec<Task>>>,
    status: watch::Sender<PushStatus>,
    /// Generation of the subscription allowed to write into the slot.
    gate: Arc<Mutex<u64>>,
    state: State,
}

impl LiveQuery {
    pub fn new(repo: TaskRepository) -> Self {
        LiveQuery {
            repo,
            slot: watch::Sender::new(None),
            status: watch::Sender::new(PushStatus::default()),
            gate: Arc::new(Mutex::new(0)),
            state: State::Unsubscribed,
        }
    }

    /// Watches the latest delivered result set.
    pub fn slot(&self) -> TaskSlot {
        self.slot.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<PushStatus> {
        self.status.subscribe()
    }

    /// Last result set written to the slot, empty if nothing arrived yet.
    pub fn current(&self) -> Vec<Task> {
        self.slot.borrow().clone().unwrap_or_default()
    }

    pub fn owner_id(&self) -> Option<&str> {
        match &self.state {
            State::Subscribed { owner_id, .. } => Some(owner_id),
            State::Unsubscribed => None,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        matches!(self.state, State::Subscribed { .. })
    }

    /// Subscribes to `owner_id`'s tasks.
    ///
    /// Asking again for the owner already subscribed is a no-op; use
    /// [`refresh`](Self::refresh) to force a new listener. A different
    /// owner replaces the current subscription and resets the slot to `None`.
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(&mut self, owner_id: &str) -> Result<(), TodoError> {
        let owner_id = owner_id.trim();
        if owner_id.is_empty() {
            tracing::error!("refusing to subscribe without a user id");
            return Err(TodoError::Validation { field: "userId", message: "Invalid user ID".to_string() });
        }
        if self.owner_id() == Some(owner_id) {
            tracing::debug!(owner = owner_id, "already subscribed, skipping");
            return Ok(());
        }
        self.cancel();
        self.slot.send_replace(None);
        self.status.send_replace(PushStatus::default());
        self.open(owner_id.to_string());
        Ok(())
    }

    /// Re-opens the listener for the current owner, keeping the slot as is.
    /// Does nothing when unsubscribed.
    pub fn refresh(&mut self) {
        let Some(owner_id) = self.owner_id().map(str::to_string) else {
            tracing::debug!("refresh requested while unsubscribed");
            return;
        };
        tracing::info!(owner = %owner_id, "force refreshing live query");
        self.cancel();
        self.open(owner_id);
    }

    /// Cancels the current subscription. The slot keeps its last value.
    pub fn unsubscribe(&mut self) {
        self.cancel();
    }

    fn open(&mut self, owner_id: String) {
        let generation = *self.gate.lock();
        let (registration, pushes) = self.repo.listen(&owner_id).into_parts();
        tracing::info!(owner = %owner_id, listener = registration.id(), "live query opened");
        let pump = tokio::spawn(pump(
            pushes,
            self.slot.clone(),
            self.status.clone(),
            Arc::clone(&self.gate),
            generation,
        ));
        self.state = State::Subscribed { owner_id, registration, pump };
    }

    fn cancel(&mut self) {
        if let State::Subscribed { owner_id, registration, pump } =
            std::mem::replace(&mut self.state, State::Unsubscribed)
        {
            // No push from this generation may land after the gate moves.
            *self.gate.lock() += 1;
            registration.remove();
            pump.abort();
            tracing::info!(owner = %owner_id, "live query cancelled");
        }
    }
}

impl Drop for LiveQuery {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn pump(
    mut pushes: mpsc::UnboundedReceiver<Push>,
    slot: watch::Sender<Option<Vec<Task>>>,
    status: watch::Sender<PushStatus>,
    gate: Arc<Mutex<u64>>,
    generation: u64,
) {
    while let Some(push) = pushes.recv().await {
        if !deliver(push, &slot, &status, &gate, generation) {
            break;
        }
    }
}

/// Writes one push into the slot. Returns `false` once the subscription is stale.
fn deliver(
    push: Push,
    slot: &watch::Sender<Option<Vec<Task>>>,
    status: &watch::Sender<PushStatus>,
    gate: &Mutex<u64>,
    generation: u64,
) -> bool {
    let current = gate.lock();
    if *current != generation {
        return false;
    }
    match push {
        Ok(tasks) => {
            tracing::debug!(count = tasks.len(), "live query delivered");
            slot.send_replace(Some(tasks));
            status.send_modify(|s| {
                s.delivered += 1;
                s.last_error = None;
            });
        }
        Err(e) => {
            tracing::warn!(error = %e, "live query push failed, keeping previous result");
            status.send_modify(|s| {
                s.failed += 1;
                s.last_error = Some(e.to_string());
            });
        }
    }
    true
}
