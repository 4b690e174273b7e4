//! Live-query plumbing shared by the store backends.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::TodoError;
use crate::models::Task;

/// One delivery of a live query: the full result set, or the reason it
/// could not be produced.
pub type Push = Result<Vec<Task>, TodoError>;

#[derive(Default)]
struct HubInner {
    next_id: u64,
    listeners: HashMap<u64, (String, mpsc::UnboundedSender<Push>)>,
}

/// Registry of open live queries, keyed by registration id.
#[derive(Clone, Default)]
pub struct ListenerHub {
    inner: Arc<Mutex<HubInner>>,
}

impl ListenerHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for `owner_id` and sends it `initial` straight away.
    pub fn register(&self, owner_id: &str, initial: Push) -> Listener {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(initial);
        let id = {
            let mut inner = self.inner.lock();
            inner.next_id += 1;
            let id = inner.next_id;
            inner.listeners.insert(id, (owner_id.to_string(), tx));
            id
        };
        tracing::debug!(listener = id, owner = owner_id, "live query registered");
        Listener {
            registration: ListenerRegistration { id, owner_id: owner_id.to_string(), hub: Some(self.clone()) },
            pushes: rx,
        }
    }

    /// Drops a registration. Returns `false` if it was already gone.
    pub fn remove(&self, id: u64) -> bool {
        let removed = self.inner.lock().listeners.remove(&id).is_some();
        if removed {
            tracing::debug!(listener = id, "live query removed");
        }
        removed
    }

    /// Number of open live queries.
    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct owners that currently have at least one listener.
    pub fn owners(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut owners: Vec<String> = inner.listeners.values().map(|(o, _)| o.clone()).collect();
        owners.sort();
        owners.dedup();
        owners
    }

    /// Delivers `push` to every listener of `owner_id`.
    pub fn notify(&self, owner_id: &str, push: Push) {
        let mut inner = self.inner.lock();
        inner.listeners.retain(|_, (owner, tx)| {
            if owner != owner_id {
                return true;
            }
            tx.send(push.clone()).is_ok()
        });
    }

    /// Delivers an error to every listener regardless of owner.
    pub fn notify_error(&self, error: &TodoError) {
        let mut inner = self.inner.lock();
        inner.listeners.retain(|_, (_, tx)| tx.send(Err(error.clone())).is_ok());
    }
}

/// Handle that keeps a live query open. Removing it (or dropping it)
/// stops further deliveries.
pub struct ListenerRegistration {
    id: u64,
    owner_id: String,
    hub: Option<ListenerHub>,
}

impl ListenerRegistration {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Cancels the live query on the store side.
    pub fn remove(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(hub) = self.hub.take() {
            hub.remove(self.id);
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("active", &self.hub.is_some())
            .finish()
    }
}

/// An open live query: its registration plus the stream of pushes.
pub struct Listener {
    pub registration: ListenerRegistration,
    pub pushes: mpsc::UnboundedReceiver<Push>,
}

impl Listener {
    /// Waits for the next push. `None` once the registration is removed.
    pub async fn next(&mut self) -> Option<Push> {
        self.pushes.recv().await
    }

    pub fn into_parts(self) -> (ListenerRegistration, mpsc::UnboundedReceiver<Push>) {
        (self.registration, self.pushes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initial_push_arrives_first() {
        let hub = ListenerHub::new();
        let mut l = hub.register("u1", Ok(vec![]));
        assert_eq!(l.next().await, Some(Ok(vec![])));
    }

    #[tokio::test]
    async fn notify_only_reaches_matching_owner() {
        let hub = ListenerHub::new();
        let mut a = hub.register("a", Ok(vec![]));
        let mut b = hub.register("b", Ok(vec![]));
        a.next().await;
        b.next().await;

        hub.notify("a", Err(TodoError::remote("x")));
        assert!(a.pushes.try_recv().is_ok());
        assert!(b.pushes.try_recv().is_err());
    }

    #[test]
    fn dropping_registration_unregisters() {
        let hub = ListenerHub::new();
        let l = hub.register("a", Ok(vec![]));
        assert_eq!(hub.len(), 1);
        drop(l);
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn removed_registration_closes_stream() {
        let hub = ListenerHub::new();
        let (reg, mut rx) = hub.register("a", Ok(vec![])).into_parts();
        reg.remove();
        hub.notify("a", Ok(vec![]));
        assert_eq!(rx.recv().await, Some(Ok(vec![])));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn owners_are_distinct() {
        let hub = ListenerHub::new();
        let _a1 = hub.register("a", Ok(vec![]));
        let _a2 = hub.register("a", Ok(vec![]));
        let _b = hub.register("b", Ok(vec![]));
        assert_eq!(hub.owners(), vec!["a".to_string(), "b".to_string()]);
    }
}
