//! Drives a task list display from the live query slot.

use crate::live::TaskSlot;
use crate::models::Task;

/// Counts shown above the task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

impl TaskStats {
    /// Single pass over `tasks`; `pending` is always `total - completed`.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|t| t.completed).count();
        TaskStats { total: tasks.len(), completed, pending: tasks.len() - completed }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Something that can show a task list, e.g. a table widget or stdout.
pub trait TaskListView {
    /// Replaces what is shown. `tasks` may be empty (show the empty state).
    fn show(&mut self, tasks: &[Task], stats: TaskStats);

    /// Nothing has been delivered for the current owner yet.
    fn loading(&mut self) {}
}

/// Keeps a [`TaskListView`] in step with a slot of tasks.
///
/// The binder never merges writes into its own copy; everything it shows
/// comes from the slot, apart from [`mark_completed`](Self::mark_completed),
/// which re-renders a toggled row until the store confirms it.
pub struct TaskListBinder<V> {
    slot: TaskSlot,
    view: V,
    shown: Vec<Task>,
    loaded: bool,
    stats: TaskStats,
}

impl<V: TaskListView> TaskListBinder<V> {
    /// Binds `view` and renders the slot's current value straight away.
    pub fn new(slot: TaskSlot, view: V) -> Self {
        let mut binder =
            TaskListBinder { slot, view, shown: Vec::new(), loaded: false, stats: TaskStats::default() };
        binder.take_latest();
        binder
    }

    /// Renders the latest value if the slot changed since the last render.
    /// Meant to be called from the display loop.
    pub fn sync(&mut self) -> bool {
        if !self.slot.has_changed().unwrap_or(false) {
            return false;
        }
        self.take_latest();
        true
    }

    /// Waits for the slot to change and renders it. Returns `false` once
    /// the slot's owner is gone.
    pub async fn changed(&mut self) -> bool {
        if self.slot.changed().await.is_err() {
            return false;
        }
        self.take_latest();
        true
    }

    /// Whether a result set has been delivered for the current owner.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn take_latest(&mut self) {
        let latest = self.slot.borrow_and_update().clone();
        match latest {
            Some(tasks) => {
                self.shown = tasks;
                self.loaded = true;
                self.render();
            }
            None => {
                self.shown.clear();
                self.loaded = false;
                self.stats = TaskStats::default();
                self.view.loading();
            }
        }
    }

    /// Renders every change until the slot closes, then hands the view back.
    pub async fn run(mut self) -> V {
        while self.changed().await {}
        self.view
    }

    /// Shows `id` as (not) completed before the authoritative push arrives.
    pub fn mark_completed(&mut self, id: &str, completed: bool) -> bool {
        if !self.loaded {
            return false;
        }
        let Some(task) = self.shown.iter_mut().find(|t| t.id.as_deref() == Some(id)) else {
            return false;
        };
        task.completed = completed;
        self.render();
        true
    }

    pub fn tasks(&self) -> &[Task] {
        &self.shown
    }

    pub fn stats(&self) -> TaskStats {
        self.stats
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    fn render(&mut self) {
        self.stats = TaskStats::from_tasks(&self.shown);
        tracing::debug!(
            total = self.stats.total,
            pending = self.stats.pending,
            completed = self.stats.completed,
            "task list rendered"
        );
        self.view.show(&self.shown, self.stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::watch;

    #[derive(Default)]
    struct Frames(Vec<(usize, TaskStats)>, usize);

    impl TaskListView for Frames {
        fn show(&mut self, tasks: &[Task], stats: TaskStats) {
            self.0.push((tasks.len(), stats));
        }

        fn loading(&mut self) {
            self.1 += 1;
        }
    }

    fn task(id: &str, completed: bool) -> Task {
        let mut t = Task::new("t", "d", "01/01/2025", "u1");
        t.id = Some(id.to_string());
        t.completed = completed;
        t
    }

    #[test]
    fn empty_list_has_zero_counts() {
        assert_eq!(TaskStats::from_tasks(&[]), TaskStats::default());
        assert!(TaskStats::default().is_empty());
    }

    #[test]
    fn renders_initial_value_and_only_real_changes() {
        let (tx, rx) = watch::channel(Some(vec![task("a", false)]));
        let mut binder = TaskListBinder::new(rx, Frames::default());
        assert_eq!(binder.view().0.len(), 1);
        assert!(!binder.sync());

        tx.send_replace(Some(vec![task("a", true), task("b", false)]));
        assert!(binder.sync());
        assert_eq!(binder.stats(), TaskStats { total: 2, completed: 1, pending: 1 });
        assert_eq!(binder.view().0.len(), 2);
    }

    #[test]
    fn optimistic_toggle_is_replaced_by_next_push() {
        let (tx, rx) = watch::channel(Some(vec![task("a", false)]));
        let mut binder = TaskListBinder::new(rx, Frames::default());
        assert!(binder.mark_completed("a", true));
        assert_eq!(binder.stats().completed, 1);
        assert!(!binder.mark_completed("zzz", true));

        // the next push carries the stored state, whatever was shown
        tx.send_replace(Some(vec![task("a", false)]));
        binder.sync();
        assert_eq!(binder.stats().completed, 0);
    }

    #[test]
    fn unset_slot_shows_loading_not_an_empty_list() {
        let (tx, rx) = watch::channel(None);
        let mut binder = TaskListBinder::new(rx, Frames::default());
        assert!(!binder.is_loaded());
        assert_eq!(binder.view().1, 1);
        assert!(binder.view().0.is_empty());

        tx.send_replace(Some(Vec::new()));
        binder.sync();
        assert!(binder.is_loaded());
        assert_eq!(binder.view().0, vec![(0, TaskStats::default())]);
    }

    #[tokio::test]
    async fn run_ends_when_slot_closes() {
        let (tx, rx) = watch::channel(None);
        let binder = TaskListBinder::new(rx, Frames::default());
        let handle = tokio::spawn(binder.run());
        tx.send_replace(Some(vec![task("a", false)]));
        drop(tx);
        let frames = handle.await.unwrap();
        assert!(!frames.0.is_empty());
    }
}
