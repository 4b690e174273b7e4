use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use todosync::live::{LiveQuery, TaskSlot};
use todosync::models::{Priority, Task};
use todosync::repository::TaskRepository;
use todosync::store::file::JsonFileStore;
use todosync::store::memory::MemoryStore;
use todosync::store::TaskStore;

fn setup() -> (Arc<MemoryStore>, TaskRepository) {
    let store = Arc::new(MemoryStore::new());
    let repo = TaskRepository::new(store.clone());
    (store, repo)
}

fn task(title: &str, owner: &str) -> Task {
    Task::new(title, "desc", "01/05/2025", owner)
}

/// Waits until the slot holds a delivered list matching `pred`.
async fn wait_for(slot: &mut TaskSlot, pred: impl Fn(&[Task]) -> bool) -> Vec<Task> {
    let value = tokio::time::timeout(
        Duration::from_secs(5),
        slot.wait_for(|v| v.as_deref().is_some_and(|t| pred(t))),
    )
    .await
    .expect("timed out waiting for a push")
    .expect("slot closed");
    value.clone().unwrap_or_default()
}

#[tokio::test]
async fn test_added_task_arrives_with_defaults() {
    let (_store, repo) = setup();
    let mut live = LiveQuery::new(repo.clone());
    live.subscribe("u1").unwrap();
    let mut slot = live.slot();
    assert!(wait_for(&mut slot, |t| t.is_empty()).await.is_empty());

    let id = repo.add(Task::new("Buy milk", "2% milk", "01/05/2025", "u1")).await.unwrap();
    let tasks = wait_for(&mut slot, |t| t.len() == 1).await;
    let t = &tasks[0];
    assert_eq!(t.id.as_deref(), Some(id.as_str()));
    assert_eq!(t.title, "Buy milk");
    assert_eq!(t.priority, Priority::Medium);
    assert_eq!(t.category, "General");
    assert!(!t.completed);
}

#[tokio::test]
async fn test_switching_owner_keeps_a_single_listener() {
    let (store, repo) = setup();
    repo.add(task("a1", "userA")).await.unwrap();
    repo.add(task("b1", "userB")).await.unwrap();

    let mut live = LiveQuery::new(repo.clone());
    live.subscribe("userA").unwrap();
    let mut slot = live.slot();
    wait_for(&mut slot, |t| t.len() == 1).await;

    live.subscribe("userB").unwrap();
    assert_eq!(store.listener_count(), 1);
    assert_eq!(live.owner_id(), Some("userB"));
    // userA's list must not linger while userB's first push is pending
    assert!(slot.borrow().is_none());

    repo.add(task("a2", "userA")).await.unwrap();
    repo.add(task("b2", "userB")).await.unwrap();
    let tasks = wait_for(&mut slot, |t| t.len() == 2).await;
    assert!(tasks.iter().all(|t| t.user_id == "userB"));

    // give any straggling userA push a chance to show up
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(live.current().iter().all(|t| t.user_id == "userB"));
}

#[tokio::test]
async fn test_same_owner_subscribe_is_a_no_op() {
    let (store, repo) = setup();
    repo.add(task("a", "u1")).await.unwrap();
    let mut live = LiveQuery::new(repo);
    live.subscribe("u1").unwrap();
    let mut slot = live.slot();
    wait_for(&mut slot, |t| t.len() == 1).await;

    live.subscribe(" u1 ").unwrap();
    assert_eq!(store.listener_count(), 1);
    assert_eq!(slot.borrow().as_ref().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_blank_owner_is_rejected() {
    let (store, repo) = setup();
    let mut live = LiveQuery::new(repo);
    let err = live.subscribe("  ").unwrap_err();
    assert_eq!(err.to_string(), "Invalid user ID");
    assert!(!live.is_subscribed());
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn test_completion_change_is_pushed() {
    let (_store, repo) = setup();
    let id = repo.add(task("a", "u1")).await.unwrap();
    let mut live = LiveQuery::new(repo.clone());
    live.subscribe("u1").unwrap();
    let mut slot = live.slot();
    wait_for(&mut slot, |t| t.len() == 1).await;

    repo.set_completed(&id, true).await.unwrap();
    let tasks = wait_for(&mut slot, |t| t.first().is_some_and(|t| t.completed)).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "a");
}

#[tokio::test]
async fn test_failed_push_leaves_previous_list() {
    let (store, repo) = setup();
    repo.add(task("a", "u1")).await.unwrap();
    let mut live = LiveQuery::new(repo.clone());
    live.subscribe("u1").unwrap();
    let mut slot = live.slot();
    let mut status = live.status();
    wait_for(&mut slot, |t| t.len() == 1).await;

    store.set_offline(true);
    let s = tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| s.failed == 1))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert_eq!(s.last_error.as_deref(), Some("Network unavailable"));
    assert_eq!(live.current().len(), 1);

    store.set_offline(false);
    tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| s.last_error.is_none()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.current().len(), 1);
}

#[tokio::test]
async fn test_refresh_keeps_the_slot() {
    let (store, repo) = setup();
    repo.add(task("a", "u1")).await.unwrap();
    let mut live = LiveQuery::new(repo.clone());
    live.subscribe("u1").unwrap();
    let mut slot = live.slot();
    wait_for(&mut slot, |t| t.len() == 1).await;

    live.refresh();
    assert_eq!(store.listener_count(), 1);
    assert_eq!(live.current().len(), 1);

    repo.add(task("b", "u1")).await.unwrap();
    wait_for(&mut slot, |t| t.len() == 2).await;
}

#[tokio::test]
async fn test_unsubscribe_stops_deliveries() {
    let (store, repo) = setup();
    let mut live = LiveQuery::new(repo.clone());
    live.subscribe("u1").unwrap();
    let mut slot = live.slot();
    wait_for(&mut slot, |t| t.is_empty()).await;

    live.unsubscribe();
    assert_eq!(store.listener_count(), 0);
    repo.add(task("a", "u1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(live.current().is_empty());
}

#[tokio::test]
async fn test_dropping_query_cancels_listener() {
    let (store, repo) = setup();
    let mut live = LiveQuery::new(repo);
    live.subscribe("u1").unwrap();
    assert_eq!(store.listener_count(), 1);
    drop(live);
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn test_newest_task_first() {
    let (_store, repo) = setup();
    let mut live = LiveQuery::new(repo.clone());
    live.subscribe("u1").unwrap();
    repo.add(task("first", "u1")).await.unwrap();
    repo.add(task("second", "u1")).await.unwrap();
    let mut slot = live.slot();
    let tasks = wait_for(&mut slot, |t| t.len() == 2).await;
    let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["second", "first"]);
}

#[tokio::test]
async fn test_file_store_pushes_writes_from_another_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.json");
    let watched = JsonFileStore::with_poll_interval(&path, Some(Duration::from_millis(20)));
    let mut live = LiveQuery::new(TaskRepository::new(Arc::new(watched)));
    live.subscribe("u1").unwrap();
    let mut slot = live.slot();
    wait_for(&mut slot, |t| t.is_empty()).await;

    // a second process writing the same file
    let other = JsonFileStore::open(&path);
    other.add(task("from elsewhere", "u1")).await.unwrap();

    let tasks = wait_for(&mut slot, |t| t.len() == 1).await;
    assert_eq!(tasks[0].title, "from elsewhere");
}

async fn add_concurrently(repo: &TaskRepository, owner: &str, n: usize) {
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let repo = repo.clone();
            let owner = owner.to_string();
            tokio::spawn(async move { repo.add(task(&format!("t{}", i), &owner)).await })
        })
        .collect();
    for h in handles {
        h.await.unwrap().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_writes_end_with_the_full_list() {
    for _ in 0..10 {
        let (_store, repo) = setup();
        let mut live = LiveQuery::new(repo.clone());
        live.subscribe("u1").unwrap();
        let mut slot = live.slot();
        wait_for(&mut slot, |t| t.is_empty()).await;

        add_concurrently(&repo, "u1", 64).await;
        wait_for(&mut slot, |t| t.len() == 64).await;

        // nothing older may arrive after the complete list
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(live.current().len(), 64);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_file_writes_end_with_the_full_list() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.json");
    let repo = TaskRepository::new(Arc::new(JsonFileStore::with_poll_interval(&path, Some(Duration::from_millis(5)))));
    let mut live = LiveQuery::new(repo.clone());
    live.subscribe("u1").unwrap();
    let mut slot = live.slot();
    wait_for(&mut slot, |t| t.is_empty()).await;

    add_concurrently(&repo, "u1", 24).await;
    wait_for(&mut slot, |t| t.len() == 24).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(live.current().len(), 24);
}
