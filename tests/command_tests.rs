use std::sync::Arc;

use tempfile::TempDir;
use todosync::auth::{IdentityProvider, SessionIdentity};
use todosync::commands::*;
use todosync::models::{Priority, Task};
use todosync::repository::TaskRepository;
use todosync::store::file::JsonFileStore;

struct TestDb {
    _dir: TempDir,
    store: JsonFileStore,
    repo: TaskRepository,
    identity: SessionIdentity,
}

/// Fresh task file and session in a temporary directory, signed in as `alice`.
fn test_db() -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("todos.json"));
    let repo = TaskRepository::new(Arc::new(store.clone()));
    let identity = SessionIdentity::load(dir.path().join("session.json"));
    assert!(cmd_login(&identity, "alice".into(), Some("alice@example.com".into()), None, true));
    TestDb { _dir: dir, store, repo, identity }
}

async fn load_tasks(db: &TestDb) -> Vec<Task> {
    db.repo.list("alice").await.unwrap()
}

#[tokio::test]
async fn test_add_and_list() {
    let db = test_db();
    let id = cmd_add(&db.repo, &db.identity, "Test Task".into(), "Details".into(), Some("01/12/2025".into()), Some("high".into()), Some("Work".into()), true).await;
    assert!(id.is_some());

    let tasks = load_tasks(&db).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Test Task");
    assert_eq!(tasks[0].priority, Priority::High);
    assert_eq!(tasks[0].category, "Work");
    assert_eq!(tasks[0].user_id, "alice");
    cmd_list(&db.repo, &db.identity, true, None).await;
}

#[tokio::test]
async fn test_add_defaults() {
    let db = test_db();
    cmd_add(&db.repo, &db.identity, "Buy milk".into(), "2% milk".into(), None, None, None, true).await;
    let tasks = load_tasks(&db).await;
    assert_eq!(tasks[0].date, today());
    assert_eq!(tasks[0].priority, Priority::Medium);
    assert_eq!(tasks[0].category, "General");
    assert!(!tasks[0].completed);
}

#[tokio::test]
async fn test_add_rejects_blank_fields() {
    let db = test_db();
    assert!(cmd_add(&db.repo, &db.identity, "".into(), "desc".into(), None, None, None, true).await.is_none());
    assert!(cmd_add(&db.repo, &db.identity, "title".into(), " ".into(), None, None, None, true).await.is_none());
    assert!(cmd_add(&db.repo, &db.identity, "title".into(), "desc".into(), None, Some("urgent".into()), None, true).await.is_none());
    assert!(load_tasks(&db).await.is_empty());
}

#[tokio::test]
async fn test_toggle_task() {
    let db = test_db();
    let id = cmd_add(&db.repo, &db.identity, "Task to complete".into(), "d".into(), None, None, None, true).await.unwrap();

    assert!(cmd_toggle(&db.repo, &db.identity, short_id(&id).to_string(), None, true).await);
    assert!(load_tasks(&db).await[0].completed);

    assert!(cmd_toggle(&db.repo, &db.identity, id.clone(), None, true).await);
    assert!(!load_tasks(&db).await[0].completed);

    assert!(cmd_toggle(&db.repo, &db.identity, id, Some(true), true).await);
    assert!(load_tasks(&db).await[0].completed);
}

#[tokio::test]
async fn test_edit_task() {
    let db = test_db();
    let id = cmd_add(&db.repo, &db.identity, "Old".into(), "d".into(), None, None, None, true).await.unwrap();
    let before = load_tasks(&db).await.remove(0);

    assert!(cmd_edit(&db.repo, &db.identity, id.clone(), Some("New".into()), None, None, Some("low".into()), Some("".into()), true).await);
    let after = load_tasks(&db).await.remove(0);
    assert_eq!(after.title, "New");
    assert_eq!(after.description, "d");
    assert_eq!(after.priority, Priority::Low);
    assert_eq!(after.category, "General");
    assert_eq!(after.created_at, before.created_at);

    // blank title is refused and nothing changes
    assert!(!cmd_edit(&db.repo, &db.identity, id, Some(" ".into()), None, None, None, None, true).await);
    assert_eq!(load_tasks(&db).await[0].title, "New");
}

#[tokio::test]
async fn test_remove_task() {
    let db = test_db();
    let id = cmd_add(&db.repo, &db.identity, "Temp".into(), "d".into(), None, None, None, true).await.unwrap();
    assert!(cmd_remove(&db.repo, &db.identity, id.clone(), true).await);
    assert!(load_tasks(&db).await.is_empty());
    assert!(!cmd_remove(&db.repo, &db.identity, id, true).await);
}

#[tokio::test]
async fn test_blank_id_is_refused() {
    let db = test_db();
    cmd_add(&db.repo, &db.identity, "Keep".into(), "d".into(), None, None, None, true).await;
    assert!(!cmd_remove(&db.repo, &db.identity, "".into(), true).await);
    assert_eq!(load_tasks(&db).await.len(), 1);
}

#[tokio::test]
async fn test_other_users_tasks_are_invisible() {
    let db = test_db();
    let id = cmd_add(&db.repo, &db.identity, "Alice's".into(), "d".into(), None, None, None, true).await.unwrap();

    cmd_login(&db.identity, "bob".into(), None, None, true);
    assert!(!cmd_toggle(&db.repo, &db.identity, id.clone(), Some(true), true).await);
    assert!(!cmd_remove(&db.repo, &db.identity, id, true).await);
    assert!(db.repo.list("bob").await.unwrap().is_empty());
    assert!(!load_tasks(&db).await[0].completed);
}

#[tokio::test]
async fn test_commands_need_a_user() {
    let db = test_db();
    cmd_logout(&db.identity, true);
    assert!(!db.identity.is_signed_in());
    assert!(cmd_add(&db.repo, &db.identity, "x".into(), "y".into(), None, None, None, true).await.is_none());
    assert!(load_tasks(&db).await.is_empty());
}

#[test]
fn test_login_rejects_bad_email() {
    let identity = SessionIdentity::in_memory();
    assert!(!cmd_login(&identity, "carol".into(), Some("not-an-email".into()), None, true));
    assert!(identity.current_user().is_none());
}

#[test]
fn test_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let identity = SessionIdentity::load(&path);
    assert!(cmd_login(&identity, "dave".into(), None, Some("Dave".into()), true));

    let reloaded = SessionIdentity::load(&path);
    let user = reloaded.current_user().unwrap();
    assert_eq!(user.uid, "dave");
    assert_eq!(user.label(), "Dave");
}

#[tokio::test]
async fn test_reset() {
    let db = test_db();
    cmd_add(&db.repo, &db.identity, "Gone".into(), "d".into(), None, None, None, true).await;
    cmd_reset(&db.store, true);
    assert!(load_tasks(&db).await.is_empty());
    assert!(!db.store.path().exists());
}

#[tokio::test]
async fn test_watch_stops_after_limit() {
    let db = test_db();
    cmd_add(&db.repo, &db.identity, "Watched".into(), "d".into(), None, None, None, true).await;
    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        cmd_watch(&db.repo, &db.identity, Some(1)),
    )
    .await
    .unwrap();
}
