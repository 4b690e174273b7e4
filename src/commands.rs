use std::io::{self, Write};

use chrono::Local;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::auth::{friendly_auth_message, IdentityProvider, SessionIdentity};
use crate::binder::{TaskListBinder, TaskListView, TaskStats};
use crate::error::TodoError;
use crate::live::LiveQuery;
use crate::models::{Priority, Task, UserProfile, DATE_FORMAT};
use crate::repository::TaskRepository;
use crate::store::file::JsonFileStore;

/// Today's date in the form due dates are stored in.
pub fn today() -> String {
    Local::now().date_naive().format(DATE_FORMAT).to_string()
}

/// Returns the signed-in user's id, or reports that nobody is signed in.
fn current_owner(identity: &dyn IdentityProvider, silent: bool) -> Option<String> {
    match identity.current_user() {
        Some(user) => Some(user.uid),
        None => {
            if !silent { eprintln!("{}. Run `todosync login <uid>` first.", TodoError::NotAuthenticated); }
            None
        }
    }
}

fn report_error(action: &str, e: &TodoError, silent: bool) {
    if silent { return; }
    match e {
        TodoError::Validation { field, message } => eprintln!("{} ({})", message, field),
        _ => eprintln!("Failed to {} todo: {}", action, e),
    }
}

/// Fetches a task and checks it belongs to `owner`. Other users' tasks are
/// reported as not found.
async fn load_owned(repo: &TaskRepository, owner: &str, id: &str) -> Result<Task, TodoError> {
    let task = repo.get(id).await?;
    if task.user_id != owner {
        return Err(TodoError::NotFound(id.to_string()));
    }
    Ok(task)
}

/// Records a signed-in identity.
pub fn cmd_login(identity: &SessionIdentity, uid: String, email: Option<String>, name: Option<String>, silent: bool) -> bool {
    if let Some(e) = &email {
        if !e.contains('@') {
            if !silent { eprintln!("{}", friendly_auth_message(Some("ERROR_INVALID_EMAIL"))); }
            return false;
        }
    }
    let user = UserProfile { uid, display_name: name, email, photo_url: None };
    let label = user.label().to_string();
    match identity.sign_in(user) {
        Ok(()) => {
            if !silent { println!("Signed in as {}", label); }
            true
        }
        Err(e) => {
            if !silent { eprintln!("{}", e); }
            false
        }
    }
}

pub fn cmd_logout(identity: &dyn IdentityProvider, silent: bool) {
    match identity.sign_out() {
        Ok(()) => if !silent { println!("Signed out."); },
        Err(e) => if !silent { eprintln!("Failed to sign out: {}", e); },
    }
}

pub fn cmd_whoami(identity: &dyn IdentityProvider) {
    match identity.current_user() {
        Some(user) => {
            println!("{}", user.label());
            println!("  uid:   {}", user.uid);
            if let Some(email) = &user.email { println!("  email: {}", email); }
        }
        None => println!("Not signed in."),
    }
}

/// Adds a new task for the signed-in user. Returns the id the store assigned.
#[allow(clippy::too_many_arguments)]
pub async fn cmd_add(
    repo: &TaskRepository,
    identity: &dyn IdentityProvider,
    title: String,
    description: String,
    date: Option<String>,
    priority: Option<String>,
    category: Option<String>,
    silent: bool,
) -> Option<String> {
    let owner = current_owner(identity, silent)?;
    let priority = match priority.map(|p| p.parse::<Priority>()).transpose() {
        Ok(p) => p.unwrap_or_default(),
        Err(e) => {
            report_error("add", &e, silent);
            return None;
        }
    };
    let task = Task::new(title, description, date.unwrap_or_else(today), owner)
        .with_priority(priority)
        .with_category(category.unwrap_or_default());

    match repo.add(task).await {
        Ok(id) => {
            if !silent { println!("Todo added (id = {})", id); }
            Some(id)
        }
        Err(e) => {
            report_error("add", &e, silent);
            None
        }
    }
}

/// Lists the signed-in user's tasks, newest first.
///
/// By default, hides completed tasks unless `all` is true.
pub async fn cmd_list(repo: &TaskRepository, identity: &dyn IdentityProvider, all: bool, category: Option<String>) {
    let Some(owner) = current_owner(identity, false) else { return };
    let tasks = match repo.list(&owner).await {
        Ok(t) => t,
        Err(e) => {
            report_error("load", &e, false);
            return;
        }
    };
    let stats = TaskStats::from_tasks(&tasks);
    let shown: Vec<&Task> = tasks
        .iter()
        .filter(|t| all || !t.completed)
        .filter(|t| category.as_ref().map_or(true, |c| t.category.eq_ignore_ascii_case(c)))
        .collect();

    println!("{}", stats_line(stats));
    if shown.is_empty() {
        println!("No todos found.");
        return;
    }
    println!("{}", task_table(&shown));
}

fn stats_line(stats: TaskStats) -> String {
    format!("Total: {}  Pending: {}  Completed: {}", stats.total, stats.pending, stats.completed)
}

fn priority_color(p: Priority) -> Color {
    match p {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
    }
}

fn task_table(tasks: &[&Task]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Description").add_attribute(Attribute::Bold),
            Cell::new("Due").add_attribute(Attribute::Bold),
            Cell::new("Priority").add_attribute(Attribute::Bold),
            Cell::new("Category").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for t in tasks {
        let status = if t.completed { "Done" } else { "Pending" };
        let status_color = if t.completed { Color::Green } else { Color::Yellow };
        table.add_row(vec![
            Cell::new(short_id(t.id.as_deref().unwrap_or("-"))),
            Cell::new(&t.title),
            Cell::new(&t.description),
            Cell::new(&t.date),
            Cell::new(t.priority).fg(priority_color(t.priority)),
            Cell::new(&t.category),
            Cell::new(status).fg(status_color),
        ]);
    }
    table
}

/// First 8 characters of an id; enough to type back as a prefix.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Expands an id prefix typed by the user to the full id of one of their tasks.
async fn resolve_id(repo: &TaskRepository, owner: &str, prefix: &str, silent: bool) -> Option<String> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        report_error("find", &TodoError::MissingId, silent);
        return None;
    }
    let tasks = match repo.list(owner).await {
        Ok(t) => t,
        Err(e) => {
            report_error("load", &e, silent);
            return None;
        }
    };
    let matches: Vec<String> = tasks
        .into_iter()
        .filter_map(|t| t.id)
        .filter(|id| id.starts_with(prefix))
        .collect();
    match matches.len() {
        1 => matches.into_iter().next(),
        0 => {
            if !silent { eprintln!("Todo {} not found.", prefix); }
            None
        }
        n => {
            if !silent { eprintln!("Id prefix {} matches {} todos, use more characters.", prefix, n); }
            None
        }
    }
}

/// Edits an existing task's details (read-modify-write against its id).
#[allow(clippy::too_many_arguments)]
pub async fn cmd_edit(
    repo: &TaskRepository,
    identity: &dyn IdentityProvider,
    id: String,
    title: Option<String>,
    description: Option<String>,
    date: Option<String>,
    priority: Option<String>,
    category: Option<String>,
    silent: bool,
) -> bool {
    let Some(owner) = current_owner(identity, silent) else { return false };
    let Some(id) = resolve_id(repo, &owner, &id, silent).await else { return false };
    let mut t = match load_owned(repo, &owner, &id).await {
        Ok(t) => t,
        Err(e) => {
            report_error("update", &e, silent);
            return false;
        }
    };
    if let Some(v) = title { t.title = v; }
    if let Some(v) = description { t.description = v; }
    if let Some(v) = date { t.date = v; }
    if let Some(v) = category { t = t.with_category(v); }
    if let Some(p) = priority {
        match p.parse::<Priority>() {
            Ok(p) => t.priority = p,
            Err(e) => {
                report_error("update", &e, silent);
                return false;
            }
        }
    }
    match repo.update(t).await {
        Ok(()) => {
            if !silent { println!("Todo {} updated.", short_id(&id)); }
            true
        }
        Err(e) => {
            report_error("update", &e, silent);
            false
        }
    }
}

/// Marks a task done or not done. Without `completed`, flips the current flag.
pub async fn cmd_toggle(
    repo: &TaskRepository,
    identity: &dyn IdentityProvider,
    id: String,
    completed: Option<bool>,
    silent: bool,
) -> bool {
    let Some(owner) = current_owner(identity, silent) else { return false };
    let Some(id) = resolve_id(repo, &owner, &id, silent).await else { return false };
    let completed = match completed {
        Some(c) => c,
        None => match load_owned(repo, &owner, &id).await {
            Ok(t) => !t.completed,
            Err(e) => {
                report_error("update", &e, silent);
                return false;
            }
        },
    };
    match repo.set_completed(&id, completed).await {
        Ok(()) => {
            if !silent {
                println!("Todo {} marked as {}.", short_id(&id), if completed { "done" } else { "pending" });
            }
            true
        }
        Err(e) => {
            report_error("update", &e, silent);
            false
        }
    }
}

/// Removes a task by id (or unique id prefix).
pub async fn cmd_remove(repo: &TaskRepository, identity: &dyn IdentityProvider, id: String, silent: bool) -> bool {
    let Some(owner) = current_owner(identity, silent) else { return false };
    let Some(id) = resolve_id(repo, &owner, &id, silent).await else { return false };
    match repo.delete(&id).await {
        Ok(()) => {
            if !silent { println!("Todo {} removed.", short_id(&id)); }
            true
        }
        Err(e) => {
            report_error("delete", &e, silent);
            false
        }
    }
}

pub async fn cmd_stats(repo: &TaskRepository, identity: &dyn IdentityProvider) {
    let Some(owner) = current_owner(identity, false) else { return };
    match repo.list(&owner).await {
        Ok(tasks) => println!("{}", stats_line(TaskStats::from_tasks(&tasks))),
        Err(e) => report_error("load", &e, false),
    }
}

/// Prints each delivery of the live query as a one-line summary.
struct StdoutView {
    deliveries: usize,
}

impl TaskListView for StdoutView {
    fn show(&mut self, tasks: &[Task], stats: TaskStats) {
        self.deliveries += 1;
        println!("[{}] {}", Local::now().format("%H:%M:%S"), stats_line(stats));
        for t in tasks {
            println!("  [{}] {} ({}, {}) due {}", if t.completed { "x" } else { " " }, t.title, t.priority, t.category, t.date);
        }
    }
}

/// Follows the signed-in user's tasks, printing every redelivery until
/// Ctrl-C or after `limit` deliveries.
pub async fn cmd_watch(repo: &TaskRepository, identity: &dyn IdentityProvider, limit: Option<usize>) {
    let Some(owner) = current_owner(identity, false) else { return };
    let mut live = LiveQuery::new(repo.clone());
    if let Err(e) = live.subscribe(&owner) {
        report_error("load", &e, false);
        return;
    }
    let mut binder = TaskListBinder::new(live.slot(), StdoutView { deliveries: 0 });
    loop {
        if limit.is_some_and(|n| binder.view().deliveries >= n) { break; }
        tokio::select! {
            alive = binder.changed() => {
                if !alive { break; }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    live.unsubscribe();
}

/// Deletes the local task file.
pub fn cmd_reset(store: &JsonFileStore, force: bool) {
    if !force {
        print!("Are you sure you want to delete all todos in {}? This cannot be undone. [y/N] ", store.path().display());
        let _ = io::stdout().flush();
        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() || input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return;
        }
    }

    if let Err(e) = store.reset() {
        eprintln!("Failed to reset todos: {}", e);
    } else {
        println!("Todos reset successfully.");
    }
}
