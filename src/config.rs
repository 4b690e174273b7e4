use std::path::PathBuf;
use std::time::Duration;

/// Default live-push poll interval for the task file.
pub const DEFAULT_POLL_MS: u64 = 500;

/// Default log filter when `TODOSYNC_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Runtime settings, resolved from the environment and CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Task file (`todos.json`).
    pub db_path: PathBuf,
    /// Signed-in session file (`session.json`).
    pub session_path: PathBuf,
    /// How often the task file is checked for outside changes. `None` disables it.
    pub poll_interval: Option<Duration>,
    /// `tracing` filter directive.
    pub log_filter: String,
}

impl Config {
    /// Resolves settings in this order:
    /// 1. `TODOSYNC_DB`, `TODOSYNC_SESSION`, `TODOSYNC_POLL_MS`, `TODOSYNC_LOG`.
    /// 2. `~/.local/share/todosync/` (on Linux) for both files.
    /// 3. `./` when no data directory is known.
    pub fn from_env() -> Self {
        let db_path = std::env::var("TODOSYNC_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir().join("todos.json"));
        let session_path = std::env::var("TODOSYNC_SESSION").map(PathBuf::from).unwrap_or_else(|_| {
            let mut p = db_path.clone();
            p.set_file_name("session.json");
            p
        });
        let poll_ms = std::env::var("TODOSYNC_POLL_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_MS);
        let log_filter = std::env::var("TODOSYNC_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
        Config {
            db_path,
            session_path,
            poll_interval: (poll_ms > 0).then(|| Duration::from_millis(poll_ms)),
            log_filter,
        }
    }

    /// Overrides the task file; the session file follows it unless set explicitly.
    pub fn with_db_path(mut self, path: PathBuf) -> Self {
        if std::env::var("TODOSYNC_SESSION").is_err() {
            self.session_path = path.with_file_name("session.json");
        }
        self.db_path = path;
        self
    }
}

fn data_dir() -> PathBuf {
    let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("todosync");
    p
}
