//! # todosync
//!
//! A terminal to-do list that stays in sync with its backing store. Every
//! open list (the TUI, `todosync watch`) follows a live query for the
//! signed-in user and redraws whenever the user's todos change, whether the
//! change came from this process or another one writing the same file.
//!
//! ## Usage
//!
//! ```bash
//! todosync login alice --email alice@example.com --name Alice
//! todosync add "Buy milk" -d "2% milk" -t 01/05/2025 -p high -c Shopping
//! todosync list --all
//! todosync toggle 3f2a9c1e
//! todosync watch        # follow changes until Ctrl-C
//! todosync              # interactive TUI
//! ```
//!
//! #### TUI Key Bindings
//!
//! *   `a`: Add a todo (title, description, date, priority, category)
//! *   `Space`: Mark selected todo done / not done
//! *   `d`: Delete selected todo
//! *   `n` / `e` / `t` / `p` / `g`: Edit title / description / date / priority / category
//! *   `c`: Show/Hide completed todos
//! *   `r`: Reload the list
//! *   `q`: Quit
//!
//! ## Data Storage
//!
//! Todos are saved in `todos.json` and the signed-in user in
//! `session.json`, both in your local data directory
//! (`~/.local/share/todosync/` on Linux). Override with `TODOSYNC_DB`,
//! `TODOSYNC_SESSION` or `--db`. `TODOSYNC_LOG` sets the log filter and
//! `TODOSYNC_POLL_MS` how often the file is checked for outside changes.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

use todosync::auth::{IdentityProvider, SessionIdentity};
use todosync::commands::*;
use todosync::config::Config;
use todosync::repository::TaskRepository;
use todosync::store::file::JsonFileStore;
use todosync::store::TaskStore;
use todosync::tui::run_tui;
use todosync::viewmodel::TodoViewModel;

#[derive(Parser)]
#[command(name = "todosync")]
#[command(about = "To-do list that stays in sync", long_about = None)]
struct Cli {
    /// Task file to use instead of the default
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in as a user
    Login {
        /// User id
        uid: String,
        #[arg(short, long)]
        email: Option<String>,
        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Add a new todo
    Add {
        /// Todo title (quoted if it has spaces)
        title: String,
        #[arg(short, long)]
        description: String,
        /// Due date in DD/MM/YYYY, defaults to today
        #[arg(short = 't', long)]
        date: Option<String>,
        /// HIGH, MEDIUM or LOW
        #[arg(short, long)]
        priority: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List your todos, newest first
    List {
        /// Show completed todos
        #[arg(short, long)]
        all: bool,
        /// Only this category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Edit a todo
    Edit {
        /// Todo id or unique id prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short = 't', long)]
        date: Option<String>,
        #[arg(short, long)]
        priority: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Mark a todo done or not done (flips it by default)
    Toggle {
        id: String,
        #[arg(long, conflicts_with = "pending")]
        done: bool,
        #[arg(long)]
        pending: bool,
    },
    /// Remove a todo
    Remove {
        id: String,
    },
    /// Show total, pending and completed counts
    Stats,
    /// Print your todos every time they change
    Watch {
        /// Stop after this many updates
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Reset the database (delete all todos of every user)
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
    /// Open interactive TUI
    Ui,
}

/// Logs go to stderr, or to `todosync.log` next to the task file while the
/// TUI owns the terminal.
fn init_logging(config: &Config, tui: bool) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if tui {
        let path = config.db_path.with_file_name("todosync.log");
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
            Err(_) => builder.with_writer(io::sink).init(),
        }
    } else {
        builder.with_writer(io::stderr).init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(db) = cli.db {
        config = config.with_db_path(db);
    }
    init_logging(&config, matches!(cli.command, None | Some(Commands::Ui)));

    let file_store = JsonFileStore::with_poll_interval(&config.db_path, config.poll_interval);
    let store: Arc<dyn TaskStore> = Arc::new(file_store.clone());
    let repo = TaskRepository::new(store);
    let identity = Arc::new(SessionIdentity::load(&config.session_path));
    tracing::debug!(db = %config.db_path.display(), session = %config.session_path.display(), "starting");

    match cli.command {
        Some(Commands::Login { uid, email, name }) => {
            cmd_login(&identity, uid, email, name, false);
        }
        Some(Commands::Logout) => cmd_logout(identity.as_ref(), false),
        Some(Commands::Whoami) => cmd_whoami(identity.as_ref()),
        Some(Commands::Add { title, description, date, priority, category }) => {
            cmd_add(&repo, identity.as_ref(), title, description, date, priority, category, false).await;
        }
        Some(Commands::List { all, category }) => cmd_list(&repo, identity.as_ref(), all, category).await,
        Some(Commands::Edit { id, title, description, date, priority, category }) => {
            cmd_edit(&repo, identity.as_ref(), id, title, description, date, priority, category, false).await;
        }
        Some(Commands::Toggle { id, done, pending }) => {
            let completed = if done { Some(true) } else if pending { Some(false) } else { None };
            cmd_toggle(&repo, identity.as_ref(), id, completed, false).await;
        }
        Some(Commands::Remove { id }) => {
            cmd_remove(&repo, identity.as_ref(), id, false).await;
        }
        Some(Commands::Stats) => cmd_stats(&repo, identity.as_ref()).await,
        Some(Commands::Watch { limit }) => cmd_watch(&repo, identity.as_ref(), limit).await,
        Some(Commands::Reset { force }) => cmd_reset(&file_store, force),
        Some(Commands::Completions { shell }) => {
            let shell_enum = match shell.as_str() {
                "bash" => Shell::Bash,
                "zsh" => Shell::Zsh,
                "fish" => Shell::Fish,
                "powershell" => Shell::PowerShell,
                "elvish" => Shell::Elvish,
                _ => {
                    eprintln!("Unsupported shell: {}", shell);
                    return;
                }
            };
            let mut cmd = Cli::command();
            generate(shell_enum, &mut cmd, "todosync", &mut io::stdout());
        }
        Some(Commands::Ui) | None => {
            let label = match identity.current_user() {
                Some(user) => user.label().to_string(),
                None => {
                    eprintln!("Not signed in. Run `todosync login <uid>` first.");
                    return;
                }
            };
            let vm = TodoViewModel::new(repo, identity);
            if let Err(e) = run_tui(vm, label).await {
                eprintln!("Error running TUI: {}", e);
            }
        }
    }
}
