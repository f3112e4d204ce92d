//! # ragbot CLI
//!
//! ## Usage
//!
//! ```bash
//! ragbot --config ./config/ragbot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragbot init` | Create the SQLite database and run schema migrations |
//! | `ragbot theme add <name>` / `theme list` | Manage themes |
//! | `ragbot upload <theme> <file>...` | Store files as pending documents |
//! | `ragbot documents <theme>` | List a theme's documents |
//! | `ragbot index <theme>` | Index pending documents |
//! | `ragbot search <theme> "<query>"` | Show the closest chunks |
//! | `ragbot ask <theme> "<question>" --session <id>` | Answer within a session |
//! | `ragbot session new <owner>` / `session list` | Manage sessions |
//! | `ragbot messages` | List recorded questions and answers |
//! | `ragbot partition add <name>` / `partition list` | Manage partition types |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ragbot::{admin, ask, config, index_cmd, logging, migrate, search};

/// Topic-scoped question answering over uploaded documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragbot.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "ragbot", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragbot.toml")]
    config: PathBuf,

    /// Log progress to stderr (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Manage themes.
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },

    /// Copy files into storage as pending documents of a theme.
    ///
    /// The theme is created if it does not exist yet.
    Upload {
        theme: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List the documents of a theme.
    Documents { theme: String },

    /// Index the pending documents of a theme.
    ///
    /// Exits non-zero if indexing fails; the documents then stay pending.
    Index { theme: String },

    /// Show the chunks closest to a query, without generating an answer.
    Search {
        theme: String,
        query: String,
        /// Number of chunks to show (defaults to `[retrieval] top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question from a theme's documents.
    Ask {
        theme: String,
        question: String,
        /// Session whose recent turns are used and extended.
        #[arg(long)]
        session: Option<i64>,
        /// Number of previous messages to include.
        #[arg(long)]
        limit: Option<i64>,
        /// Do not read or record session history.
        #[arg(long, conflicts_with = "session")]
        no_history: bool,
    },

    /// Manage chat sessions.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// List recorded messages, oldest first.
    Messages {
        #[arg(long)]
        session: Option<i64>,
        #[arg(long)]
        owner: Option<String>,
    },

    /// Manage partition types.
    Partition {
        #[command(subcommand)]
        action: PartitionAction,
    },
}

#[derive(Subcommand)]
enum ThemeAction {
    Add { name: String },
    List,
}

#[derive(Subcommand)]
enum SessionAction {
    /// Start a session and print its id.
    New { owner: String },
    List,
}

#[derive(Subcommand)]
enum PartitionAction {
    Add { name: String },
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Theme { action } => match action {
            ThemeAction::Add { name } => admin::run_theme_add(&cfg, &name).await?,
            ThemeAction::List => admin::run_theme_list(&cfg).await?,
        },
        Commands::Upload { theme, files } => {
            admin::run_upload(&cfg, &theme, &files).await?;
        }
        Commands::Documents { theme } => {
            admin::run_documents(&cfg, &theme).await?;
        }
        Commands::Index { theme } => {
            index_cmd::run_index(&cfg, &theme).await?;
        }
        Commands::Search {
            theme,
            query,
            limit,
        } => {
            search::run_search(&cfg, &theme, &query, limit).await?;
        }
        Commands::Ask {
            theme,
            question,
            session,
            limit,
            no_history,
        } => {
            let opts = ask::AskOptions {
                session,
                limit,
                no_history,
            };
            ask::run_ask(&cfg, &theme, &question, opts).await?;
        }
        Commands::Session { action } => match action {
            SessionAction::New { owner } => admin::run_session_new(&cfg, &owner).await?,
            SessionAction::List => admin::run_session_list(&cfg).await?,
        },
        Commands::Messages { session, owner } => {
            admin::run_messages(&cfg, session, owner.as_deref()).await?;
        }
        Commands::Partition { action } => match action {
            PartitionAction::Add { name } => admin::run_partition_add(&cfg, &name).await?,
            PartitionAction::List => admin::run_partition_list(&cfg).await?,
        },
    }

    Ok(())
}
