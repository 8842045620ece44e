mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "checkpoint",
    about = "Record one structured changelog entry per commit and surface what comes next",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from the changelog or .git/)
    #[arg(long, global = true, env = "CHECKPOINT_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot git status and diff into a new checkpoint draft
    Check,

    /// Validate the current draft and report changelog health
    Lint,

    /// Finalize the draft: append it, commit, and record the commit hash
    Commit,

    /// Record a commit hash for an appended checkpoint (crash recovery)
    Backfill {
        /// Commit id to record
        hash: String,
    },

    /// Discard the current draft without touching the changelog
    Abort,

    /// Show session status and outstanding next steps
    Start {
        /// Number of checkpoints to scan
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Explain recorded history: history, next-steps, patterns, decisions, failed
    Explain {
        /// Section to show (default: all)
        section: Option<String>,

        /// Number of checkpoints to scan
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Full-text search over changelog entries
    Search {
        query: String,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Check => cmd::check::run(&root, cli.json),
        Commands::Lint => cmd::lint::run(&root, cli.json),
        Commands::Commit => cmd::commit::run(&root, cli.json),
        Commands::Backfill { hash } => cmd::commit::backfill(&root, &hash, cli.json),
        Commands::Abort => cmd::abort::run(&root, cli.json),
        Commands::Start { limit } => cmd::start::run(&root, limit, cli.json),
        Commands::Explain { section, limit } => {
            cmd::explain::run(&root, section.as_deref(), limit, cli.json)
        }
        Commands::Search { query, limit } => cmd::search::run(&root, &query, limit, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
