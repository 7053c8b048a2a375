//! PACER CLI - offline action queue and sync for the PACER Sales Game
//!
//! Usage: pacer <command> [options]

mod commands;

use clap::{Parser, Subcommand};
use pacer_common::{EXIT_ERROR, EXIT_SUCCESS};
use pacer_sync::ActionKind;
use std::path::Path;

#[derive(Parser)]
#[command(
    name = "pacer",
    version = "0.1.0",
    about = "PACER offline action queue and sync"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a PACER workspace in the current directory
    Init,

    /// Record an action for later sync
    Enqueue {
        /// Action type (save-progress, save-session, create-team-challenge, join-team, leave-team)
        kind: ActionKind,

        /// JSON payload for save-progress, save-session and create-team-challenge
        #[arg(long)]
        data: Option<String>,

        /// Team id for team actions
        #[arg(long)]
        team: Option<i64>,

        /// User id for join-team / leave-team
        #[arg(long)]
        user: Option<i64>,
    },

    /// List pending actions in replay order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop every pending action
    Clear,

    /// Drop a single pending action by id
    Drop {
        /// Action id as printed by `pacer list`
        id: String,
    },

    /// Replay pending actions against the API
    Sync {
        /// Treat the API as unreachable without probing it
        #[arg(long)]
        offline: bool,

        /// Output the sync report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show connectivity, queue and storage status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Follow connectivity and sync automatically on reconnect
    Watch,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    pacer_common::telemetry::init_tracing(cli.verbose, cli.log_json);
    tracing::debug!("PACER CLI started");

    let result = match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Enqueue {
            kind,
            data,
            team,
            user,
        } => commands::queue::cmd_enqueue(kind, data, team, user).await,
        Commands::List { json } => commands::queue::cmd_list(json).await,
        Commands::Clear => commands::queue::cmd_clear().await,
        Commands::Drop { id } => commands::queue::cmd_drop(&id).await,
        Commands::Sync { offline, json } => commands::sync::cmd_sync(offline, json).await,
        Commands::Status { json } => commands::sync::cmd_status(json).await,
        Commands::Watch => commands::sync::cmd_watch().await,
    };

    match result {
        Ok(EXIT_SUCCESS) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_ERROR);
        }
    }
}

//
// Command implementations
//

async fn cmd_init() -> anyhow::Result<i32> {
    use std::fs;

    let pacer_dir = Path::new(pacer_config::PACER_DIR);

    if !pacer_dir.exists() {
        fs::create_dir(pacer_dir)?;
        eprintln!("✓ Created .pacer/");
    } else {
        eprintln!("✓ .pacer/ already exists");
    }

    let store_dir = pacer_dir.join("store");
    if !store_dir.exists() {
        fs::create_dir(&store_dir)?;
        eprintln!("✓ Created .pacer/store/");
    }

    let config_path = pacer_dir.join("config.toml");
    if !config_path.exists() {
        fs::write(&config_path, pacer_config::DEFAULT_CONFIG_TOML)?;
        eprintln!("✓ Created .pacer/config.toml");
    } else {
        eprintln!("✓ .pacer/config.toml already exists");
    }

    // Queue and lock files are machine-local
    let gitignore_path = Path::new(".gitignore");
    let gitignore_entries = "\n# PACER offline client\n.pacer/store/\n.pacer/sync.lock\n";

    if gitignore_path.exists() {
        let content = fs::read_to_string(gitignore_path)?;
        if !content.contains(".pacer/store/") {
            fs::write(gitignore_path, format!("{}{}", content, gitignore_entries))?;
            eprintln!("✓ Updated .gitignore");
        }
    } else {
        fs::write(gitignore_path, gitignore_entries)?;
        eprintln!("✓ Created .gitignore");
    }

    eprintln!("\n✅ Workspace initialized successfully!");
    Ok(EXIT_SUCCESS)
}
