use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;

use crate::commands::Session;

#[derive(Parser, Debug)]
#[command(name = "tfvc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batched, workspace-aware front end for the tf command line client")]
struct Args {
    /// Settings file to use instead of ~/.tfvc/settings.toml
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Collection URL (overrides the settings file)
    #[arg(long, value_name = "URL")]
    collection: Option<String>,

    /// Team project (overrides the settings file)
    #[arg(long, value_name = "NAME")]
    project: Option<String>,

    /// User name to sign in with; the secret is read from TFVC_PASSWORD
    #[arg(long, value_name = "USER")]
    user: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Mirror the trace log to stderr
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show pending changes
    Status {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Show local and server information for items
    Info {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Delete items recursively; `$/` items are resolved through --workspace
    Delete {
        #[arg(long)]
        workspace: Option<String>,
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Undo pending changes
    Undo {
        #[arg(long)]
        workspace: Option<String>,
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Check out files for edit
    Checkout {
        #[arg(long, short)]
        recursive: bool,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Get the latest version of every file under a workspace root
    Sync {
        /// Defaults to the current directory
        root: Option<PathBuf>,
    },
    /// Inspect or edit a workspace
    #[command(subcommand)]
    Workspace(WorkspaceCommand),
}

#[derive(Subcommand, Debug)]
enum WorkspaceCommand {
    /// Show a workspace by name, or the one mapping --root
    Show {
        name: Option<String>,
        #[arg(long, conflicts_with = "name")]
        root: Option<PathBuf>,
    },
    /// Change a workspace's properties and working folders
    Edit {
        name: String,
        #[arg(long)]
        new_name: Option<String>,
        #[arg(long)]
        comment: Option<String>,
        /// local or server
        #[arg(long)]
        location: Option<String>,
        /// Add a working folder, as SERVER=LOCAL
        #[arg(long = "map", value_name = "SERVER=LOCAL")]
        map: Vec<String>,
        /// Remove the working folder for a server path
        #[arg(long = "unmap", value_name = "SERVER")]
        unmap: Vec<String>,
        /// Cloak a server path
        #[arg(long = "cloak", value_name = "SERVER")]
        cloak: Vec<String>,
        /// Sync files under this root after saving
        #[arg(long, value_name = "ROOT")]
        sync: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(args.verbose)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let local = tokio::task::LocalSet::new();
        local.run_until(async_main(args)).await
    })
}

async fn async_main(args: Args) -> Result<()> {
    info!(
        "CLI startup: command={:?}, collection={:?}, json={}",
        args.command, args.collection, args.json
    );

    let session = Session::new(
        args.settings,
        args.collection,
        args.project,
        args.user,
        args.json,
    )?;

    match args.command {
        Command::Status { paths } => session.status(paths).await,
        Command::Info { paths } => session.info(paths).await,
        Command::Delete { workspace, items } => session.delete(workspace, items).await,
        Command::Undo { workspace, items } => session.undo(workspace, items).await,
        Command::Checkout { recursive, paths } => session.checkout(paths, recursive).await,
        Command::Sync { root } => {
            let root = match root {
                Some(root) => root,
                None => std::env::current_dir().context("Failed to get current directory")?,
            };
            session.sync(root).await
        }
        Command::Workspace(WorkspaceCommand::Show { name, root }) => {
            session.show_workspace(name, root).await
        }
        Command::Workspace(WorkspaceCommand::Edit {
            name,
            new_name,
            comment,
            location,
            map,
            unmap,
            cloak,
            sync,
        }) => {
            let edits = commands::WorkspaceEdits {
                new_name,
                comment,
                location,
                map,
                unmap,
                cloak,
            };
            session.edit_workspace(name, edits, sync).await
        }
    }
}

fn setup_tracing(verbose: bool) -> Result<()> {
    use std::fs;
    use tracing_subscriber::fmt;

    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
    let trace_dir = home.join(".tfvc").join("trace");
    fs::create_dir_all(&trace_dir)?;

    let log_file = trace_dir.join("tfvc.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(stderr_layer)
        .with(filter)
        .init();

    info!("Tracing initialized to {:?}", log_file);
    Ok(())
}
