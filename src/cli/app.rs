//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{query, session_cmd, task};
use crate::domain::TaskId;
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "bits")]
#[command(author, version, about = "A minimal, file-based task tracker for agent workflows")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the configured format, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Use this store directory instead of the one derived from the git root
    #[arg(long, global = true, env = "BITS_STORE")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the task store for this project
    Init {
        /// Wipe the store and start over
        #[arg(long)]
        force: bool,
    },

    /// Add a task
    Add {
        /// Task title
        title: String,

        /// Task description
        #[arg(long, short)]
        description: Option<String>,

        /// Priority (critical, high, medium, low)
        #[arg(long, short)]
        priority: Option<String>,
    },

    /// List tasks
    #[command(alias = "ls")]
    List {
        /// Show open tasks
        #[arg(long)]
        open: bool,

        /// Show active tasks
        #[arg(long)]
        active: bool,

        /// Show closed tasks
        #[arg(long)]
        closed: bool,
    },

    /// Show task details
    Show {
        /// Task ID
        id: TaskId,
    },

    /// Show tasks ready to work on
    Ready,

    /// Show open tasks waiting on dependencies
    Blocked,

    /// Show the dependency tree
    Graph,

    /// Start working on a task (open -> active)
    Claim {
        /// Task ID
        id: TaskId,
    },

    /// Stop working on a task (active -> open)
    Release {
        /// Task ID
        id: TaskId,
    },

    /// Finish a task (active -> closed)
    Close {
        /// Task ID
        id: TaskId,

        /// Why the task is closed
        reason: String,
    },

    /// Add a dependency between tasks
    Dep {
        /// Task that will be blocked
        id: TaskId,

        /// Task that must be closed first
        depends_on: TaskId,
    },

    /// Remove a dependency
    Undep {
        /// Task to unblock
        id: TaskId,

        /// Dependency to remove
        depends_on: TaskId,
    },

    /// Delete a task and every reference to it
    Rm {
        /// Task ID
        id: TaskId,
    },

    /// Delete all closed tasks
    Prune,

    /// Session ownership for agent hooks
    #[command(subcommand)]
    Session(session_cmd::SessionCommands),

    /// Drain mode management
    #[command(subcommand)]
    Drain(session_cmd::DrainCommands),
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // The stop hook must never fail the caller, so even config errors allow the stop
    if let Commands::Session(session_cmd::SessionCommands::Hook) = cli.command {
        let output = Output::new(OutputFormat::Json, cli.verbose);
        let store = cli.store;
        let open = move || -> Result<Project> { Project::open_with(store.clone(), Config::load()?) };
        session_cmd::hook(&output, &open);
        return Ok(());
    }

    let config = Config::load()?;
    let format = cli
        .format
        .or(config.default_format.map(OutputFormat::from))
        .unwrap_or_default();
    let output = Output::new(format, cli.verbose);

    output.verbose("bits starting");

    let store = cli.store;
    let open = move || -> Result<Project> {
        let project = Project::open_with(store.clone(), config.clone())?;
        Ok(project)
    };

    let result = execute(cli.command, &output, &open);
    match &result {
        Ok(()) => output.verbose("Command completed successfully"),
        Err(e) => output.failure(e),
    }
    result
}

fn execute(command: Commands, output: &Output, open: &dyn Fn() -> Result<Project>) -> Result<()> {
    match command {
        Commands::Init { force } => {
            let project = open()?;
            output.verbose_ctx(
                "init",
                &format!("Store directory: {}", project.store_dir().display()),
            );
            project.init(force)?;
            if force {
                output.success(&format!(
                    "Reinitialized bits at {}",
                    project.store_dir().display()
                ));
            } else {
                output.success(&format!("bits storage: {}", project.store_dir().display()));
            }
        }

        Commands::Add {
            title,
            description,
            priority,
        } => task::add(&open()?, output, &title, description.as_deref(), priority.as_deref())?,

        Commands::List {
            open: show_open,
            active,
            closed,
        } => task::list(&open()?, output, show_open, active, closed)?,

        Commands::Show { id } => task::show(&open()?, output, &id)?,

        Commands::Ready => query::ready(&open()?, output)?,
        Commands::Blocked => query::blocked(&open()?, output)?,
        Commands::Graph => query::graph(&open()?, output)?,

        Commands::Claim { id } => task::claim(&open()?, output, &id)?,
        Commands::Release { id } => task::release(&open()?, output, &id)?,
        Commands::Close { id, reason } => task::close(&open()?, output, &id, &reason)?,

        Commands::Dep { id, depends_on } => task::add_dependency(&open()?, output, &id, &depends_on)?,
        Commands::Undep { id, depends_on } => {
            task::remove_dependency(&open()?, output, &id, &depends_on)?
        }

        Commands::Rm { id } => task::remove(&open()?, output, &id)?,
        Commands::Prune => task::prune(&open()?, output)?,

        Commands::Session(cmd) => session_cmd::run_session(cmd, output, open)?,
        Commands::Drain(cmd) => session_cmd::run_drain(cmd, output, open)?,
    }

    Ok(())
}
