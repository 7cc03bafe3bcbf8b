//! CLI command definitions for tasknest
//!
//! This module defines the CLI structure using clap's derive macros.
//! Command implementations live in the submodules and return the text to
//! print, so they can be exercised without a terminal.

pub mod edit;
pub mod export;
pub mod import;
pub mod migrate;
pub mod snapshot;

use crate::format::OutputFormat;
use crate::types::TaskStatus;
use clap::{Args, Parser, Subcommand};
use export::ExportArgs;
use import::ImportArgs;
use migrate::MigrateArgs;
use std::path::PathBuf;

/// Hierarchical project/task tracker with snapshot history
#[derive(Parser, Debug)]
#[command(name = "tasknest", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format (overrides config)
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or upgrade the database schema
    Init,

    /// Convert the legacy project/task tables into a snapshot
    ///
    /// `init` always creates the legacy tables, so on a freshly initialized
    /// database this writes an empty "Migrated from legacy data (empty)"
    /// snapshot. "Initial empty state" is only used for a database that has a
    /// snapshots table but no projects/tasks tables.
    Migrate(MigrateArgs),

    /// Start the REST API server
    Serve(ServeArgs),

    /// Show the latest snapshot as a task tree
    Show(ShowArgs),

    /// Inspect and manage snapshots
    #[command(subcommand)]
    Snapshot(SnapshotCommand),

    /// Edit projects (each edit is saved as a new snapshot)
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Edit tasks (each edit is saved as a new snapshot)
    #[command(subcommand)]
    Task(TaskCommand),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Interface to bind (overrides config)
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct ShowArgs {
    /// Only show this project (id or name)
    pub project: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// List snapshots, most recent first
    List,

    /// Show one snapshot
    Show { id: String },

    /// Show the most recent snapshot
    Latest,

    /// Save the current state again under a new description
    Save {
        #[arg(short = 'm', long)]
        description: Option<String>,
    },

    /// Delete a snapshot
    Delete { id: String },

    /// Make an older snapshot the latest state again
    Restore { id: String },

    /// Write a snapshot to a file
    Export(ExportArgs),

    /// Store a snapshot file as a new snapshot
    Import(ImportArgs),
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Add a project
    Add { name: String },

    /// Rename a project
    Rename {
        /// Project id or name
        project: String,
        name: String,
    },

    /// Delete a project and all its tasks
    Delete {
        /// Project id or name
        project: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a task or subtask
    Add {
        /// Project id or name
        project: String,
        title: String,

        /// Parent task id
        #[arg(short, long)]
        parent: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Set a task's status (pending, doing, done)
    Status { task: String, status: TaskStatus },

    /// Move a task to its next status
    Advance { task: String },

    /// Change a task's title
    Rename { task: String, title: String },

    /// Replace a task's description
    Describe { task: String, description: String },

    /// Move a task under another task or to the top level of a project
    Move {
        task: String,

        /// New parent task id
        #[arg(long, conflicts_with = "root", required_unless_present = "root")]
        under: Option<String>,

        /// Project (id or name) to move the task to the top level of
        #[arg(long)]
        root: Option<String>,

        /// Position among the new siblings (default: last)
        #[arg(long)]
        position: Option<usize>,
    },

    /// Delete a task and its subtasks
    Delete { task: String },
}
