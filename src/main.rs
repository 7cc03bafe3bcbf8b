//! tasknest
//!
//! Hierarchical project/task tracker whose state is kept as a history of
//! immutable snapshots in SQLite.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tasknest::api::start_server;
use tasknest::cli::edit::{run_project, run_task};
use tasknest::cli::migrate::run_migrate;
use tasknest::cli::snapshot::{run_show, run_snapshot};
use tasknest::cli::{Cli, Command, ServeArgs};
use tasknest::config::{Config, ConfigLoader};
use tasknest::db::Database;
use tasknest::logging::{self, LogTarget};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut loader = ConfigLoader::load(cli.config.as_deref())?;
    debug!(sources = ?loader.sources(), "Config files merged");

    // Command-line flags override every config tier.
    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.storage.db_path = db_path.clone();
    }
    if let Some(format) = cli.format {
        config.output.default_format = format;
    }
    if let Command::Serve(ServeArgs { port, host }) = &cli.command {
        if let Some(port) = port {
            config.server.port = *port;
        }
        if let Some(host) = host {
            config.server.host = host.clone();
        }
    }
    let config = loader.into_config();
    let format = config.output.default_format;
    let db_path = config.storage.db_path.as_path();

    let output = match &cli.command {
        Command::Init => run_init(db_path)?,
        Command::Migrate(args) => {
            let db = open_raw(db_path)?;
            run_migrate(&db, args, format)?
        }
        Command::Serve(_) => {
            run_server(&config).await?;
            String::new()
        }
        Command::Show(args) => run_show(&open(db_path)?, args, format)?,
        Command::Snapshot(command) => run_snapshot(&open(db_path)?, command, format)?,
        Command::Project(command) => run_project(&open(db_path)?, command, format)?,
        Command::Task(command) => run_task(&open(db_path)?, command, format)?,
    };

    if !output.is_empty() {
        print!("{}", output);
        if !output.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

fn ensure_parent_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create directory {}", parent.display()))?;
    }
    Ok(())
}

fn open(db_path: &Path) -> Result<Database> {
    ensure_parent_dir(db_path)?;
    Database::open(db_path)
}

fn open_raw(db_path: &Path) -> Result<Database> {
    ensure_parent_dir(db_path)?;
    Database::open_raw(db_path)
}

/// Create or upgrade the schema.
fn run_init(db_path: &Path) -> Result<String> {
    let db = open_raw(db_path)?;
    let applied = db.run_migrations()?;
    let mut out = if applied.is_empty() {
        format!("Database {} is up to date.\n", db_path.display())
    } else {
        format!("Initialized {}\n", db_path.display())
    };
    for name in applied {
        out.push_str(&format!("  applied {}\n", name));
    }

    let counts = db.table_counts()?;
    let projects = counts.projects.unwrap_or(0);
    let snapshots = counts.snapshots.unwrap_or(0);
    out.push_str(&format!(
        "  {} legacy project(s), {} legacy task(s), {} snapshot(s)\n",
        projects,
        counts.tasks.unwrap_or(0),
        snapshots
    ));
    if db.has_legacy_tables()? && projects > 0 && snapshots == 0 {
        out.push_str("Run `tasknest migrate` to convert the legacy tables into a snapshot.\n");
    }
    Ok(out)
}

async fn run_server(config: &Config) -> Result<()> {
    let db = Arc::new(open(&config.storage.db_path)?);
    let addr = config.server.socket_addr()?;
    let (shutdown, bound) = start_server(db, addr).await?;
    eprintln!("Listening on http://{} (Ctrl-C to stop)", bound);

    tokio::signal::ctrl_c()
        .await
        .context("cannot listen for shutdown signal")?;
    info!("Shutdown requested");
    let _ = shutdown.send(());
    Ok(())
}
