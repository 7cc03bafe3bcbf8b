//! `tasknest snapshot import`: store a snapshot file as a new snapshot.

use crate::db::SnapshotStore;
use crate::export::{SnapshotFile, import_snapshot};
use crate::format::{OutputFormat, format_snapshot_line, to_json};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the import subcommand
#[derive(Args, Debug, Default)]
pub struct ImportArgs {
    /// Snapshot file (plain or gzip compressed JSON)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Keep the snapshot id from the file instead of generating a new one
    #[arg(long)]
    pub keep_id: bool,
}

pub fn run_import<S: SnapshotStore + ?Sized>(
    store: &S,
    args: &ImportArgs,
    format: OutputFormat,
) -> Result<String> {
    let file = SnapshotFile::from_file(&args.file)?;
    let meta = import_snapshot(store, &file, args.keep_id)?;

    Ok(match format {
        OutputFormat::Json => to_json(&meta)?,
        OutputFormat::Text => format!("Imported {}\n", format_snapshot_line(&meta)),
    })
}
