//! `tasknest snapshot export`: write one snapshot to a file or stdout.

use crate::db::SnapshotStore;
use crate::error::AppError;
use crate::export::{export_snapshot, should_compress};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the export subcommand
#[derive(Args, Debug, Default)]
pub struct ExportArgs {
    /// Snapshot id
    pub id: String,

    /// Output file path (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Force gzip compression (auto-detected from .gz extension otherwise)
    #[arg(long)]
    pub gzip: bool,
}

/// Export a snapshot.
///
/// With `--output` the file is written and a confirmation line returned;
/// otherwise the pretty JSON itself is returned for printing.
pub fn run_export<S: SnapshotStore + ?Sized>(store: &S, args: &ExportArgs) -> Result<String> {
    let compress = should_compress(args.output.as_deref(), args.gzip);
    let file = export_snapshot(store, &args.id)?;

    match &args.output {
        Some(path) => {
            file.write_file(path, compress)?;
            info!(snapshot_id = %args.id, path = %path.display(), gzip = compress, "Snapshot exported");
            Ok(format!(
                "Exported snapshot {} to {}{}\n",
                args.id,
                path.display(),
                if compress { " (gzip)" } else { "" }
            ))
        }
        None if compress => Err(AppError::invalid(
            "gzip",
            "--gzip needs an output file; compressed data is not written to stdout",
        )
        .into()),
        None => {
            let mut json = file.to_json_pretty()?;
            json.push('\n');
            Ok(json)
        }
    }
}
