//! `tasknest snapshot ...`: inspect and manage stored snapshots.

use super::{ShowArgs, SnapshotCommand};
use super::export::run_export;
use super::import::run_import;
use crate::db::SnapshotStore;
use crate::error::AppError;
use crate::format::{
    OutputFormat, format_projects_text, format_snapshot_line, format_snapshots_text, to_json,
};
use crate::state::Workspace;
use crate::types::{LatestSnapshot, SnapshotRecord};
use anyhow::Result;

/// Description given to the snapshot written by `snapshot restore`.
pub fn restore_description(snapshot_id: &str) -> String {
    format!("Restored from snapshot {}", snapshot_id)
}

fn render_record(record: &SnapshotRecord, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => to_json(record)?,
        OutputFormat::Text => format!(
            "{}\n\n{}",
            format_snapshot_line(&record.meta()),
            format_projects_text(&record.data)
        ),
    })
}

/// `tasknest show`: the latest state as a task tree, optionally one project.
pub fn run_show<S: SnapshotStore + ?Sized>(
    store: &S,
    args: &ShowArgs,
    format: OutputFormat,
) -> Result<String> {
    let workspace = Workspace::load(store)?;
    let projects = match &args.project {
        Some(key) => {
            let project = workspace
                .resolve_project(key)
                .and_then(|id| workspace.project(id))
                .ok_or_else(|| AppError::project_not_found(key))?;
            vec![project]
        }
        None => workspace.projects(),
    };
    Ok(match format {
        OutputFormat::Json => to_json(&projects)?,
        OutputFormat::Text => format_projects_text(&projects),
    })
}

pub fn run_snapshot<S: SnapshotStore + ?Sized>(
    store: &S,
    command: &SnapshotCommand,
    format: OutputFormat,
) -> Result<String> {
    match command {
        SnapshotCommand::List => {
            let snapshots = store.list_snapshots()?;
            Ok(match format {
                OutputFormat::Json => to_json(&snapshots)?,
                OutputFormat::Text => format_snapshots_text(&snapshots),
            })
        }
        SnapshotCommand::Show { id } => render_record(&store.get_snapshot(id)?, format),
        SnapshotCommand::Latest => match store.latest_snapshot()? {
            LatestSnapshot::Found(record) => render_record(&record, format),
            empty @ LatestSnapshot::Empty { .. } => Ok(match format {
                OutputFormat::Json => to_json(&empty)?,
                OutputFormat::Text => "No snapshots.\n".to_string(),
            }),
        },
        SnapshotCommand::Save { description } => {
            let mut workspace = Workspace::load(store)?;
            let meta = workspace.checkpoint(store, description.as_deref())?;
            Ok(match format {
                OutputFormat::Json => to_json(&meta)?,
                OutputFormat::Text => format!("Saved {}\n", format_snapshot_line(&meta)),
            })
        }
        SnapshotCommand::Delete { id } => {
            store.delete_snapshot(id)?;
            Ok(match format {
                OutputFormat::Json => to_json(&serde_json::json!({ "deleted": id }))?,
                OutputFormat::Text => format!("Deleted snapshot {}\n", id),
            })
        }
        SnapshotCommand::Restore { id } => {
            let mut workspace = Workspace::load(store)?;
            workspace.restore(store, id)?;
            let meta = workspace.checkpoint(store, Some(&restore_description(id)))?;
            Ok(match format {
                OutputFormat::Json => to_json(&meta)?,
                OutputFormat::Text => format!("Restored as {}\n", format_snapshot_line(&meta)),
            })
        }
        SnapshotCommand::Export(args) => run_export(store, args),
        SnapshotCommand::Import(args) => run_import(store, args, format),
    }
}
