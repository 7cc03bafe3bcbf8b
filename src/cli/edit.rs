//! `tasknest project ...` and `tasknest task ...`.
//!
//! Each invocation loads the latest snapshot into a [`Workspace`], applies a
//! single mutation and saves the result as a new snapshot whose description
//! names the change.

use super::{ProjectCommand, TaskCommand};
use crate::db::SnapshotStore;
use crate::error::AppError;
use crate::format::{OutputFormat, format_snapshot_line, to_json};
use crate::state::{MoveTarget, Workspace};
use crate::types::SnapshotMeta;
use anyhow::Result;
use serde::Serialize;

/// Result of one edit.
#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    pub message: String,
    /// Id of the project or task the edit created, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_id: Option<String>,
    pub snapshot: SnapshotMeta,
}

impl EditOutcome {
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        Ok(match format {
            OutputFormat::Json => to_json(self)?,
            OutputFormat::Text => {
                let mut out = format!("{}\n", self.message);
                if let Some(id) = &self.created_id {
                    out.push_str(&format!("  id: {}\n", id));
                }
                out.push_str(&format!("  snapshot: {}\n", format_snapshot_line(&self.snapshot)));
                out
            }
        })
    }
}

/// What a mutation reports back: the snapshot description, plus the id of
/// anything it created.
struct Change {
    message: String,
    created_id: Option<String>,
}

impl Change {
    fn message(message: String) -> Self {
        Self {
            message,
            created_id: None,
        }
    }

    fn created(message: String, id: String) -> Self {
        Self {
            message,
            created_id: Some(id),
        }
    }
}

/// Load the latest state, apply `edit`, and save it as a new snapshot.
///
/// Nothing is written when `edit` fails.
fn edit_workspace<S, F>(store: &S, edit: F) -> Result<EditOutcome>
where
    S: SnapshotStore + ?Sized,
    F: FnOnce(&mut Workspace) -> Result<Change>,
{
    let mut workspace = Workspace::load(store)?;
    let change = edit(&mut workspace)?;
    let snapshot = workspace.checkpoint(store, Some(&change.message))?;
    Ok(EditOutcome {
        message: change.message,
        created_id: change.created_id,
        snapshot,
    })
}

fn resolve_project(workspace: &Workspace, key: &str) -> Result<String> {
    workspace
        .resolve_project(key)
        .map(str::to_string)
        .ok_or_else(|| AppError::project_not_found(key).into())
}

fn task_title(workspace: &Workspace, task_id: &str) -> Result<String> {
    workspace
        .task(task_id)
        .map(|t| t.title.clone())
        .ok_or_else(|| AppError::task_not_found(task_id).into())
}

fn project_name(workspace: &Workspace, project_id: &str) -> String {
    workspace
        .project(project_id)
        .map(|p| p.name)
        .unwrap_or_else(|| project_id.to_string())
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

pub fn run_project<S: SnapshotStore + ?Sized>(
    store: &S,
    command: &ProjectCommand,
    format: OutputFormat,
) -> Result<String> {
    let outcome = edit_workspace(store, |ws| match command {
        ProjectCommand::Add { name } => {
            let id = ws.add_project(name)?;
            Ok(Change::created(
                format!("Added project '{}'", project_name(ws, &id)),
                id,
            ))
        }
        ProjectCommand::Rename { project, name } => {
            let id = resolve_project(ws, project)?;
            let old = project_name(ws, &id);
            ws.rename_project(&id, name)?;
            Ok(Change::message(format!(
                "Renamed project '{}' to '{}'",
                old,
                project_name(ws, &id)
            )))
        }
        ProjectCommand::Delete { project } => {
            let id = resolve_project(ws, project)?;
            let name = project_name(ws, &id);
            let removed = ws.delete_project(&id)?;
            Ok(Change::message(format!(
                "Deleted project '{}' ({})",
                name,
                plural(removed, "task")
            )))
        }
    })?;
    outcome.render(format)
}

pub fn run_task<S: SnapshotStore + ?Sized>(
    store: &S,
    command: &TaskCommand,
    format: OutputFormat,
) -> Result<String> {
    let outcome = edit_workspace(store, |ws| match command {
        TaskCommand::Add {
            project,
            title,
            parent,
            description,
        } => {
            let project_id = resolve_project(ws, project)?;
            let id = ws.add_task(
                &project_id,
                parent.as_deref(),
                title,
                description.as_deref(),
            )?;
            let title = task_title(ws, &id)?;
            let message = match parent {
                Some(parent) => format!("Added subtask '{}' under '{}'", title, task_title(ws, parent)?),
                None => format!("Added task '{}' to '{}'", title, project_name(ws, &project_id)),
            };
            Ok(Change::created(message, id))
        }
        TaskCommand::Status { task, status } => {
            ws.set_status(task, *status)?;
            Ok(Change::message(format!(
                "Set '{}' to {}",
                task_title(ws, task)?,
                status
            )))
        }
        TaskCommand::Advance { task } => {
            let status = ws.advance_status(task)?;
            Ok(Change::message(format!(
                "Moved '{}' to {}",
                task_title(ws, task)?,
                status
            )))
        }
        TaskCommand::Rename { task, title } => {
            let old = task_title(ws, task)?;
            ws.rename_task(task, title)?;
            Ok(Change::message(format!(
                "Renamed task '{}' to '{}'",
                old,
                task_title(ws, task)?
            )))
        }
        TaskCommand::Describe { task, description } => {
            ws.set_description(task, description)?;
            Ok(Change::message(format!(
                "Updated description of '{}'",
                task_title(ws, task)?
            )))
        }
        TaskCommand::Move {
            task,
            under,
            root,
            position,
        } => {
            let title = task_title(ws, task)?;
            let (target, destination) = match (under, root) {
                (Some(parent), _) => (
                    MoveTarget::Under {
                        parent: parent.clone(),
                        position: *position,
                    },
                    format!("under '{}'", task_title(ws, parent)?),
                ),
                (None, Some(project)) => {
                    let project_id = resolve_project(ws, project)?;
                    let destination = format!("to the top of '{}'", project_name(ws, &project_id));
                    (
                        MoveTarget::Root {
                            project: project_id,
                            position: *position,
                        },
                        destination,
                    )
                }
                (None, None) => {
                    return Err(AppError::required("under", "A move target").into());
                }
            };
            ws.move_task(task, target)?;
            Ok(Change::message(format!("Moved '{}' {}", title, destination)))
        }
        TaskCommand::Delete { task } => {
            let title = task_title(ws, task)?;
            let removed = ws.delete_task(task)?;
            Ok(Change::message(format!(
                "Deleted task '{}' ({})",
                title,
                plural(removed, "task")
            )))
        }
    })?;
    outcome.render(format)
}
