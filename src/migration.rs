//! One-shot conversion of the legacy project/task tables into a snapshot.
//!
//! The procedure reads every project and task row, nests the tasks with the
//! tree codec and writes a single snapshot. The legacy tables are left in
//! place so the result can be checked before they are dropped by hand.

use crate::db::legacy::{list_all_tasks_internal, list_projects_internal};
use crate::db::schema::table_exists_internal;
use crate::db::snapshots::{count_snapshots, insert_snapshot};
use crate::db::Database;
use crate::tree;
use crate::types::{Project, SnapshotMeta, new_id};
use anyhow::Result;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// Description of the snapshot written when there are no legacy tables.
pub const INITIAL_EMPTY_DESCRIPTION: &str = "Initial empty state";

/// Description of the snapshot written when the legacy tables hold no projects.
pub const EMPTY_MIGRATION_DESCRIPTION: &str = "Migrated from legacy data (empty)";

/// Fatal preconditions of the migration.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("snapshots table does not exist; run `tasknest init` first")]
    SnapshotTableMissing,
}

/// Options for [`migrate_legacy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationOptions {
    /// Compute everything but do not write the snapshot.
    pub dry_run: bool,
}

/// What the migration found in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationSource {
    /// No `projects`/`tasks` tables: start from an empty state.
    NoLegacyTables,
    /// Legacy tables exist but contain no projects.
    NoProjects,
    /// Legacy data was converted.
    LegacyData,
}

/// Per-project task count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub tasks: usize,
}

/// Result of a migration that ran to completion (or a dry run).
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub source: MigrationSource,
    /// The written snapshot; `None` for a dry run.
    pub snapshot: Option<SnapshotMeta>,
    pub description: String,
    pub projects: Vec<ProjectSummary>,
    pub total_tasks: usize,
    /// Task rows read from the legacy table.
    pub rows_read: usize,
    /// Ids of tasks whose parent does not exist. They and their subtrees
    /// are left out of the snapshot.
    pub orphans: Vec<String>,
    /// Ids of tasks whose project is missing or whose parent belongs to
    /// another project. They and their subtrees are left out as well.
    pub misplaced: Vec<String>,
}

impl MigrationReport {
    /// Rows that did not make it into the nested payload.
    pub fn skipped_tasks(&self) -> usize {
        self.rows_read.saturating_sub(self.total_tasks)
    }
}

/// Outcome of [`migrate_legacy`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// Snapshots already existed and the caller declined to continue.
    Cancelled { existing_snapshots: i64 },
    Completed(MigrationReport),
}

/// Description recorded on a snapshot built from legacy data.
pub fn migration_description(projects: usize, tasks: usize) -> String {
    format!(
        "Migrated from legacy data - {} project(s), {} task(s)",
        projects, tasks
    )
}

/// Convert the legacy tables into one snapshot.
///
/// `confirm` is called with the number of existing snapshots when there are
/// any; returning `false` cancels without writing. Any storage error aborts
/// the migration. At most one snapshot row is inserted.
pub fn migrate_legacy<F>(
    db: &Database,
    options: MigrationOptions,
    confirm: F,
) -> Result<MigrationOutcome>
where
    F: FnOnce(i64) -> Result<bool>,
{
    if !db.table_exists("snapshots")? {
        return Err(MigrationError::SnapshotTableMissing.into());
    }

    let existing = db.with_conn(count_snapshots)?;
    if existing > 0 {
        warn!(existing_snapshots = existing, "Snapshots already exist");
        if !confirm(existing)? {
            info!("Migration cancelled");
            return Ok(MigrationOutcome::Cancelled {
                existing_snapshots: existing,
            });
        }
    }

    db.with_conn(|conn| {
        let has_legacy =
            table_exists_internal(conn, "projects")? && table_exists_internal(conn, "tasks")?;

        if !has_legacy {
            info!("Legacy tables (projects/tasks) do not exist, starting with empty state");
            return write_report(
                conn,
                options,
                MigrationSource::NoLegacyTables,
                INITIAL_EMPTY_DESCRIPTION.to_string(),
                Vec::new(),
                SkippedRows::default(),
            );
        }

        let projects = list_projects_internal(conn)?;
        info!(count = projects.len(), "Read legacy projects");

        if projects.is_empty() {
            return write_report(
                conn,
                options,
                MigrationSource::NoProjects,
                EMPTY_MIGRATION_DESCRIPTION.to_string(),
                Vec::new(),
                SkippedRows::default(),
            );
        }

        let tasks = list_all_tasks_internal(conn)?;
        info!(count = tasks.len(), "Read legacy tasks");

        let orphans: Vec<String> = tree::find_orphans(&tasks)
            .into_iter()
            .map(|t| t.id.clone())
            .collect();
        for orphan in &orphans {
            warn!(task_id = %orphan, "Task references a missing parent and will be skipped");
        }

        let misplaced: Vec<String> = tree::find_misplaced(&projects, &tasks)
            .into_iter()
            .map(|t| {
                warn!(
                    task_id = %t.id,
                    project_id = %t.project_id,
                    "Task is outside its project and will be skipped"
                );
                t.id.clone()
            })
            .collect();

        let nested = tree::assemble_projects(&projects, &tasks);
        let total_tasks: usize = nested.iter().map(|p| tree::count_tasks(&p.tasks)).sum();
        let description = migration_description(nested.len(), total_tasks);

        write_report(
            conn,
            options,
            MigrationSource::LegacyData,
            description,
            nested,
            SkippedRows {
                rows_read: tasks.len(),
                orphans,
                misplaced,
            },
        )
    })
    .map(MigrationOutcome::Completed)
}

#[derive(Debug, Default)]
struct SkippedRows {
    rows_read: usize,
    orphans: Vec<String>,
    misplaced: Vec<String>,
}

fn write_report(
    conn: &rusqlite::Connection,
    options: MigrationOptions,
    source: MigrationSource,
    description: String,
    data: Vec<Project>,
    skipped: SkippedRows,
) -> Result<MigrationReport> {
    let projects: Vec<ProjectSummary> = data
        .iter()
        .map(|p| ProjectSummary {
            id: p.id.clone(),
            name: p.name.clone(),
            tasks: tree::count_tasks(&p.tasks),
        })
        .collect();
    let total_tasks = projects.iter().map(|p| p.tasks).sum();

    for summary in &projects {
        info!(project = %summary.name, tasks = summary.tasks, "Project structured");
    }

    let snapshot = if options.dry_run {
        info!(description = %description, "Dry run: snapshot not written");
        None
    } else {
        Some(insert_snapshot(conn, &new_id(), Some(&description), &data)?)
    };

    Ok(MigrationReport {
        source,
        snapshot,
        description,
        projects,
        total_tasks,
        rows_read: skipped.rows_read,
        orphans: skipped.orphans,
        misplaced: skipped.misplaced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_format() {
        assert_eq!(
            migration_description(2, 7),
            "Migrated from legacy data - 2 project(s), 7 task(s)"
        );
    }

    #[test]
    fn test_missing_snapshot_table_is_fatal() {
        let db = Database::open_in_memory_raw().unwrap();
        let err = migrate_legacy(&db, MigrationOptions::default(), |_| Ok(true)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MigrationError>(),
            Some(MigrationError::SnapshotTableMissing)
        ));
    }

    #[test]
    fn test_confirm_not_called_without_snapshots() {
        let db = Database::open_in_memory().unwrap();
        let outcome = migrate_legacy(&db, MigrationOptions::default(), |_| {
            panic!("confirmation should not be requested")
        })
        .unwrap();
        assert!(matches!(outcome, MigrationOutcome::Completed(_)));
    }

    #[test]
    fn test_skipped_tasks_saturates() {
        let report = MigrationReport {
            source: MigrationSource::LegacyData,
            snapshot: None,
            description: String::new(),
            projects: vec![],
            total_tasks: 3,
            rows_read: 5,
            orphans: vec![],
            misplaced: vec![],
        };
        assert_eq!(report.skipped_tasks(), 2);
    }
}
