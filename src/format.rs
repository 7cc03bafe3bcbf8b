//! Output formatting for the CLI: plain text trees and JSON.

use crate::migration::{MigrationOutcome, MigrationReport, MigrationSource};
use crate::types::{Project, SnapshotMeta, Task, TaskStatus};
use crate::tree;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Pretty JSON for any serializable result.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

fn status_marker(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "[ ]",
        TaskStatus::Doing => "[~]",
        TaskStatus::Done => "[x]",
    }
}

/// Milliseconds since the epoch as local time, or the raw number if out of range.
pub fn format_timestamp(ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => dt
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => ms.to_string(),
    }
}

/// Render projects as indented task trees.
pub fn format_projects_text(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "No projects.\n".to_string();
    }
    let mut out = String::new();
    for (i, project) in projects.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format_project_text(project));
    }
    out
}

pub fn format_project_text(project: &Project) -> String {
    let count = tree::count_tasks(&project.tasks);
    let mut out = format!(
        "{} ({} task{})  [{}]\n",
        project.name,
        count,
        if count == 1 { "" } else { "s" },
        project.id
    );
    for task in &project.tasks {
        push_task(&mut out, task, 1);
    }
    out
}

fn push_task(out: &mut String, task: &Task, depth: usize) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(status_marker(task.status));
    out.push(' ');
    out.push_str(&task.title);
    out.push_str(&format!("  [{}]\n", task.id));
    if !task.description.is_empty() {
        for line in task.description.lines() {
            out.push_str(&"  ".repeat(depth + 2));
            out.push_str(line);
            out.push('\n');
        }
    }
    for subtask in &task.subtasks {
        push_task(out, subtask, depth + 1);
    }
}

/// One line per snapshot, most recent first.
pub fn format_snapshots_text(snapshots: &[SnapshotMeta]) -> String {
    if snapshots.is_empty() {
        return "No snapshots.\n".to_string();
    }
    let mut out = String::new();
    for snapshot in snapshots {
        out.push_str(&format_snapshot_line(snapshot));
        out.push('\n');
    }
    out
}

pub fn format_snapshot_line(snapshot: &SnapshotMeta) -> String {
    format!(
        "{}  {}  {}",
        snapshot.id,
        format_timestamp(snapshot.created_at),
        snapshot.description.as_deref().unwrap_or("-")
    )
}

/// Human readable summary of a migration run.
pub fn format_migration_text(outcome: &MigrationOutcome) -> String {
    match outcome {
        MigrationOutcome::Cancelled { existing_snapshots } => format!(
            "Migration cancelled ({} snapshot(s) already exist).\n",
            existing_snapshots
        ),
        MigrationOutcome::Completed(report) => format_report_text(report),
    }
}

fn format_report_text(report: &MigrationReport) -> String {
    let mut out = String::new();
    match report.source {
        MigrationSource::NoLegacyTables => {
            out.push_str("Legacy tables not found, starting with an empty state.\n")
        }
        MigrationSource::NoProjects => out.push_str("No projects found in legacy tables.\n"),
        MigrationSource::LegacyData => {
            for project in &report.projects {
                out.push_str(&format!("  {}: {} task(s)\n", project.name, project.tasks));
            }
            if report.skipped_tasks() > 0 {
                out.push_str(&format!("Skipped {} task(s)\n", report.skipped_tasks()));
            }
            if !report.orphans.is_empty() {
                out.push_str(&format!("  missing parent: {}\n", report.orphans.join(", ")));
            }
            if !report.misplaced.is_empty() {
                out.push_str(&format!(
                    "  outside their project: {}\n",
                    report.misplaced.join(", ")
                ));
            }
        }
    }

    match &report.snapshot {
        Some(meta) => out.push_str(&format!(
            "Created snapshot {}: {}\n",
            meta.id, report.description
        )),
        None => out.push_str(&format!(
            "Dry run, nothing written. Would create: {}\n",
            report.description
        )),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::ProjectSummary;

    fn task(id: &str, title: &str, status: TaskStatus, subtasks: Vec<Task>) -> Task {
        Task {
            id: id.into(),
            project_id: "p".into(),
            parent_id: None,
            title: title.into(),
            description: String::new(),
            status,
            sort_order: 0,
            created_at: None,
            subtasks,
        }
    }

    #[test]
    fn test_project_tree_is_indented() {
        let project = Project {
            id: "p".into(),
            name: "Home".into(),
            tasks: vec![task(
                "1",
                "Paint fence",
                TaskStatus::Doing,
                vec![task("2", "Buy paint", TaskStatus::Done, vec![])],
            )],
        };
        let text = format_project_text(&project);
        assert_eq!(
            text,
            "Home (2 tasks)  [p]\n  [~] Paint fence  [1]\n    [x] Buy paint  [2]\n"
        );
    }

    #[test]
    fn test_empty_lists() {
        assert_eq!(format_projects_text(&[]), "No projects.\n");
        assert_eq!(format_snapshots_text(&[]), "No snapshots.\n");
    }

    #[test]
    fn test_snapshot_line_without_description() {
        let line = format_snapshot_line(&SnapshotMeta {
            id: "s1".into(),
            created_at: 0,
            description: None,
        });
        assert!(line.starts_with("s1  "));
        assert!(line.ends_with("  -"));
    }

    #[test]
    fn test_dry_run_summary() {
        let outcome = MigrationOutcome::Completed(MigrationReport {
            source: MigrationSource::LegacyData,
            snapshot: None,
            description: "Migrated from legacy data - 1 project(s), 2 task(s)".into(),
            projects: vec![ProjectSummary {
                id: "p".into(),
                name: "Home".into(),
                tasks: 2,
            }],
            total_tasks: 2,
            rows_read: 4,
            orphans: vec!["t9".into()],
            misplaced: vec!["t7".into()],
        });
        let text = format_migration_text(&outcome);
        assert!(text.contains("Home: 2 task(s)"));
        assert!(text.contains("Skipped 2 task(s)\n"));
        assert!(text.contains("  missing parent: t9\n"));
        assert!(text.contains("  outside their project: t7\n"));
        assert!(text.contains("Dry run"));
    }
}
