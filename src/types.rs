//! Core types for projects, tasks and snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Task workflow status.
///
/// Serialized with the capitalised names stored in existing payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Pending,
    Doing,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Doing => "Doing",
            TaskStatus::Done => "Done",
        }
    }

    /// Next status in the Pending -> Doing -> Done -> Pending cycle.
    pub fn next(&self) -> Self {
        match self {
            TaskStatus::Pending => TaskStatus::Doing,
            TaskStatus::Doing => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Pending,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "doing" => Ok(TaskStatus::Doing),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!(
                "invalid status '{}' (expected Pending, Doing or Done)",
                other
            )),
        }
    }
}

/// A task row as stored in the legacy `tasks` table.
///
/// The parent reference is the only structural information; the nested view
/// is derived by [`crate::tree::build_hierarchy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub project_id: String,
    pub parent_id: Option<String>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub sort_order: i64,
    pub created_at: Option<i64>,
}

/// A task with its nested subtasks, as carried in snapshot payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub subtasks: Vec<Task>,
}

impl Task {
    /// Build a leaf task from a flat record.
    pub fn from_record(record: &TaskRecord) -> Self {
        Self {
            id: record.id.clone(),
            project_id: record.project_id.clone(),
            parent_id: record.parent_id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            status: record.status,
            sort_order: record.sort_order,
            created_at: record.created_at,
            subtasks: Vec::new(),
        }
    }

    /// Flat record for this task, dropping the subtasks.
    pub fn to_record(&self) -> TaskRecord {
        TaskRecord {
            id: self.id.clone(),
            project_id: self.project_id.clone(),
            parent_id: self.parent_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            sort_order: self.sort_order,
            created_at: self.created_at,
        }
    }
}

/// A project row from the legacy `projects` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

/// A project with its nested task trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Snapshot metadata, without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    pub id: String,
    pub created_at: i64,
    pub description: Option<String>,
}

/// A full snapshot including the nested project payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub id: String,
    pub created_at: i64,
    pub description: Option<String>,
    pub data: Vec<Project>,
}

impl SnapshotRecord {
    pub fn meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            id: self.id.clone(),
            created_at: self.created_at,
            description: self.description.clone(),
        }
    }
}

/// Result of asking for the most recent snapshot.
///
/// `Empty` serializes as `{"data": []}` so a fresh deployment bootstraps
/// from an empty project list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LatestSnapshot {
    Found(SnapshotRecord),
    Empty { data: Vec<Project> },
}

impl LatestSnapshot {
    pub fn empty() -> Self {
        LatestSnapshot::Empty { data: Vec::new() }
    }

    /// The payload, empty when no snapshot exists.
    pub fn data(&self) -> &[Project] {
        match self {
            LatestSnapshot::Found(record) => &record.data,
            LatestSnapshot::Empty { data } => data,
        }
    }

    pub fn into_record(self) -> Option<SnapshotRecord> {
        match self {
            LatestSnapshot::Found(record) => Some(record),
            LatestSnapshot::Empty { .. } => None,
        }
    }
}

/// Input for creating a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProject {
    /// Custom project ID (optional, UUID7 generated if not provided)
    pub id: Option<String>,
    pub name: String,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// Custom task ID (optional, UUID7 generated if not provided)
    pub id: Option<String>,
    pub project_id: String,
    pub parent_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub sort_order: Option<i64>,
}

/// Partial task update. `None` leaves a field untouched.
///
/// `parent_id` uses a nested option: `Some(None)` moves the task to the top
/// level of its project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub sort_order: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub parent_id: Option<Option<String>>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.sort_order.is_none()
            && self.parent_id.is_none()
    }
}

/// Distinguishes an explicit `null` from a missing field.
fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Generate a new time-ordered identifier.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
