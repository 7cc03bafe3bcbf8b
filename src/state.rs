//! In-memory workspace: the editable project tree between two snapshots.
//!
//! Tasks are kept in an arena keyed by id, each node holding its flat record
//! and the ordered ids of its children. Projects hold the ordered ids of their
//! top-level tasks. The nested form is only built when the workspace is saved
//! or rendered.
//!
//! Every mutation validates before it changes anything, so a failed call
//! leaves the workspace exactly as it was. Successful mutations mark the
//! workspace dirty and bump its revision.

use crate::db::legacy::required_text;
use crate::db::{SnapshotStore, now_ms};
use crate::error::AppError;
use crate::types::{LatestSnapshot, Project, SnapshotMeta, Task, TaskRecord, TaskStatus, new_id};
use anyhow::Result;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Where a moved task ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveTarget {
    /// Become a child of `parent`, at `position` among its children
    /// (appended when `None` or past the end).
    Under {
        parent: String,
        position: Option<usize>,
    },
    /// Become a top-level task of `project`.
    Root {
        project: String,
        position: Option<usize>,
    },
}

#[derive(Debug, Clone)]
struct ProjectEntry {
    id: String,
    name: String,
    roots: Vec<String>,
}

#[derive(Debug, Clone)]
struct TaskNode {
    record: TaskRecord,
    children: Vec<String>,
}

/// Editable state loaded from the snapshot store.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    projects: Vec<ProjectEntry>,
    tasks: HashMap<String, TaskNode>,
    dirty: bool,
    revision: u64,
    base_snapshot: Option<String>,
}

impl Workspace {
    /// An empty, clean workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a clean workspace from a nested payload.
    ///
    /// Nesting is authoritative: each task's project and parent ids are taken
    /// from where it sits in the payload. A task id seen a second time is
    /// dropped together with its subtasks.
    pub fn from_projects(projects: &[Project]) -> Self {
        let mut workspace = Self::new();
        for project in projects {
            let mut roots = Vec::with_capacity(project.tasks.len());
            for task in &project.tasks {
                if let Some(id) = workspace.insert_subtree(&project.id, None, task) {
                    roots.push(id);
                }
            }
            workspace.projects.push(ProjectEntry {
                id: project.id.clone(),
                name: project.name.clone(),
                roots,
            });
        }
        workspace
    }

    fn insert_subtree(&mut self, project_id: &str, parent: Option<&str>, task: &Task) -> Option<String> {
        if self.tasks.contains_key(&task.id) {
            warn!(task_id = %task.id, "Duplicate task id in payload, skipping subtree");
            return None;
        }

        let mut record = task.to_record();
        record.project_id = project_id.to_string();
        record.parent_id = parent.map(str::to_string);
        self.tasks.insert(
            task.id.clone(),
            TaskNode {
                record,
                children: Vec::new(),
            },
        );

        let children: Vec<String> = task
            .subtasks
            .iter()
            .filter_map(|child| self.insert_subtree(project_id, Some(&task.id), child))
            .collect();
        if let Some(node) = self.tasks.get_mut(&task.id) {
            node.children = children;
        }
        Some(task.id.clone())
    }

    /// Load the most recent snapshot, or start empty when there is none.
    pub fn load<S: SnapshotStore + ?Sized>(store: &S) -> Result<Self> {
        match store.latest_snapshot()? {
            LatestSnapshot::Found(record) => {
                let mut workspace = Self::from_projects(&record.data);
                info!(
                    snapshot_id = %record.id,
                    projects = workspace.projects.len(),
                    tasks = workspace.tasks.len(),
                    "Loaded workspace"
                );
                workspace.base_snapshot = Some(record.id);
                Ok(workspace)
            }
            LatestSnapshot::Empty { .. } => {
                debug!("No snapshot stored, starting with an empty workspace");
                Ok(Self::new())
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Incremented by every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Snapshot this workspace was loaded from or last saved to.
    pub fn base_snapshot(&self) -> Option<&str> {
        self.base_snapshot.as_deref()
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskRecord> {
        self.tasks.get(task_id).map(|node| &node.record)
    }

    /// Ordered ids of a task's direct subtasks.
    pub fn children(&self, task_id: &str) -> Option<&[String]> {
        self.tasks.get(task_id).map(|node| node.children.as_slice())
    }

    /// Nested view of the whole workspace.
    pub fn projects(&self) -> Vec<Project> {
        self.projects.iter().map(|p| self.nest_project(p)).collect()
    }

    /// Nested view of one project.
    pub fn project(&self, project_id: &str) -> Option<Project> {
        self.find_project(project_id).map(|p| self.nest_project(p))
    }

    /// Find a project id by exact id or case-insensitive name.
    pub fn resolve_project(&self, key: &str) -> Option<&str> {
        self.projects
            .iter()
            .find(|p| p.id == key)
            .or_else(|| {
                self.projects
                    .iter()
                    .find(|p| p.name.eq_ignore_ascii_case(key.trim()))
            })
            .map(|p| p.id.as_str())
    }

    fn nest_project(&self, entry: &ProjectEntry) -> Project {
        Project {
            id: entry.id.clone(),
            name: entry.name.clone(),
            tasks: entry.roots.iter().filter_map(|id| self.nest(id)).collect(),
        }
    }

    fn nest(&self, task_id: &str) -> Option<Task> {
        let node = self.tasks.get(task_id)?;
        let mut task = Task::from_record(&node.record);
        task.subtasks = node.children.iter().filter_map(|id| self.nest(id)).collect();
        Some(task)
    }

    fn find_project(&self, project_id: &str) -> Option<&ProjectEntry> {
        self.projects.iter().find(|p| p.id == project_id)
    }

    fn project_index(&self, project_id: &str) -> Result<usize> {
        self.projects
            .iter()
            .position(|p| p.id == project_id)
            .ok_or_else(|| AppError::project_not_found(project_id).into())
    }

    fn node(&self, task_id: &str) -> Result<&TaskNode> {
        self.tasks
            .get(task_id)
            .ok_or_else(|| AppError::task_not_found(task_id).into())
    }

    fn node_mut(&mut self, task_id: &str) -> Result<&mut TaskNode> {
        self.tasks
            .get_mut(task_id)
            .ok_or_else(|| AppError::task_not_found(task_id).into())
    }

    /// Sibling list a task with this project and parent lives in.
    fn siblings_mut(&mut self, project_id: &str, parent: Option<&str>) -> Option<&mut Vec<String>> {
        match parent {
            Some(parent_id) => self.tasks.get_mut(parent_id).map(|n| &mut n.children),
            None => self
                .projects
                .iter_mut()
                .find(|p| p.id == project_id)
                .map(|p| &mut p.roots),
        }
    }

    fn renumber(&mut self, project_id: &str, parent: Option<&str>) {
        let ids = match self.siblings_mut(project_id, parent) {
            Some(ids) => ids.clone(),
            None => return,
        };
        for (position, id) in ids.iter().enumerate() {
            if let Some(node) = self.tasks.get_mut(id) {
                node.record.sort_order = position as i64;
            }
        }
    }

    /// Ids of a task and all its descendants, pre-order.
    fn subtree_ids(&self, task_id: &str) -> Vec<String> {
        let mut ids = Vec::new();
        let mut stack = vec![task_id.to_string()];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.tasks.get(&id) {
                stack.extend(node.children.iter().rev().cloned());
            }
            ids.push(id);
        }
        ids
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }

    // ---------------------------------------------------------------------
    // Projects
    // ---------------------------------------------------------------------

    /// Add a project, returning its id.
    pub fn add_project(&mut self, name: &str) -> Result<String> {
        let name = required_text(name, "name", "Project name")?;
        let id = new_id();
        self.projects.push(ProjectEntry {
            id: id.clone(),
            name,
            roots: Vec::new(),
        });
        self.touch();
        debug!(project_id = %id, "Project added");
        Ok(id)
    }

    pub fn rename_project(&mut self, project_id: &str, name: &str) -> Result<()> {
        let name = required_text(name, "name", "Project name")?;
        let index = self.project_index(project_id)?;
        self.projects[index].name = name;
        self.touch();
        Ok(())
    }

    /// Remove a project and every task in it. Returns the number of tasks removed.
    pub fn delete_project(&mut self, project_id: &str) -> Result<usize> {
        let index = self.project_index(project_id)?;
        let entry = self.projects.remove(index);

        let mut removed = 0;
        for root in &entry.roots {
            for id in self.subtree_ids(root) {
                if self.tasks.remove(&id).is_some() {
                    removed += 1;
                }
            }
        }
        self.touch();
        debug!(project_id = %project_id, tasks = removed, "Project deleted");
        Ok(removed)
    }

    // ---------------------------------------------------------------------
    // Tasks
    // ---------------------------------------------------------------------

    /// Add a task at the end of its sibling list, returning its id.
    ///
    /// With a parent, the parent must exist and belong to `project_id`.
    pub fn add_task(
        &mut self,
        project_id: &str,
        parent_id: Option<&str>,
        title: &str,
        description: Option<&str>,
    ) -> Result<String> {
        let title = required_text(title, "title", "Task title")?;
        self.project_index(project_id)?;
        if let Some(parent_id) = parent_id {
            let parent = self
                .tasks
                .get(parent_id)
                .ok_or_else(|| AppError::task_not_found(parent_id).with_field("parentId"))?;
            if parent.record.project_id != project_id {
                return Err(AppError::invalid(
                    "parentId",
                    format!(
                        "Parent task {} belongs to a different project",
                        parent_id
                    ),
                )
                .into());
            }
        }

        let id = new_id();
        let siblings = self
            .siblings_mut(project_id, parent_id)
            .ok_or_else(|| AppError::internal("sibling list vanished during insert"))?;
        let sort_order = siblings.len() as i64;
        siblings.push(id.clone());

        self.tasks.insert(
            id.clone(),
            TaskNode {
                record: TaskRecord {
                    id: id.clone(),
                    project_id: project_id.to_string(),
                    parent_id: parent_id.map(str::to_string),
                    title,
                    description: description.map(|d| d.trim().to_string()).unwrap_or_default(),
                    status: TaskStatus::Pending,
                    sort_order,
                    created_at: Some(now_ms()),
                },
                children: Vec::new(),
            },
        );
        self.touch();
        debug!(task_id = %id, project_id = %project_id, "Task added");
        Ok(id)
    }

    /// Remove a task and its subtree. Returns the number of tasks removed.
    pub fn delete_task(&mut self, task_id: &str) -> Result<usize> {
        let record = self.node(task_id)?.record.clone();
        let parent = record.parent_id.as_deref();

        if let Some(siblings) = self.siblings_mut(&record.project_id, parent) {
            siblings.retain(|id| id != task_id);
        }
        let ids = self.subtree_ids(task_id);
        for id in &ids {
            self.tasks.remove(id);
        }
        self.renumber(&record.project_id, parent);
        self.touch();
        debug!(task_id = %task_id, removed = ids.len(), "Task deleted");
        Ok(ids.len())
    }

    pub fn set_status(&mut self, task_id: &str, status: TaskStatus) -> Result<()> {
        self.node_mut(task_id)?.record.status = status;
        self.touch();
        Ok(())
    }

    /// Move a task to the next status in the cycle, returning the new status.
    pub fn advance_status(&mut self, task_id: &str) -> Result<TaskStatus> {
        let node = self.node_mut(task_id)?;
        let next = node.record.status.next();
        node.record.status = next;
        self.touch();
        Ok(next)
    }

    pub fn rename_task(&mut self, task_id: &str, title: &str) -> Result<()> {
        let title = required_text(title, "title", "Task title")?;
        self.node_mut(task_id)?.record.title = title;
        self.touch();
        Ok(())
    }

    pub fn set_description(&mut self, task_id: &str, description: &str) -> Result<()> {
        self.node_mut(task_id)?.record.description = description.trim().to_string();
        self.touch();
        Ok(())
    }

    /// Reparent and/or reorder a task.
    ///
    /// Both the old and the new sibling lists are renumbered `0..n`. Moving a
    /// task to another project carries its whole subtree along.
    pub fn move_task(&mut self, task_id: &str, target: MoveTarget) -> Result<()> {
        let record = self.node(task_id)?.record.clone();

        let (project_id, parent_id, position) = match target {
            MoveTarget::Under { parent, position } => {
                let parent_node = self
                    .tasks
                    .get(&parent)
                    .ok_or_else(|| AppError::task_not_found(&parent).with_field("parentId"))?;
                if self.subtree_ids(task_id).iter().any(|id| *id == parent) {
                    return Err(AppError::invalid(
                        "parentId",
                        "Cannot move a task under itself or one of its subtasks",
                    )
                    .into());
                }
                (parent_node.record.project_id.clone(), Some(parent), position)
            }
            MoveTarget::Root { project, position } => {
                self.project_index(&project)?;
                (project, None, position)
            }
        };

        let old_parent = record.parent_id.as_deref();
        if let Some(siblings) = self.siblings_mut(&record.project_id, old_parent) {
            siblings.retain(|id| id != task_id);
        }
        self.renumber(&record.project_id, old_parent);

        let siblings = self
            .siblings_mut(&project_id, parent_id.as_deref())
            .ok_or_else(|| AppError::internal("target sibling list vanished during move"))?;
        let slot = position.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(slot, task_id.to_string());

        if project_id != record.project_id {
            for id in self.subtree_ids(task_id) {
                if let Some(node) = self.tasks.get_mut(&id) {
                    node.record.project_id = project_id.clone();
                }
            }
        }
        self.node_mut(task_id)?.record.parent_id = parent_id.clone();
        self.renumber(&project_id, parent_id.as_deref());
        self.touch();

        debug!(
            task_id = %task_id,
            project_id = %project_id,
            parent_id = ?parent_id,
            position = slot,
            "Task moved"
        );
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------

    /// Save the workspace as a new snapshot if it has unsaved changes.
    ///
    /// Returns `Ok(None)` when there was nothing to save. On failure the
    /// workspace stays dirty so the save can be retried.
    pub fn save<S: SnapshotStore + ?Sized>(
        &mut self,
        store: &S,
        description: Option<&str>,
    ) -> Result<Option<SnapshotMeta>> {
        if !self.dirty {
            debug!("Workspace clean, nothing to save");
            return Ok(None);
        }
        self.checkpoint(store, description).map(Some)
    }

    /// Save the workspace as a new snapshot even when it is clean.
    pub fn checkpoint<S: SnapshotStore + ?Sized>(
        &mut self,
        store: &S,
        description: Option<&str>,
    ) -> Result<SnapshotMeta> {
        let data = self.projects();
        match store.create_snapshot(&new_id(), description, &data) {
            Ok(meta) => {
                self.dirty = false;
                self.base_snapshot = Some(meta.id.clone());
                info!(snapshot_id = %meta.id, revision = self.revision, "Workspace saved");
                Ok(meta)
            }
            Err(err) => {
                warn!(error = %format!("{:#}", err), "Saving workspace failed, changes kept");
                Err(err)
            }
        }
    }

    /// Replace the workspace with the contents of a stored snapshot.
    ///
    /// The result is dirty: it only becomes the latest state once saved.
    pub fn restore<S: SnapshotStore + ?Sized>(&mut self, store: &S, snapshot_id: &str) -> Result<()> {
        let record = store.get_snapshot(snapshot_id)?;
        let revision = self.revision;
        *self = Self::from_projects(&record.data);
        self.base_snapshot = Some(record.id);
        self.revision = revision;
        self.touch();
        info!(snapshot_id = %snapshot_id, "Workspace restored from snapshot");
        Ok(())
    }
}
