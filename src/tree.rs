//! Conversion between flat task rows and nested task trees.
//!
//! Flat rows (one per task, each with a nullable parent reference) are the
//! storage form; nested trees are the payload form. Nothing here touches the
//! database.
//!
//! Orphans (tasks whose parent id does not exist) are silently left out of the
//! nested view: they never appear under a parent and never at the top level.
//! Use [`find_orphans`] to report them, and [`find_misplaced`] for rows that
//! point outside their own project.

use crate::types::{Project, ProjectRecord, Task, TaskRecord};
use std::collections::{HashMap, HashSet};

/// Build the nested subtask list for `parent_id` from flat rows.
///
/// Selects every row whose parent equals `parent_id`, keeping the input's
/// relative order, and recursively attaches each row's own children.
/// `None` selects top-level tasks.
///
/// Because every row has exactly one parent reference, only rows reachable
/// from `parent_id` are visited; a cycle detached from it is never entered.
pub fn build_hierarchy(tasks: &[TaskRecord], parent_id: Option<&str>) -> Vec<Task> {
    let index = ChildIndex::new(tasks);
    index.build(parent_id, &mut HashSet::new())
}

/// Children grouped by parent id, in input order.
struct ChildIndex<'a> {
    children: HashMap<Option<&'a str>, Vec<&'a TaskRecord>>,
}

impl<'a> ChildIndex<'a> {
    fn new(tasks: &'a [TaskRecord]) -> Self {
        let mut children: HashMap<Option<&'a str>, Vec<&'a TaskRecord>> = HashMap::new();
        for task in tasks {
            children
                .entry(task.parent_id.as_deref())
                .or_default()
                .push(task);
        }
        Self { children }
    }

    fn build(&self, parent_id: Option<&str>, path: &mut HashSet<&'a str>) -> Vec<Task> {
        let Some(rows) = self.children.get(&parent_id) else {
            return Vec::new();
        };

        let mut result = Vec::with_capacity(rows.len());
        for &row in rows {
            // A duplicated id could otherwise make a task its own ancestor.
            if !path.insert(row.id.as_str()) {
                continue;
            }
            let mut task = Task::from_record(row);
            task.subtasks = self.build(Some(row.id.as_str()), path);
            path.remove(row.id.as_str());
            result.push(task);
        }
        result
    }
}

/// Count tasks in a forest, including every nested subtask.
pub fn count_tasks(tasks: &[Task]) -> usize {
    tasks
        .iter()
        .map(|task| 1 + count_tasks(&task.subtasks))
        .sum()
}

/// Flatten a forest into rows in pre-order.
///
/// Parent references are taken from the nesting itself, so a payload whose
/// `parentId` fields drifted from its structure flattens consistently.
pub fn flatten(tasks: &[Task]) -> Vec<TaskRecord> {
    let mut rows = Vec::with_capacity(count_tasks(tasks));
    flatten_into(tasks, None, &mut rows);
    rows
}

fn flatten_into(tasks: &[Task], parent_id: Option<&str>, rows: &mut Vec<TaskRecord>) {
    for task in tasks {
        let mut row = task.to_record();
        row.parent_id = parent_id.map(str::to_string);
        rows.push(row);
        flatten_into(&task.subtasks, Some(&task.id), rows);
    }
}

/// Rows whose parent reference names a task that is not in `tasks`.
pub fn find_orphans(tasks: &[TaskRecord]) -> Vec<&TaskRecord> {
    let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    tasks
        .iter()
        .filter(|t| {
            t.parent_id
                .as_deref()
                .is_some_and(|parent| !ids.contains(parent))
        })
        .collect()
}

/// Rows that cannot be placed under their own project: the project is
/// missing, or the parent task belongs to another project.
///
/// Rows reported by [`find_orphans`] are not repeated here.
pub fn find_misplaced<'a>(
    projects: &[ProjectRecord],
    tasks: &'a [TaskRecord],
) -> Vec<&'a TaskRecord> {
    let project_ids: HashSet<&str> = projects.iter().map(|p| p.id.as_str()).collect();
    let task_projects: HashMap<&str, &str> = tasks
        .iter()
        .map(|t| (t.id.as_str(), t.project_id.as_str()))
        .collect();

    tasks
        .iter()
        .filter(|t| match t.parent_id.as_deref() {
            None => !project_ids.contains(t.project_id.as_str()),
            Some(parent) => match task_projects.get(parent) {
                None => false,
                Some(parent_project) => {
                    *parent_project != t.project_id
                        || !project_ids.contains(t.project_id.as_str())
                }
            },
        })
        .collect()
}

/// Build nested projects from flat project and task rows.
///
/// Projects keep their input order; each project receives the tasks whose
/// `project_id` matches, nested with [`build_hierarchy`].
pub fn assemble_projects(projects: &[ProjectRecord], tasks: &[TaskRecord]) -> Vec<Project> {
    let mut by_project: HashMap<&str, Vec<TaskRecord>> = HashMap::new();
    for task in tasks {
        by_project
            .entry(task.project_id.as_str())
            .or_default()
            .push(task.clone());
    }

    projects
        .iter()
        .map(|project| {
            let rows = by_project
                .get(project.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();
            Project {
                id: project.id.clone(),
                name: project.name.clone(),
                tasks: build_hierarchy(rows, None),
            }
        })
        .collect()
}
