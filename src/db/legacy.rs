//! Relational project/task storage (legacy mode).
//!
//! One row per project and one row per task; the parent/child structure lives
//! only in `tasks.parent_id`. Nested reads go through [`crate::tree`].
//! Deletes cascade through `ON DELETE CASCADE` foreign keys.

use super::schema::{columns_internal, table_exists_internal};
use super::{Database, now_ms};
use crate::error::{AppError, is_unique_violation};
use crate::tree;
use crate::types::{
    NewProject, NewTask, Project, ProjectRecord, TaskRecord, TaskStatus, TaskUpdate, new_id,
};
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use tracing::{debug, info};

/// Format SQLite's `CURRENT_TIMESTAMP` writes.
const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Read a `created_at` column as epoch milliseconds.
///
/// Integer columns are taken as-is; `CURRENT_TIMESTAMP` text is parsed as UTC.
/// Anything unreadable becomes `None`.
fn timestamp_ms(row: &Row, column: &str) -> rusqlite::Result<Option<i64>> {
    let value = match row.get::<_, Value>(column)? {
        Value::Integer(ms) => Some(ms),
        Value::Real(ms) => Some(ms as i64),
        Value::Text(text) => parse_sqlite_timestamp(&text),
        Value::Null | Value::Blob(_) => None,
    };
    Ok(value)
}

fn parse_sqlite_timestamp(text: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(text.trim(), SQLITE_TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn parse_project_row(row: &Row) -> rusqlite::Result<ProjectRecord> {
    Ok(ProjectRecord {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: timestamp_ms(row, "created_at")?.unwrap_or(0),
    })
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<TaskRecord> {
    let status: String = row.get("status")?;
    let status = status.parse::<TaskStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(TaskRecord {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        parent_id: row.get("parent_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status,
        sort_order: row.get("sort_order")?,
        created_at: timestamp_ms(row, "created_at")?,
    })
}

/// SELECT over `tasks` that tolerates tables created before the
/// `description` and `sort_order` columns existed.
fn task_select(conn: &Connection) -> Result<String> {
    let columns = columns_internal(conn, "tasks")?;
    let has = |name: &str| columns.iter().any(|c| c.name == name);

    let description = if has("description") {
        "COALESCE(description, '')"
    } else {
        "''"
    };
    let sort_order = if has("sort_order") {
        "COALESCE(sort_order, 0)"
    } else {
        "0"
    };

    Ok(format!(
        "SELECT id, project_id, parent_id, title, status, created_at,
                {} AS description, {} AS sort_order
         FROM tasks",
        description, sort_order
    ))
}

pub(crate) fn list_projects_internal(conn: &Connection) -> Result<Vec<ProjectRecord>> {
    let mut stmt = conn.prepare("SELECT * FROM projects ORDER BY created_at ASC, rowid ASC")?;
    let projects = stmt
        .query_map([], parse_project_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(projects)
}

pub(crate) fn list_all_tasks_internal(conn: &Connection) -> Result<Vec<TaskRecord>> {
    let sql = format!("{} ORDER BY created_at ASC, rowid ASC", task_select(conn)?);
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map([], parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

fn list_project_tasks_internal(conn: &Connection, project_id: &str) -> Result<Vec<TaskRecord>> {
    let sql = format!(
        "{} WHERE project_id = ?1 ORDER BY created_at ASC, rowid ASC",
        task_select(conn)?
    );
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params![project_id], parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

fn get_project_internal(conn: &Connection, project_id: &str) -> Result<Option<ProjectRecord>> {
    let project = conn
        .query_row(
            "SELECT * FROM projects WHERE id = ?1",
            params![project_id],
            parse_project_row,
        )
        .optional()?;
    Ok(project)
}

fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<TaskRecord>> {
    let sql = format!("{} WHERE id = ?1", task_select(conn)?);
    let task = conn
        .query_row(&sql, params![task_id], parse_task_row)
        .optional()?;
    Ok(task)
}

/// Whether `candidate` lies in the subtree rooted at `root` (root included).
fn is_in_subtree(conn: &Connection, root: &str, candidate: &str) -> Result<bool> {
    let found: i64 = conn.query_row(
        "WITH RECURSIVE subtree AS (
            SELECT ?1 AS id
            UNION
            SELECT t.id FROM tasks t INNER JOIN subtree s ON t.parent_id = s.id
        )
        SELECT COUNT(*) FROM subtree WHERE id = ?2",
        params![root, candidate],
        |row| row.get(0),
    )?;
    Ok(found > 0)
}

pub(crate) fn required_text(value: &str, field: &str, what: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::required(field, what).into());
    }
    Ok(trimmed.to_string())
}

fn map_insert_error(kind: &'static str, id: &str) -> impl FnOnce(rusqlite::Error) -> anyhow::Error {
    let id = id.to_string();
    move |e| {
        if is_unique_violation(&e) {
            AppError::duplicate(kind, &id).into()
        } else {
            e.into()
        }
    }
}

impl Database {
    /// Whether both legacy tables are present.
    pub fn has_legacy_tables(&self) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(table_exists_internal(conn, "projects")? && table_exists_internal(conn, "tasks")?)
        })
    }

    /// Create a project.
    pub fn insert_project(&self, input: NewProject) -> Result<ProjectRecord> {
        let name = required_text(&input.name, "name", "Project name")?;
        let id = input.id.filter(|id| !id.trim().is_empty()).unwrap_or_else(new_id);
        let created_at = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO projects (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![id, name, created_at],
            )
            .map_err(map_insert_error("Project", &id))?;
            Ok(())
        })?;

        info!(project_id = %id, name = %name, "Project created");
        Ok(ProjectRecord {
            id,
            name,
            created_at,
        })
    }

    /// All projects in creation order.
    pub fn list_projects(&self) -> Result<Vec<ProjectRecord>> {
        self.with_conn(list_projects_internal)
    }

    /// Get a project by id.
    pub fn get_project(&self, project_id: &str) -> Result<Option<ProjectRecord>> {
        self.with_conn(|conn| get_project_internal(conn, project_id))
    }

    /// Delete a project and, through the foreign keys, all of its tasks.
    pub fn delete_project(&self, project_id: &str) -> Result<()> {
        let affected = self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?)
        })?;
        if affected == 0 {
            return Err(AppError::project_not_found(project_id).into());
        }
        info!(project_id = %project_id, "Project deleted");
        Ok(())
    }

    /// Create a task under a project, optionally below a parent task.
    pub fn insert_task(&self, input: NewTask) -> Result<TaskRecord> {
        let title = required_text(&input.title, "title", "Task title")?;
        let project_id = required_text(&input.project_id, "projectId", "Project ID")?;
        let parent_id = input.parent_id.filter(|p| !p.trim().is_empty());
        let id = input.id.filter(|id| !id.trim().is_empty()).unwrap_or_else(new_id);
        let created_at = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if get_project_internal(&tx, &project_id)?.is_none() {
                return Err(AppError::project_not_found(&project_id).into());
            }

            if let Some(ref pid) = parent_id {
                let parent = get_task_internal(&tx, pid)?
                    .ok_or_else(|| AppError::task_not_found(pid).with_field("parentId"))?;
                if parent.project_id != project_id {
                    return Err(AppError::invalid(
                        "parentId",
                        format!(
                            "Parent task {} belongs to project {}, not {}",
                            pid, parent.project_id, project_id
                        ),
                    )
                    .into());
                }
            }

            let record = TaskRecord {
                id: id.clone(),
                project_id: project_id.clone(),
                parent_id: parent_id.clone(),
                title: title.clone(),
                description: input.description.unwrap_or_default(),
                status: input.status.unwrap_or_default(),
                sort_order: input.sort_order.unwrap_or(0),
                created_at: Some(created_at),
            };

            tx.execute(
                "INSERT INTO tasks (id, project_id, parent_id, title, description, status, sort_order, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.project_id,
                    record.parent_id,
                    record.title,
                    record.description,
                    record.status.as_str(),
                    record.sort_order,
                    created_at,
                ],
            )
            .map_err(map_insert_error("Task", &id))?;

            tx.commit()?;

            debug!(task_id = %record.id, project_id = %record.project_id, parent_id = ?record.parent_id, "Task created");
            Ok(record)
        })
    }

    /// Get a task by id.
    pub fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Flat tasks of one project in creation order.
    pub fn list_tasks_by_project(&self, project_id: &str) -> Result<Vec<TaskRecord>> {
        self.with_conn(|conn| list_project_tasks_internal(conn, project_id))
    }

    /// Every task in creation order.
    pub fn list_all_tasks(&self) -> Result<Vec<TaskRecord>> {
        self.with_conn(list_all_tasks_internal)
    }

    /// Apply a partial update to a task.
    ///
    /// Reparenting is checked against the project and the task's own subtree
    /// so the parent graph stays acyclic.
    pub fn update_task(&self, task_id: &str, update: TaskUpdate) -> Result<TaskRecord> {
        if update.is_empty() {
            return Err(AppError::invalid("body", "No updates provided").into());
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing =
                get_task_internal(&tx, task_id)?.ok_or_else(|| AppError::task_not_found(task_id))?;

            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<Box<dyn ToSql>> = Vec::new();

            if let Some(ref title) = update.title {
                sets.push("title = ?");
                values.push(Box::new(required_text(title, "title", "Task title")?));
            }
            if let Some(ref description) = update.description {
                sets.push("description = ?");
                values.push(Box::new(description.clone()));
            }
            if let Some(status) = update.status {
                sets.push("status = ?");
                values.push(Box::new(status.as_str()));
            }
            if let Some(sort_order) = update.sort_order {
                sets.push("sort_order = ?");
                values.push(Box::new(sort_order));
            }
            if let Some(ref parent) = update.parent_id {
                if let Some(pid) = parent {
                    let new_parent = get_task_internal(&tx, pid)?
                        .ok_or_else(|| AppError::task_not_found(pid).with_field("parentId"))?;
                    if new_parent.project_id != existing.project_id {
                        return Err(AppError::invalid(
                            "parentId",
                            "Parent task belongs to a different project",
                        )
                        .into());
                    }
                    if is_in_subtree(&tx, task_id, pid)? {
                        return Err(AppError::invalid(
                            "parentId",
                            format!("Moving {} under {} would create a cycle", task_id, pid),
                        )
                        .into());
                    }
                }
                sets.push("parent_id = ?");
                values.push(Box::new(parent.clone()));
            }

            let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
            values.push(Box::new(task_id.to_string()));
            let value_refs: Vec<&dyn ToSql> = values.iter().map(|b| b.as_ref()).collect();
            tx.execute(&sql, value_refs.as_slice())?;

            let updated =
                get_task_internal(&tx, task_id)?.ok_or_else(|| AppError::task_not_found(task_id))?;
            tx.commit()?;

            debug!(task_id = %task_id, fields = ?sets, "Task updated");
            Ok(updated)
        })
    }

    /// Delete a task and its whole subtree.
    pub fn delete_task(&self, task_id: &str) -> Result<()> {
        let affected = self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?)
        })?;
        if affected == 0 {
            return Err(AppError::task_not_found(task_id).into());
        }
        info!(task_id = %task_id, "Task deleted");
        Ok(())
    }

    /// Every project with its task trees rebuilt from the flat rows.
    pub fn projects_with_tasks(&self) -> Result<Vec<Project>> {
        self.with_conn(|conn| {
            let projects = list_projects_internal(conn)?;
            let tasks = list_all_tasks_internal(conn)?;
            Ok(tree::assemble_projects(&projects, &tasks))
        })
    }

    /// One project with its task trees.
    pub fn project_with_tasks(&self, project_id: &str) -> Result<Option<Project>> {
        self.with_conn(|conn| {
            let Some(project) = get_project_internal(conn, project_id)? else {
                return Ok(None);
            };
            let tasks = list_project_tasks_internal(conn, project_id)?;
            Ok(Some(Project {
                id: project.id,
                name: project.name,
                tasks: tree::build_hierarchy(&tasks, None),
            }))
        })
    }
}
