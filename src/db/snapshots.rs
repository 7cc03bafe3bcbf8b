//! Snapshot store: immutable, timestamped copies of the whole project tree.
//!
//! A snapshot is never updated after it is written. Each row holds the full
//! nested payload serialized as JSON, so restoring is just reading one row.

use super::{Database, now_ms};
use crate::error::{AppError, is_unique_violation};
use crate::types::{LatestSnapshot, Project, SnapshotMeta, SnapshotRecord};
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

/// Persistence interface for snapshots.
///
/// `Database` is the production implementation; the workspace controller
/// only depends on this trait.
pub trait SnapshotStore {
    /// Store a new snapshot. The creation time is assigned by the store.
    fn create_snapshot(
        &self,
        id: &str,
        description: Option<&str>,
        data: &[Project],
    ) -> Result<SnapshotMeta>;

    /// Metadata of every snapshot, most recent first.
    fn list_snapshots(&self) -> Result<Vec<SnapshotMeta>>;

    /// A full snapshot by id. Surrounding whitespace in `id` is ignored, as
    /// it is when the snapshot is created.
    fn get_snapshot(&self, id: &str) -> Result<SnapshotRecord>;

    /// The most recently created snapshot, or the empty sentinel.
    fn latest_snapshot(&self) -> Result<LatestSnapshot>;

    /// Remove a snapshot by its (trimmed) id.
    fn delete_snapshot(&self, id: &str) -> Result<()>;

    /// Number of stored snapshots.
    fn snapshot_count(&self) -> Result<i64>;
}

fn parse_snapshot_row(row: &Row) -> rusqlite::Result<(SnapshotMeta, String)> {
    Ok((
        SnapshotMeta {
            id: row.get("id")?,
            created_at: row.get("created_at")?,
            description: row.get("description")?,
        },
        row.get("data")?,
    ))
}

fn into_record(meta: SnapshotMeta, data: &str) -> Result<SnapshotRecord> {
    let projects: Vec<Project> = serde_json::from_str(data)
        .with_context(|| format!("snapshot {} has an unreadable payload", meta.id))?;
    Ok(SnapshotRecord {
        id: meta.id,
        created_at: meta.created_at,
        description: meta.description,
        data: projects,
    })
}

/// Normalize an optional description: trimmed, blank becomes `None`.
fn clean_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

/// Insert a snapshot using an existing connection.
///
/// `created_at` never goes below the newest stored timestamp, so snapshots
/// written in sequence sort in the order they were written even if the
/// wall clock steps backwards.
pub(crate) fn insert_snapshot(
    conn: &Connection,
    id: &str,
    description: Option<&str>,
    data: &[Project],
) -> Result<SnapshotMeta> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::required("id", "Snapshot id").into());
    }

    let exists: bool = conn
        .query_row("SELECT 1 FROM snapshots WHERE id = ?1", params![id], |_| {
            Ok(true)
        })
        .optional()?
        .unwrap_or(false);
    if exists {
        return Err(AppError::duplicate("Snapshot", id).into());
    }

    let newest: Option<i64> =
        conn.query_row("SELECT MAX(created_at) FROM snapshots", [], |row| row.get(0))?;
    let created_at = newest.map_or(now_ms(), |n| n.max(now_ms()));

    let description = clean_description(description);
    let payload = serde_json::to_string(data)?;

    conn.execute(
        "INSERT INTO snapshots (id, created_at, description, data) VALUES (?1, ?2, ?3, ?4)",
        params![id, created_at, description, payload],
    )
    .map_err(|e| -> anyhow::Error {
        if is_unique_violation(&e) {
            AppError::duplicate("Snapshot", id).into()
        } else {
            e.into()
        }
    })?;

    info!(
        snapshot_id = %id,
        created_at,
        projects = data.len(),
        bytes = payload.len(),
        "Snapshot created"
    );

    Ok(SnapshotMeta {
        id: id.to_string(),
        created_at,
        description,
    })
}

pub(crate) fn count_snapshots(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
    Ok(count)
}

impl SnapshotStore for Database {
    fn create_snapshot(
        &self,
        id: &str,
        description: Option<&str>,
        data: &[Project],
    ) -> Result<SnapshotMeta> {
        self.with_conn(|conn| insert_snapshot(conn, id, description, data))
    }

    fn list_snapshots(&self) -> Result<Vec<SnapshotMeta>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, created_at, description FROM snapshots
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let snapshots = stmt
                .query_map([], |row| {
                    Ok(SnapshotMeta {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                        description: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(snapshots)
        })
    }

    fn get_snapshot(&self, id: &str) -> Result<SnapshotRecord> {
        let id = id.trim();
        let found = self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, created_at, description, data FROM snapshots WHERE id = ?1",
                    params![id],
                    parse_snapshot_row,
                )
                .optional()?;
            Ok(row)
        })?;

        match found {
            Some((meta, data)) => into_record(meta, &data),
            None => Err(AppError::snapshot_not_found(id).into()),
        }
    }

    fn latest_snapshot(&self) -> Result<LatestSnapshot> {
        let found = self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, created_at, description, data FROM snapshots
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    [],
                    parse_snapshot_row,
                )
                .optional()?;
            Ok(row)
        })?;

        match found {
            Some((meta, data)) => {
                debug!(snapshot_id = %meta.id, "Loaded latest snapshot");
                Ok(LatestSnapshot::Found(into_record(meta, &data)?))
            }
            None => {
                debug!("No snapshots stored, returning empty state");
                Ok(LatestSnapshot::empty())
            }
        }
    }

    fn delete_snapshot(&self, id: &str) -> Result<()> {
        let id = id.trim();
        let affected = self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM snapshots WHERE id = ?1", params![id])?)
        })?;
        if affected == 0 {
            return Err(AppError::snapshot_not_found(id).into());
        }
        info!(snapshot_id = %id, "Snapshot deleted");
        Ok(())
    }

    fn snapshot_count(&self) -> Result<i64> {
        self.with_conn(count_snapshots)
    }
}
