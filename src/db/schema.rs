//! Schema introspection queries.

use super::Database;
use anyhow::Result;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

/// Information about a table column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

/// Row counts for the application tables, for status output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableCounts {
    pub projects: Option<i64>,
    pub tasks: Option<i64>,
    pub snapshots: Option<i64>,
}

pub(crate) fn table_exists_internal(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn columns_internal(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    // PRAGMA arguments cannot be bound; only known table names reach here.
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table.replace('"', "")))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                data_type: row.get(2)?,
                nullable: row.get::<_, i32>(3)? == 0,
                default_value: row.get(4)?,
                primary_key: row.get::<_, i32>(5)? > 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn count_rows(conn: &Connection, table: &str) -> Result<Option<i64>> {
    if !table_exists_internal(conn, table)? {
        return Ok(None);
    }
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;
    Ok(Some(count))
}

impl Database {
    /// Whether a table with this name exists.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        self.with_conn(|conn| table_exists_internal(conn, table))
    }

    /// Column definitions for a table (empty when the table does not exist).
    pub fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.with_conn(|conn| columns_internal(conn, table))
    }

    /// Whether `table` has a column named `column`.
    pub fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self
            .table_columns(table)?
            .iter()
            .any(|c| c.name == column))
    }

    /// Row counts of the known tables; `None` for tables that do not exist.
    pub fn table_counts(&self) -> Result<TableCounts> {
        self.with_conn(|conn| {
            Ok(TableCounts {
                projects: count_rows(conn, "projects")?,
                tasks: count_rows(conn, "tasks")?,
                snapshots: count_rows(conn, "snapshots")?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_columns_reports_types() {
        let db = Database::open_in_memory().unwrap();
        let columns = db.table_columns("snapshots").unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "created_at", "description", "data"]);
        assert!(columns[0].primary_key);
        assert!(!columns[3].nullable);
    }

    #[test]
    fn test_unknown_table_has_no_columns() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.table_columns("nope").unwrap().is_empty());
        assert!(!db.has_column("nope", "id").unwrap());
    }

    #[test]
    fn test_table_counts_on_raw_database() {
        let db = Database::open_in_memory_raw().unwrap();
        let counts = db.table_counts().unwrap();
        assert!(counts.projects.is_none());
        assert!(counts.snapshots.is_none());
    }

    #[test]
    fn test_table_counts_on_fresh_schema() {
        let db = Database::open_in_memory().unwrap();
        let counts = db.table_counts().unwrap();
        assert_eq!(counts.projects, Some(0));
        assert_eq!(counts.tasks, Some(0));
        assert_eq!(counts.snapshots, Some(0));
    }
}
