//! Integration tests for converting the legacy tables into a snapshot.

use tasknest::db::{Database, SnapshotStore};
use tasknest::error::{ErrorCode, error_code};
use tasknest::migration::{
    EMPTY_MIGRATION_DESCRIPTION, INITIAL_EMPTY_DESCRIPTION, MigrationError, MigrationOptions,
    MigrationOutcome, MigrationReport, MigrationSource, migrate_legacy,
};
use tasknest::types::{NewProject, NewTask, TaskStatus};

const SNAPSHOTS_DDL: &str = "CREATE TABLE snapshots (
    id TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL,
    description TEXT,
    data TEXT NOT NULL
);";

fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn run(db: &Database) -> MigrationReport {
    match migrate_legacy(db, MigrationOptions::default(), |_| Ok(true))
        .expect("migration failed")
    {
        MigrationOutcome::Completed(report) => report,
        other => panic!("unexpected outcome: {:?}", other),
    }
}

fn project(db: &Database, id: &str, name: &str) {
    db.insert_project(NewProject {
        id: Some(id.into()),
        name: name.into(),
    })
    .unwrap();
}

fn task(db: &Database, id: &str, project_id: &str, parent_id: Option<&str>, title: &str) {
    db.insert_task(NewTask {
        id: Some(id.into()),
        project_id: project_id.into(),
        parent_id: parent_id.map(str::to_string),
        title: title.into(),
        ..Default::default()
    })
    .unwrap();
}

#[test]
fn fails_without_snapshot_table() {
    let db = Database::open_in_memory_raw().unwrap();
    let err = migrate_legacy(&db, MigrationOptions::default(), |_| Ok(true)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MigrationError>(),
        Some(MigrationError::SnapshotTableMissing)
    ));
}

#[test]
fn no_legacy_tables_writes_initial_empty_state() {
    let db = Database::open_in_memory_raw().unwrap();
    db.with_conn(|conn| Ok(conn.execute_batch(SNAPSHOTS_DDL)?))
        .unwrap();

    let report = run(&db);
    assert_eq!(report.source, MigrationSource::NoLegacyTables);
    assert_eq!(report.description, INITIAL_EMPTY_DESCRIPTION);

    let latest = db.latest_snapshot().unwrap().into_record().unwrap();
    assert_eq!(latest.description.as_deref(), Some(INITIAL_EMPTY_DESCRIPTION));
    assert!(latest.data.is_empty());
}

#[test]
fn zero_projects_writes_empty_migration() {
    let db = setup_db();
    let report = run(&db);

    assert_eq!(report.source, MigrationSource::NoProjects);
    assert_eq!(report.total_tasks, 0);
    let latest = db.latest_snapshot().unwrap().into_record().unwrap();
    assert_eq!(latest.description.as_deref(), Some(EMPTY_MIGRATION_DESCRIPTION));
    assert!(latest.data.is_empty());
}

#[test]
fn legacy_data_becomes_nested_snapshot() {
    let db = setup_db();
    project(&db, "p1", "Home");
    project(&db, "p2", "Work");
    task(&db, "t1", "p1", None, "Paint fence");
    task(&db, "t2", "p1", Some("t1"), "Buy paint");
    task(&db, "t3", "p2", None, "Write report");
    db.update_task(
        "t3",
        tasknest::types::TaskUpdate {
            status: Some(TaskStatus::Done),
            ..Default::default()
        },
    )
    .unwrap();

    let report = run(&db);
    assert_eq!(report.source, MigrationSource::LegacyData);
    assert_eq!(
        report.description,
        "Migrated from legacy data - 2 project(s), 3 task(s)"
    );
    assert_eq!(report.total_tasks, 3);
    assert_eq!(report.rows_read, 3);
    assert_eq!(report.projects[0].tasks, 2);
    assert_eq!(report.projects[1].tasks, 1);

    let snapshot = report.snapshot.expect("snapshot written");
    let record = db.get_snapshot(&snapshot.id).unwrap();
    assert_eq!(record.data.len(), 2);
    assert_eq!(record.data[0].name, "Home");
    assert_eq!(record.data[0].tasks[0].subtasks[0].title, "Buy paint");
    assert_eq!(record.data[1].tasks[0].status, TaskStatus::Done);

    // Legacy rows are left in place.
    assert_eq!(db.list_all_tasks().unwrap().len(), 3);
}

#[test]
fn orphaned_tasks_are_reported_and_left_out() {
    let db = setup_db();
    project(&db, "p1", "Home");
    task(&db, "t1", "p1", None, "Kept");
    db.with_conn(|conn| {
        conn.execute_batch(
            "PRAGMA foreign_keys=OFF;
             INSERT INTO tasks (id, project_id, parent_id, title, status, created_at)
                 VALUES ('o1', 'p1', 'ghost', 'Orphan', 'Pending', 1);
             INSERT INTO tasks (id, project_id, parent_id, title, status, created_at)
                 VALUES ('o2', 'p1', 'o1', 'Under orphan', 'Pending', 2);
             PRAGMA foreign_keys=ON;",
        )?;
        Ok(())
    })
    .unwrap();

    let report = run(&db);
    assert_eq!(report.rows_read, 3);
    assert_eq!(report.total_tasks, 1);
    assert_eq!(report.orphans, vec!["o1".to_string()]);
    assert_eq!(report.skipped_tasks(), 2);

    let latest = db.latest_snapshot().unwrap().into_record().unwrap();
    assert_eq!(latest.data[0].tasks.len(), 1);
    assert_eq!(latest.data[0].tasks[0].id, "t1");
}

#[test]
fn tasks_outside_their_project_are_reported() {
    let db = setup_db();
    project(&db, "p1", "Home");
    project(&db, "p2", "Work");
    task(&db, "t1", "p1", None, "Kept");
    db.with_conn(|conn| {
        conn.execute_batch(
            "PRAGMA foreign_keys=OFF;
             INSERT INTO tasks (id, project_id, parent_id, title, status, created_at)
                 VALUES ('gone1', 'gone', NULL, 'No project', 'Pending', 1);
             INSERT INTO tasks (id, project_id, parent_id, title, status, created_at)
                 VALUES ('cross', 'p2', 't1', 'Parent in Home', 'Pending', 2);
             PRAGMA foreign_keys=ON;",
        )?;
        Ok(())
    })
    .unwrap();

    let report = run(&db);
    assert_eq!(report.rows_read, 3);
    assert_eq!(report.total_tasks, 1);
    assert!(report.orphans.is_empty());
    assert_eq!(report.misplaced, vec!["gone1".to_string(), "cross".to_string()]);
    assert_eq!(report.skipped_tasks(), report.misplaced.len());

    let latest = db.latest_snapshot().unwrap().into_record().unwrap();
    assert_eq!(latest.data[0].tasks.len(), 1);
    assert!(latest.data[1].tasks.is_empty());
}

#[test]
fn declining_confirmation_writes_nothing() {
    let db = setup_db();
    project(&db, "p1", "Home");
    db.create_snapshot("existing", None, &[]).unwrap();

    let mut asked_with = None;
    let outcome = migrate_legacy(&db, MigrationOptions::default(), |existing| {
        asked_with = Some(existing);
        Ok(false)
    })
    .unwrap();

    assert_eq!(asked_with, Some(1));
    assert!(matches!(
        outcome,
        MigrationOutcome::Cancelled {
            existing_snapshots: 1
        }
    ));
    assert_eq!(db.snapshot_count().unwrap(), 1);
}

#[test]
fn confirmation_error_aborts() {
    let db = setup_db();
    db.create_snapshot("existing", None, &[]).unwrap();

    let result = migrate_legacy(&db, MigrationOptions::default(), |_| {
        Err(anyhow::anyhow!("stdin closed"))
    });
    assert!(result.is_err());
    assert_eq!(db.snapshot_count().unwrap(), 1);
}

#[test]
fn dry_run_reports_without_writing() {
    let db = setup_db();
    project(&db, "p1", "Home");
    task(&db, "t1", "p1", None, "Paint fence");

    let outcome = migrate_legacy(&db, MigrationOptions { dry_run: true }, |_| Ok(true)).unwrap();
    let MigrationOutcome::Completed(report) = outcome else {
        panic!("dry run should complete");
    };
    assert!(report.snapshot.is_none());
    assert_eq!(report.total_tasks, 1);
    assert_eq!(db.snapshot_count().unwrap(), 0);
}

#[test]
fn tasks_table_without_newer_columns() {
    let db = Database::open_in_memory_raw().unwrap();
    db.with_conn(|conn| {
        conn.execute_batch(SNAPSHOTS_DDL)?;
        conn.execute_batch(
            "CREATE TABLE projects (id TEXT PRIMARY KEY, name TEXT NOT NULL, created_at INTEGER);
             CREATE TABLE tasks (
                 id TEXT PRIMARY KEY,
                 project_id TEXT NOT NULL,
                 parent_id TEXT,
                 title TEXT NOT NULL,
                 status TEXT NOT NULL DEFAULT 'Pending',
                 created_at INTEGER
             );
             INSERT INTO projects VALUES ('p1', 'Old', 1);
             INSERT INTO tasks VALUES ('t1', 'p1', NULL, 'Old task', 'Doing', 2);",
        )?;
        Ok(())
    })
    .unwrap();

    let report = run(&db);
    assert_eq!(report.total_tasks, 1);

    let latest = db.latest_snapshot().unwrap().into_record().unwrap();
    let task = &latest.data[0].tasks[0];
    assert_eq!(task.description, "");
    assert_eq!(task.sort_order, 0);
    assert_eq!(task.status, TaskStatus::Doing);
}

#[test]
fn text_timestamps_from_current_timestamp_columns() {
    let db = Database::open_in_memory_raw().unwrap();
    db.with_conn(|conn| {
        conn.execute_batch(SNAPSHOTS_DDL)?;
        conn.execute_batch(
            "CREATE TABLE projects (
                 id TEXT PRIMARY KEY,
                 name TEXT NOT NULL,
                 created_at DATETIME DEFAULT CURRENT_TIMESTAMP
             );
             CREATE TABLE tasks (
                 id TEXT PRIMARY KEY,
                 project_id TEXT NOT NULL,
                 parent_id TEXT,
                 title TEXT NOT NULL,
                 status TEXT NOT NULL DEFAULT 'Pending',
                 created_at DATETIME DEFAULT CURRENT_TIMESTAMP
             );
             INSERT INTO projects (id, name) VALUES ('p1', 'Dated');
             INSERT INTO tasks (id, project_id, title) VALUES ('t1', 'p1', 'Defaulted');
             INSERT INTO tasks (id, project_id, parent_id, title, created_at)
                 VALUES ('t2', 'p1', 't1', 'Explicit', '2024-01-02 03:04:05');",
        )?;
        Ok(())
    })
    .unwrap();

    let report = run(&db);
    assert_eq!(report.source, MigrationSource::LegacyData);
    assert_eq!(report.total_tasks, 2);

    let latest = db.latest_snapshot().unwrap().into_record().unwrap();
    let top = &latest.data[0].tasks[0];
    assert_eq!(top.title, "Defaulted");
    assert!(top.created_at.is_some_and(|ms| ms > 0));
    assert_eq!(top.subtasks[0].created_at, Some(1_704_164_645_000));
}

#[test]
fn initialized_database_migrates_as_empty_legacy_data() {
    // `init` applies every schema migration, legacy tables included.
    let db = setup_db();
    assert!(db.has_legacy_tables().unwrap());

    let report = run(&db);
    assert_eq!(report.source, MigrationSource::NoProjects);
    assert_ne!(report.description, INITIAL_EMPTY_DESCRIPTION);
    assert_eq!(report.description, EMPTY_MIGRATION_DESCRIPTION);
}

#[test]
fn migration_twice_after_confirm_adds_second_snapshot() {
    let db = setup_db();
    run(&db);
    run(&db);
    assert_eq!(db.snapshot_count().unwrap(), 2);

    let err = db.get_snapshot("missing").unwrap_err();
    assert_eq!(error_code(&err), Some(ErrorCode::NotFound));
}
