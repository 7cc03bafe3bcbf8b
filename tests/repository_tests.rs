//! Integration tests for the live project/task tables and the snapshot store.
//!
//! These tests use an in-memory SQLite database unless a file is needed.

use tasknest::db::{Database, SnapshotStore};
use tasknest::error::{ErrorCode, error_code};
use tasknest::types::{NewProject, NewTask, Project, TaskStatus, TaskUpdate};

fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn new_project(db: &Database, name: &str) -> String {
    db.insert_project(NewProject {
        id: None,
        name: name.into(),
    })
    .expect("Failed to insert project")
    .id
}

fn new_task(db: &Database, project_id: &str, parent_id: Option<&str>, title: &str) -> String {
    db.insert_task(NewTask {
        project_id: project_id.into(),
        parent_id: parent_id.map(str::to_string),
        title: title.into(),
        ..Default::default()
    })
    .expect("Failed to insert task")
    .id
}

mod project_tests {
    use super::*;

    #[test]
    fn insert_trims_name_and_lists_in_order() {
        let db = setup_db();
        new_project(&db, "  Home  ");
        new_project(&db, "Work");

        let projects = db.list_projects().unwrap();
        let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Home", "Work"]);
    }

    #[test]
    fn blank_name_is_rejected() {
        let db = setup_db();
        let err = db
            .insert_project(NewProject {
                id: None,
                name: "   ".into(),
            })
            .unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::ValidationError));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let db = setup_db();
        let input = NewProject {
            id: Some("p1".into()),
            name: "Home".into(),
        };
        db.insert_project(input.clone()).unwrap();
        let err = db.insert_project(input).unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::DuplicateKey));
    }

    #[test]
    fn delete_cascades_to_tasks() {
        let db = setup_db();
        let home = new_project(&db, "Home");
        let work = new_project(&db, "Work");
        let parent = new_task(&db, &home, None, "Paint fence");
        new_task(&db, &home, Some(&parent), "Buy paint");
        new_task(&db, &work, None, "Report");

        db.delete_project(&home).unwrap();

        assert!(db.get_project(&home).unwrap().is_none());
        let remaining = db.list_all_tasks().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].project_id, work);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let db = setup_db();
        let err = db.delete_project("nope").unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::NotFound));
    }
}

mod task_tests {
    use super::*;

    #[test]
    fn insert_defaults() {
        let db = setup_db();
        let home = new_project(&db, "Home");
        let id = new_task(&db, &home, None, "Paint fence");

        let task = db.get_task(&id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.description, "");
        assert_eq!(task.sort_order, 0);
        assert!(task.parent_id.is_none());
    }

    #[test]
    fn insert_into_missing_project_is_not_found() {
        let db = setup_db();
        let err = db
            .insert_task(NewTask {
                project_id: "nope".into(),
                title: "x".into(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::NotFound));
    }

    #[test]
    fn parent_in_other_project_is_rejected() {
        let db = setup_db();
        let home = new_project(&db, "Home");
        let work = new_project(&db, "Work");
        let parent = new_task(&db, &home, None, "Parent");

        let err = db
            .insert_task(NewTask {
                project_id: work,
                parent_id: Some(parent),
                title: "Child".into(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::ValidationError));
    }

    #[test]
    fn empty_update_is_rejected() {
        let db = setup_db();
        let home = new_project(&db, "Home");
        let id = new_task(&db, &home, None, "Task");
        let err = db.update_task(&id, TaskUpdate::default()).unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::ValidationError));
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let db = setup_db();
        let home = new_project(&db, "Home");
        let id = new_task(&db, &home, None, "Task");

        let updated = db
            .update_task(
                &id,
                TaskUpdate {
                    status: Some(TaskStatus::Done),
                    description: Some("notes".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(updated.description, "notes");
        assert_eq!(updated.title, "Task");
    }

    #[test]
    fn reparent_into_own_subtree_is_rejected() {
        let db = setup_db();
        let home = new_project(&db, "Home");
        let a = new_task(&db, &home, None, "A");
        let b = new_task(&db, &home, Some(&a), "B");
        let c = new_task(&db, &home, Some(&b), "C");

        let err = db
            .update_task(
                &a,
                TaskUpdate {
                    parent_id: Some(Some(c.clone())),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::ValidationError));

        // Moving to the top level is always allowed.
        let moved = db
            .update_task(
                &c,
                TaskUpdate {
                    parent_id: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(moved.parent_id.is_none());
    }

    #[test]
    fn delete_removes_subtree_only() {
        let db = setup_db();
        let home = new_project(&db, "Home");
        let a = new_task(&db, &home, None, "A");
        let b = new_task(&db, &home, Some(&a), "B");
        new_task(&db, &home, Some(&b), "C");
        let d = new_task(&db, &home, None, "D");

        db.delete_task(&a).unwrap();

        let remaining = db.list_tasks_by_project(&home).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, d);
    }

    #[test]
    fn projects_with_tasks_nests_rows() {
        let db = setup_db();
        let home = new_project(&db, "Home");
        let a = new_task(&db, &home, None, "A");
        new_task(&db, &home, Some(&a), "B");

        let projects = db.projects_with_tasks().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].tasks[0].subtasks[0].title, "B");

        let one = db.project_with_tasks(&home).unwrap().unwrap();
        assert_eq!(one, projects[0]);
        assert!(db.project_with_tasks("nope").unwrap().is_none());
    }
}

mod snapshot_tests {
    use super::*;

    fn payload(name: &str) -> Vec<Project> {
        vec![Project {
            id: "p1".into(),
            name: name.into(),
            tasks: vec![],
        }]
    }

    #[test]
    fn latest_is_most_recent_insert() {
        let db = setup_db();
        db.create_snapshot("a", Some("first"), &payload("A")).unwrap();
        db.create_snapshot("b", Some("second"), &payload("B")).unwrap();

        let latest = db.latest_snapshot().unwrap().into_record().unwrap();
        assert_eq!(latest.id, "b");

        let listed: Vec<String> = db
            .list_snapshots()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(listed, vec!["b", "a"]);
    }

    #[test]
    fn created_at_never_goes_backwards() {
        let db = setup_db();
        let mut previous = 0;
        for i in 0..5 {
            let meta = db.create_snapshot(&format!("s{}", i), None, &[]).unwrap();
            assert!(meta.created_at >= previous);
            previous = meta.created_at;
        }
    }

    #[test]
    fn duplicate_and_empty_ids_are_rejected() {
        let db = setup_db();
        db.create_snapshot("a", None, &[]).unwrap();

        let err = db.create_snapshot("a", None, &payload("other")).unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::DuplicateKey));
        assert!(db.get_snapshot("a").unwrap().data.is_empty());

        let err = db.create_snapshot("  ", None, &[]).unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::ValidationError));
    }

    #[test]
    fn ids_are_trimmed_on_every_lookup() {
        let db = setup_db();
        let meta = db.create_snapshot(" s1 ", None, &payload("Home")).unwrap();
        assert_eq!(meta.id, "s1");

        assert_eq!(db.get_snapshot(" s1 ").unwrap().id, "s1");
        assert_eq!(db.get_snapshot("s1").unwrap().data, payload("Home"));

        db.delete_snapshot("\ts1 ").unwrap();
        let err = db.get_snapshot("s1").unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::NotFound));
    }

    #[test]
    fn snapshots_survive_reopen() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("tasknest.db");
        {
            let db = Database::open(&path).unwrap();
            db.create_snapshot("kept", Some("on disk"), &payload("Home"))
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let record = db.get_snapshot("kept").unwrap();
        assert_eq!(record.description.as_deref(), Some("on disk"));
        assert_eq!(record.data, payload("Home"));
    }
}
