mod support;

use std::sync::{Arc, Barrier};
use std::thread;

use annotation_core::{AggregationDelta, CompletionRecord, SchemaTuple, UsageCounters};
use annotation_db::{CompletionChange, CompletionEventKind, Db, DbError, MetaWrite, UsageUpdate};
use support::{NER_CONFIG, setup_db, setup_project, setup_task, span_completion};

fn counters(pairs: &[(&str, &str, u64)]) -> UsageCounters {
    pairs
        .iter()
        .map(|(field, label, count)| (field.to_string(), label.to_string(), *count))
        .collect()
}

#[test]
fn counters_are_created_lazily_and_removed_to_empty() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    let project = setup_project(db, "usage");
    assert!(db.read_meta(project.id).expect("meta").is_none());

    let completion = span_completion("alice", "PERSON");
    let added = db
        .apply_usage_delta(project.id, &AggregationDelta::Add(vec![completion.clone()]))
        .expect("add");
    assert_eq!(added, UsageUpdate::Applied(counters(&[("ner", "PERSON", 1)])));

    let removed = db
        .apply_usage_delta(project.id, &AggregationDelta::Remove(vec![completion]))
        .expect("remove");
    assert_eq!(removed, UsageUpdate::Applied(UsageCounters::new()));

    let meta = db.read_meta(project.id).expect("meta").expect("row");
    assert_eq!(meta.used_labels_info, Some(UsageCounters::new()));
    assert!(meta.schema.is_empty());
}

#[test]
fn legacy_projects_skip_aggregation() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    let legacy = db
        .create_project("legacy", NER_CONFIG, None)
        .expect("legacy project");
    assert!(!legacy.tracks_usage());

    let update = db
        .apply_usage_delta(
            legacy.id,
            &AggregationDelta::Add(vec![span_completion("alice", "ORG")]),
        )
        .expect("apply");
    assert_eq!(update, UsageUpdate::LegacySkipped);
    let tuples = vec![SchemaTuple {
        from_name: "ner".to_string(),
        to_name: "text".to_string(),
        result_type: "labels".to_string(),
    }];
    assert_eq!(
        db.replace_schema_meta(legacy.id, &tuples).expect("schema"),
        MetaWrite::LegacySkipped
    );
    assert!(db.read_meta(legacy.id).expect("meta").is_none());
}

#[test]
fn missing_project_is_an_error() {
    let mut test_db = setup_db();
    let err = test_db
        .db
        .apply_usage_delta(42, &AggregationDelta::Add(Vec::new()))
        .expect_err("missing project");
    assert!(matches!(err, DbError::ProjectNotFound(42)));
}

#[test]
fn schema_replace_keeps_counts() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    let project = setup_project(db, "schema");
    db.apply_usage_delta(
        project.id,
        &AggregationDelta::Add(vec![span_completion("alice", "ORG")]),
    )
    .expect("add");

    let tuples = vec![SchemaTuple {
        from_name: "ner".to_string(),
        to_name: "text".to_string(),
        result_type: "labels".to_string(),
    }];
    assert_eq!(
        db.replace_schema_meta(project.id, &tuples).expect("schema"),
        MetaWrite::Written
    );
    let meta = db.read_meta(project.id).expect("meta").expect("row");
    assert_eq!(meta.schema, tuples);
    assert_eq!(meta.used_labels_info, Some(counters(&[("ner", "ORG", 1)])));
}

#[test]
fn replace_moves_counts_in_one_step() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    let project = setup_project(db, "replace");
    let before = span_completion("alice", "PERSON");
    let after = span_completion("alice", "ORG");
    db.apply_usage_delta(project.id, &AggregationDelta::Add(vec![before.clone()]))
        .expect("add");
    let update = db
        .apply_usage_delta(
            project.id,
            &AggregationDelta::Replace {
                old: vec![before],
                new: vec![after],
            },
        )
        .expect("replace");
    assert_eq!(update, UsageUpdate::Applied(counters(&[("ner", "ORG", 1)])));
}

#[test]
fn concurrent_writers_do_not_lose_updates() {
    let test_db = setup_db();
    let project = setup_project(&test_db.db, "concurrent");
    let path = test_db.path.clone();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let path = path.clone();
            thread::spawn(move || {
                let mut db = Db::open(&path).expect("open");
                let label = if worker % 2 == 0 { "PERSON" } else { "ORG" };
                for _ in 0..10 {
                    db.apply_usage_delta(
                        project.id,
                        &AggregationDelta::Add(vec![span_completion("alice", label)]),
                    )
                    .expect("add");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("join");
    }

    let meta = test_db.db.read_meta(project.id).expect("meta").expect("row");
    assert_eq!(
        meta.used_labels_info,
        Some(counters(&[("ner", "ORG", 20), ("ner", "PERSON", 20)]))
    );
}

fn soft_delete(existing: CompletionRecord) -> annotation_db::Result<CompletionChange> {
    let mut deleted = existing.clone();
    deleted.deleted_at = Some("2024-05-02T09:00:00.000Z".to_string());
    Ok(CompletionChange {
        record: deleted,
        delta: Some(AggregationDelta::Remove(vec![existing])),
    })
}

#[test]
fn concurrent_deletes_of_one_completion_remove_it_once() {
    let mut test_db = setup_db();
    let project = setup_project(&test_db.db, "race");
    let task = setup_task(&mut test_db.db, project.id, 1, &[]);
    for username in ["alice", "bob"] {
        let (_, usage) = test_db
            .db
            .append_counted_completion(
                project.id,
                task.pk,
                &mut span_completion(username, "PERSON"),
                username,
            )
            .expect("append");
        assert!(matches!(usage, UsageUpdate::Applied(_)));
    }

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = test_db.path.clone();
            let barrier = Arc::clone(&barrier);
            let task_pk = task.pk;
            let project_id = project.id;
            thread::spawn(move || {
                let mut db = Db::open(&path).expect("open");
                barrier.wait();
                db.change_completion(
                    project_id,
                    task_pk,
                    1,
                    CompletionEventKind::Delete,
                    "alice",
                    soft_delete,
                )
                .expect("delete")
                .is_some()
            })
        })
        .collect();
    let applied = handles
        .into_iter()
        .map(|handle| handle.join().expect("join"))
        .filter(|applied| *applied)
        .count();
    assert_eq!(applied, 1);

    let meta = test_db.db.read_meta(project.id).expect("meta").expect("row");
    assert_eq!(meta.used_labels_info, Some(counters(&[("ner", "PERSON", 1)])));
    let deletes = test_db
        .db
        .completion_events(task.pk)
        .expect("events")
        .into_iter()
        .filter(|event| event.kind == "delete")
        .count();
    assert_eq!(deletes, 1);
}

#[test]
fn rejected_change_leaves_completion_and_counters_alone() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    let project = setup_project(db, "rejected");
    let task = setup_task(db, project.id, 1, &[]);
    db.append_counted_completion(project.id, task.pk, &mut span_completion("alice", "ORG"), "alice")
        .expect("append");

    let err = db
        .change_completion(
            project.id,
            task.pk,
            1,
            CompletionEventKind::Update,
            "alice",
            |_| -> annotation_db::Result<CompletionChange> { Err(DbError::ProjectNotFound(0)) },
        )
        .expect_err("rejected");
    assert!(matches!(err, DbError::ProjectNotFound(0)));

    let stored = db.completion(task.pk, 1).expect("load").expect("completion");
    assert!(!stored.is_deleted());
    let meta = db.read_meta(project.id).expect("meta").expect("row");
    assert_eq!(meta.used_labels_info, Some(counters(&[("ner", "ORG", 1)])));
    assert_eq!(db.completion_events(task.pk).expect("events").len(), 1);

    let missing = db
        .change_completion(project.id, task.pk, 7, CompletionEventKind::Delete, "alice", soft_delete)
        .expect("lookup");
    assert!(missing.is_none());
}
