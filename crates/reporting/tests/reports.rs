mod support;

use annotation_core::{LabelSchema, Shape};
use reporting::{
    ReportError, ReportFilter, annotator_rows, chunks_by_annotator, prediction_rows,
};
use serde_json::json;
use support::{ASSERTION_CONFIG, fixture, ground_truth};

#[test]
fn annotator_rows_keep_only_submitted_live_ground_truth() {
    let mut fx = fixture();
    let first = fx.task(1, Vec::new());
    let second = fx.task(2, Vec::new());
    fx.add(first, ground_truth("alice", "PERSON", 0, "Jane"));
    fx.add(second, ground_truth("bob", "ORG", 14, "Acme"));

    let mut draft = ground_truth("carol", "ORG", 14, "Acme");
    draft["submitted_at"] = json!(null);
    fx.add(second, draft);
    let mut not_gold = ground_truth("dave", "ORG", 14, "Acme");
    not_gold["honeypot"] = json!(false);
    fx.add(second, not_gold);
    let mut deleted = ground_truth("erin", "ORG", 14, "Acme");
    deleted["deleted_at"] = json!("2024-05-02T00:00:00.000Z");
    fx.add(second, deleted);

    let rows = annotator_rows(&fx.tasks(), Shape::Span, &ReportFilter::default()).expect("rows");
    let seen: Vec<_> = rows
        .iter()
        .map(|row| (row.first_label(), row.task_id, row.username.as_deref()))
        .collect();
    assert_eq!(
        seen,
        vec![(Some("ORG"), 2, Some("bob")), (Some("PERSON"), 1, Some("alice"))]
    );
}

#[test]
fn identical_rows_collapse() {
    let mut fx = fixture();
    let task = fx.task(1, Vec::new());
    let mut twice = ground_truth("alice", "PERSON", 0, "Jane");
    let entry = twice["result"][0].clone();
    twice["result"] = json!([entry.clone(), entry]);
    fx.add(task, twice);

    let rows = annotator_rows(&fx.tasks(), Shape::Span, &ReportFilter::default()).expect("rows");
    assert_eq!(rows.len(), 1);
}

#[test]
fn username_task_and_assertion_filters() {
    let mut fx = fixture();
    let first = fx.task(1, Vec::new());
    let second = fx.task(2, Vec::new());
    fx.add(first, ground_truth("alice", "PERSON", 0, "Jane"));
    fx.add(first, ground_truth("alice", "ABSENT", 0, "Jane"));
    fx.add(second, ground_truth("bob", "ORG", 14, "Acme"));

    let tasks = fx.tasks();
    let by_user = ReportFilter {
        username: Some("alice".to_string()),
        ..ReportFilter::default()
    };
    assert_eq!(annotator_rows(&tasks, Shape::Span, &by_user).expect("rows").len(), 2);

    let by_task = ReportFilter {
        task_ids: Some(vec![2]),
        ..ReportFilter::default()
    };
    let rows = annotator_rows(&tasks, Shape::Span, &by_task).expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].first_label(), Some("ORG"));

    let schema = LabelSchema::parse(ASSERTION_CONFIG).expect("schema");
    let assertions = ReportFilter::default().with_assertion(&schema, true);
    let labels: Vec<_> = annotator_rows(&tasks, Shape::Span, &assertions)
        .expect("rows")
        .into_iter()
        .map(|row| row.first_label().map(str::to_string))
        .collect();
    assert_eq!(labels, vec![Some("ABSENT".to_string())]);

    let others = ReportFilter::default().with_assertion(&schema, false);
    let labels: Vec<_> = annotator_rows(&tasks, Shape::Span, &others)
        .expect("rows")
        .into_iter()
        .map(|row| row.first_label().map(str::to_string))
        .collect();
    assert_eq!(labels, vec![Some("ORG".to_string()), Some("PERSON".to_string())]);

    assert!(matches!(
        annotator_rows(&tasks, Shape::Region, &assertions),
        Err(ReportError::AssertionOnRegion)
    ));
}

#[test]
fn predictions_are_not_lifecycle_filtered() {
    let mut fx = fixture();
    fx.task(
        1,
        vec![json!({
            "created_username": "model",
            "result": [{
                "from_name": "ner", "to_name": "text", "type": "labels",
                "value": {"start": 0, "end": 4, "text": ["Jane"], "labels": ["PERSON"]}
            }]
        })],
    );
    let rows = prediction_rows(&fx.tasks(), Shape::Span);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].username.as_deref(), Some("model"));
    assert!(!rows[0].honeypot);
}

#[test]
fn chunks_collapse_across_tasks() {
    let mut fx = fixture();
    let first = fx.task(1, Vec::new());
    let second = fx.task(2, Vec::new());
    fx.add(first, ground_truth("alice", "ORG", 14, "Acme"));
    fx.add(second, ground_truth("alice", "ORG", 14, "Acme"));
    fx.add(second, ground_truth("bob", "ORG", 14, "Acme"));

    let chunks = chunks_by_annotator(&fx.tasks(), Shape::Span);
    let users: Vec<_> = chunks.iter().map(|row| row.username.as_deref()).collect();
    assert_eq!(users, vec![Some("alice"), Some("bob")]);
    assert!(chunks.iter().all(|row| row.chunk.as_deref() == Some("Acme")));
}

#[test]
fn multi_label_entries_are_judged_by_their_first_label() {
    let mut fx = fixture();
    let task = fx.task(1, Vec::new());
    let mut both = ground_truth("alice", "ABSENT", 0, "Jane");
    both["result"][0]["value"]["labels"] = json!(["ABSENT", "PERSON"]);
    fx.add(task, both);
    let mut reversed = ground_truth("bob", "PERSON", 0, "Jane");
    reversed["result"][0]["value"]["labels"] = json!(["PERSON", "ABSENT"]);
    fx.add(task, reversed);

    let tasks = fx.tasks();
    let all = annotator_rows(&tasks, Shape::Span, &ReportFilter::default()).expect("rows");
    assert_eq!(all.len(), 2);

    let schema = LabelSchema::parse(ASSERTION_CONFIG).expect("schema");
    let assertions = ReportFilter::default().with_assertion(&schema, true);
    let rows = annotator_rows(&tasks, Shape::Span, &assertions).expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].username.as_deref(), Some("alice"));
    assert_eq!(
        rows[0].label,
        Some(vec!["ABSENT".to_string(), "PERSON".to_string()])
    );

    let others = ReportFilter::default().with_assertion(&schema, false);
    let rows = annotator_rows(&tasks, Shape::Span, &others).expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].username.as_deref(), Some("bob"));
}
