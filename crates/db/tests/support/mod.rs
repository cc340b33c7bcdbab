#![allow(dead_code)]

use std::path::PathBuf;

use annotation_core::CompletionRecord;
use annotation_db::{Db, NewTask, Project, Task};
use serde_json::{Value, json};
use tempfile::TempDir;

pub const NER_CONFIG: &str = r#"<View>
  <Labels name="ner" toName="text">
    <Label value="PERSON"/>
    <Label value="ORG"/>
  </Labels>
  <Text name="text" value="$text"/>
</View>"#;

pub struct TestDb {
    pub _dir: TempDir,
    pub db: Db,
    pub path: PathBuf,
}

pub fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.sqlite");
    let mut db = Db::open(&path).expect("open db");
    db.migrate().expect("migrate db");
    TestDb {
        _dir: dir,
        db,
        path,
    }
}

pub fn setup_project(db: &Db, name: &str) -> Project {
    db.create_project(name, NER_CONFIG, Some("1.0.0"))
        .expect("create project")
}

pub fn setup_task(db: &mut Db, project_id: i64, task_id: i64, tags: &[&str]) -> Task {
    let task = NewTask {
        task_id,
        data: json!({"text": "Jane works at Acme"}),
        title: format!("task-{}", task_id),
        predictions: Vec::new(),
        created_by: "admin".to_string(),
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
    };
    db.insert_task(project_id, &task).expect("insert task")
}

pub fn span_completion(username: &str, label: &str) -> CompletionRecord {
    completion_from(json!({
        "created_username": username,
        "created_ago": "2024-05-01T10:00:00.000Z",
        "lead_time": 12,
        "result": [{
            "id": "r1",
            "from_name": "ner",
            "to_name": "text",
            "type": "labels",
            "value": {"start": 0, "end": 4, "text": "Jane", "labels": [label]}
        }]
    }))
}

pub fn completion_from(value: Value) -> CompletionRecord {
    serde_json::from_value(value).expect("completion")
}
