#![allow(dead_code)]

use annotation_core::CompletionRecord;
use annotation_db::{Db, NewTask, TaskAnnotations, TaskQuery};
use serde_json::{Value, json};
use tempfile::TempDir;

pub const ASSERTION_CONFIG: &str = r#"<View>
  <Labels name="ner" toName="text">
    <Label value="PERSON"/>
    <Label value="ORG"/>
    <Label value="ABSENT" assertion="true"/>
  </Labels>
  <Text name="text" value="$text"/>
</View>"#;

pub struct Fixture {
    pub _dir: TempDir,
    pub db: Db,
    pub project_id: i64,
}

pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut db = Db::open(dir.path().join("reports.sqlite")).expect("open db");
    db.migrate().expect("migrate");
    let project = db
        .create_project("reports", ASSERTION_CONFIG, Some("1.0.0"))
        .expect("project");
    Fixture {
        _dir: dir,
        db,
        project_id: project.id,
    }
}

impl Fixture {
    pub fn task(&mut self, task_id: i64, predictions: Vec<Value>) -> i64 {
        let task = NewTask {
            task_id,
            data: json!({"text": "Jane works at Acme"}),
            title: String::new(),
            predictions,
            created_by: "admin".to_string(),
            tags: Vec::new(),
        };
        self.db.insert_task(self.project_id, &task).expect("task").pk
    }

    pub fn add(&mut self, task_pk: i64, completion: Value) {
        let mut record: CompletionRecord = serde_json::from_value(completion).expect("record");
        let username = record.created_username.clone().unwrap_or_default();
        self.db
            .append_completion(task_pk, &mut record, &username)
            .expect("append");
    }

    pub fn tasks(&self) -> Vec<TaskAnnotations> {
        self.db
            .task_annotations(self.project_id, &TaskQuery::default())
            .expect("tasks")
    }
}

pub fn ground_truth(username: &str, label: &str, start: i64, chunk: &str) -> Value {
    let end = start + chunk.len() as i64;
    json!({
        "created_username": username,
        "honeypot": true,
        "submitted_at": "2024-05-01T10:00:00.000Z",
        "result": [{
            "from_name": "ner", "to_name": "text", "type": "labels",
            "value": {"start": start, "end": end, "text": [chunk], "labels": [label]}
        }]
    })
}
