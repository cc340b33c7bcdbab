#![allow(dead_code)]

use annotation_app::{AppConfig, AppState, TaskImport};
use serde_json::{Value, json};
use tempfile::TempDir;

pub const NER_CONFIG: &str = r#"<View>
  <Labels name="ner" toName="text">
    <Label value="PERSON"/>
    <Label value="ORG"/>
  </Labels>
  <Text name="text" value="$text"/>
</View>"#;

pub const REGION_CONFIG: &str = r#"<View>
  <Image name="image" value="$image"/>
  <RectangleLabels name="box" toName="image">
    <Label value="Logo"/>
    <Label value="Signature"/>
  </RectangleLabels>
</View>"#;

pub struct TestApp {
    pub _dir: TempDir,
    pub state: AppState,
}

pub fn setup_app(allow_delete_completions: bool) -> TestApp {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = AppConfig {
        db_path: dir.path().join("app.sqlite"),
        allow_delete_completions,
        app_version: "2.1.0".to_string(),
    };
    let state = AppState::new(config);
    state.initialize().expect("initialize");
    TestApp { _dir: dir, state }
}

impl TestApp {
    pub fn project(&self, name: &str, config: &str, legacy: bool) {
        self.state
            .services
            .projects
            .create(name, config, legacy)
            .expect("project");
    }

    pub fn tasks(&self, project: &str, tasks: Vec<Value>) {
        let tasks: Vec<TaskImport> = serde_json::from_value(Value::Array(tasks)).expect("tasks");
        self.state
            .services
            .tasks
            .import(project, tasks, "admin")
            .expect("import");
    }

    pub fn usage(&self, project: &str) -> Value {
        let counters = self
            .state
            .services
            .usage
            .labels_info(project)
            .expect("usage");
        serde_json::to_value(counters).expect("json")
    }
}

pub fn ner_body(label: &str) -> Value {
    json!({
        "lead_time": 7,
        "result": [{
            "id": "r1",
            "from_name": "ner",
            "to_name": "text",
            "type": "labels",
            "value": {"start": 0, "end": 4, "text": ["Jane"], "labels": [label]}
        }]
    })
}

pub fn box_result(id: &str, label: &str, page: i64) -> Value {
    json!({
        "id": id,
        "from_name": "box",
        "to_name": "image",
        "type": "rectanglelabels",
        "pageNumber": page,
        "value": {"x": 1, "y": 2, "width": 3, "height": 4, "rectanglelabels": [label]}
    })
}
