use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result `type` as a tagged dispatch. Label-bearing kinds know which `value`
/// key holds their labels; anything not listed here is `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultKind {
    Labels,
    Choices,
    Taxonomy,
    HyperTextLabels,
    ParagraphLabels,
    TimeSeriesLabels,
    RectangleLabels,
    PolygonLabels,
    EllipseLabels,
    KeyPointLabels,
    BrushLabels,
    TextArea,
    Rating,
    Relation,
    Pairwise,
    Unknown(String),
}

impl ResultKind {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "labels" => Self::Labels,
            "choices" => Self::Choices,
            "taxonomy" => Self::Taxonomy,
            "hypertextlabels" => Self::HyperTextLabels,
            "paragraphlabels" => Self::ParagraphLabels,
            "timeserieslabels" => Self::TimeSeriesLabels,
            "rectanglelabels" => Self::RectangleLabels,
            "polygonlabels" => Self::PolygonLabels,
            "ellipselabels" => Self::EllipseLabels,
            "keypointlabels" => Self::KeyPointLabels,
            "brushlabels" => Self::BrushLabels,
            "textarea" => Self::TextArea,
            "rating" => Self::Rating,
            "relation" => Self::Relation,
            "pairwise" => Self::Pairwise,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Labels => "labels",
            Self::Choices => "choices",
            Self::Taxonomy => "taxonomy",
            Self::HyperTextLabels => "hypertextlabels",
            Self::ParagraphLabels => "paragraphlabels",
            Self::TimeSeriesLabels => "timeserieslabels",
            Self::RectangleLabels => "rectanglelabels",
            Self::PolygonLabels => "polygonlabels",
            Self::EllipseLabels => "ellipselabels",
            Self::KeyPointLabels => "keypointlabels",
            Self::BrushLabels => "brushlabels",
            Self::TextArea => "textarea",
            Self::Rating => "rating",
            Self::Relation => "relation",
            Self::Pairwise => "pairwise",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    /// Key inside `value` that carries the label array.
    pub fn label_key(&self) -> Option<&'static str> {
        match self {
            Self::Labels => Some("labels"),
            Self::Choices => Some("choices"),
            Self::Taxonomy => Some("taxonomy"),
            Self::HyperTextLabels => Some("hypertextlabels"),
            Self::ParagraphLabels => Some("paragraphlabels"),
            Self::TimeSeriesLabels => Some("timeserieslabels"),
            Self::RectangleLabels => Some("rectanglelabels"),
            Self::PolygonLabels => Some("polygonlabels"),
            Self::EllipseLabels => Some("ellipselabels"),
            Self::KeyPointLabels => Some("keypointlabels"),
            Self::BrushLabels => Some("brushlabels"),
            Self::TextArea => Some("text"),
            Self::Rating => Some("rating"),
            Self::Relation | Self::Pairwise | Self::Unknown(_) => None,
        }
    }

    /// Relation-style entries link other entries and carry no field of their own.
    pub fn is_link(&self) -> bool {
        matches!(self, Self::Relation | Self::Pairwise)
    }

    pub fn counts_toward_usage(&self) -> bool {
        !matches!(self, Self::Relation | Self::Rating | Self::Pairwise)
    }

    pub fn is_region(&self) -> bool {
        matches!(
            self,
            Self::RectangleLabels
                | Self::PolygonLabels
                | Self::EllipseLabels
                | Self::KeyPointLabels
                | Self::BrushLabels
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub to_name: String,
    #[serde(rename = "type")]
    pub result_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultEntry {
    pub fn kind(&self) -> ResultKind {
        ResultKind::parse(&self.result_type)
    }

    pub fn page_number(&self) -> Option<i64> {
        self.extra.get("pageNumber").and_then(Value::as_i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStatus {
    pub approved: bool,
    #[serde(default)]
    pub reviewer: String,
    #[serde(default)]
    pub reviewed_at: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One annotation stored inside a task's completion log. Keys the model does
/// not know about are kept in `extra` so records round-trip unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_ago: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_status: Option<ReviewStatus>,
    #[serde(default)]
    pub honeypot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    #[serde(default)]
    pub result: Vec<ResultEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompletionRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted_at.as_deref().is_some_and(|value| !value.is_empty())
    }

    pub fn is_created_by(&self, username: &str) -> bool {
        self.created_username.as_deref() == Some(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_parse_is_case_insensitive() {
        assert_eq!(ResultKind::parse("RectangleLabels"), ResultKind::RectangleLabels);
        assert_eq!(ResultKind::parse("TextArea"), ResultKind::TextArea);
        assert_eq!(
            ResultKind::parse("videorectangle"),
            ResultKind::Unknown("videorectangle".to_string())
        );
    }

    #[test]
    fn completion_round_trips_unknown_keys() {
        let raw = json!({
            "id": 3,
            "created_username": "alice",
            "lead_time": 12,
            "honeypot": true,
            "result": [{
                "id": "r1",
                "from_name": "ner",
                "to_name": "text",
                "type": "labels",
                "value": {"start": 0, "end": 4, "labels": ["PERSON"]},
                "pageNumber": 2
            }]
        });
        let record: CompletionRecord = serde_json::from_value(raw.clone()).expect("record");
        assert_eq!(record.result[0].page_number(), Some(2));
        assert_eq!(record.extra.get("lead_time"), Some(&json!(12)));
        let back = serde_json::to_value(&record).expect("serialize");
        assert_eq!(back, raw);
    }

    #[test]
    fn relation_entries_deserialize_without_names() {
        let raw = json!({"from_id": "a", "to_id": "b", "type": "relation", "direction": "right"});
        let entry: ResultEntry = serde_json::from_value(raw).expect("entry");
        assert!(entry.kind().is_link());
        assert!(entry.from_name.is_empty());
        assert_eq!(entry.direction.as_deref(), Some("right"));
    }
}
