use serde_json::Value;

use crate::completion::ResultEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopySource {
    Completion,
    Prediction,
}

impl CopySource {
    pub fn parse(raw: &str) -> Self {
        if raw == "completion" {
            Self::Completion
        } else {
            Self::Prediction
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceRange {
    pub min: f64,
    pub max: f64,
}

impl ConfidenceRange {
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

impl Default for ConfidenceRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// Results of an existing completion or prediction that fall inside the
/// confidence range, plus relations whose both ends survived.
pub fn copy_results(
    results: &[ResultEntry],
    range: ConfidenceRange,
    source: CopySource,
) -> Vec<ResultEntry> {
    let mut kept_ids: Vec<Option<String>> = Vec::new();
    let mut copied = Vec::new();
    for result in results {
        let has_value = result
            .value
            .as_object()
            .is_some_and(|value| !value.is_empty());
        let raw_confidence = result.value.get("confidence").filter(|value| !value.is_null());
        let confidence = raw_confidence.and_then(Value::as_f64).unwrap_or(0.0);
        if has_value && range.contains(confidence) {
            let mut entry = result.clone();
            if raw_confidence.is_none()
                && range.min == 0.0
                && let Some(value) = entry.value.as_object_mut()
            {
                let stamped = match source {
                    CopySource::Completion => 1,
                    CopySource::Prediction => 0,
                };
                value.insert("confidence".to_string(), Value::from(stamped));
            }
            kept_ids.push(result.id.clone());
            copied.push(entry);
        } else if result.direction.is_some()
            && kept_ids.contains(&result.from_id)
            && kept_ids.contains(&result.to_id)
        {
            copied.push(result.clone());
        }
    }
    copied
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn results() -> Vec<ResultEntry> {
        serde_json::from_value(json!([
            {"id": "a", "from_name": "ner", "to_name": "text", "type": "labels",
             "value": {"start": 0, "end": 3, "labels": ["ORG"], "confidence": 0.9}},
            {"id": "b", "from_name": "ner", "to_name": "text", "type": "labels",
             "value": {"start": 5, "end": 8, "labels": ["ORG"], "confidence": 0.2}},
            {"id": "c", "from_name": "ner", "to_name": "text", "type": "labels",
             "value": {"start": 9, "end": 12, "labels": ["PERSON"]}},
            {"from_id": "a", "to_id": "c", "type": "relation", "direction": "right"},
            {"from_id": "a", "to_id": "b", "type": "relation", "direction": "right"}
        ]))
        .expect("results")
    }

    #[test]
    fn keeps_results_inside_range_and_linked_relations() {
        let copied = copy_results(&results(), ConfidenceRange::default(), CopySource::Prediction);
        let ids: Vec<_> = copied.iter().map(|entry| entry.id.clone()).collect();
        assert_eq!(ids, vec![Some("a".to_string()), Some("b".to_string()), Some("c".to_string()), None, None]);
        assert_eq!(copied[2].value["confidence"], json!(0));
    }

    #[test]
    fn drops_low_confidence_and_dangling_relations() {
        let range = ConfidenceRange { min: 0.5, max: 1.0 };
        let copied = copy_results(&results(), range, CopySource::Completion);
        let ids: Vec<_> = copied.iter().map(|entry| entry.id.clone()).collect();
        assert_eq!(ids, vec![Some("a".to_string())]);
    }

    #[test]
    fn completion_copies_stamp_full_confidence() {
        let copied = copy_results(&results(), ConfidenceRange::default(), CopySource::Completion);
        assert_eq!(copied[2].value["confidence"], json!(1));
        assert_eq!(copied[0].value["confidence"], json!(0.9));
    }
}
