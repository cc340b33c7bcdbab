use std::collections::{BTreeMap, BTreeSet, HashSet};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};

use crate::completion::ResultKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaParseError {
    #[error("invalid label config: {0}")]
    Markup(String),
    #[error("<{0}> has toName but no name")]
    MissingName(String),
    #[error("duplicate field name '{0}' in label config")]
    DuplicateName(String),
}

/// Annotation shape of a project: text offsets or pixel regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Span,
    Region,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelField {
    pub to_names: Vec<String>,
    pub result_type: String,
    pub labels: BTreeSet<String>,
    /// Labels marked `assertion="true"`; only tracked for `Labels` fields.
    pub assertions: BTreeSet<String>,
}

impl LabelField {
    pub fn primary_target(&self) -> &str {
        self.to_names.first().map(String::as_str).unwrap_or_default()
    }
}

/// `(from_name, to_name, type)` as stored in the project's completions meta.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaTuple {
    pub from_name: String,
    pub to_name: String,
    #[serde(rename = "type")]
    pub result_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSchema {
    fields: BTreeMap<String, LabelField>,
}

impl LabelSchema {
    pub fn parse(config: &str) -> Result<Self, SchemaParseError> {
        let mut reader = Reader::from_str(config);
        reader.config_mut().trim_text(true);
        let mut fields: BTreeMap<String, LabelField> = BTreeMap::new();
        // One entry per open element: the control field it opened, if any.
        let mut open: Vec<Option<String>> = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(element)) => {
                    let control = visit_element(&element, &open, &mut fields)?;
                    open.push(control);
                }
                Ok(Event::Empty(element)) => {
                    visit_element(&element, &open, &mut fields)?;
                }
                Ok(Event::End(_)) => {
                    open.pop();
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => return Err(SchemaParseError::Markup(err.to_string())),
            }
        }
        if !open.is_empty() {
            return Err(SchemaParseError::Markup("unclosed element".to_string()));
        }
        Ok(Self { fields })
    }

    pub fn field(&self, name: &str) -> Option<&LabelField> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &LabelField)> {
        self.fields.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn schema_tuples(&self) -> Vec<SchemaTuple> {
        self.fields
            .iter()
            .map(|(name, field)| SchemaTuple {
                from_name: name.clone(),
                to_name: field.primary_target().to_string(),
                result_type: field.result_type.clone(),
            })
            .collect()
    }

    pub(crate) fn tuple_set(&self) -> HashSet<(&str, &str, &str)> {
        self.fields
            .iter()
            .map(|(name, field)| {
                (
                    name.as_str(),
                    field.primary_target(),
                    field.result_type.as_str(),
                )
            })
            .collect()
    }

    /// Labels of `Labels` fields whose assertion flag matches `is_assertion`.
    pub fn assertion_labels(&self, is_assertion: bool) -> BTreeSet<String> {
        self.fields
            .values()
            .filter(|field| field.result_type == "labels")
            .flat_map(|field| {
                field
                    .labels
                    .iter()
                    .filter(move |label| field.assertions.contains(*label) == is_assertion)
                    .cloned()
            })
            .collect()
    }

    pub fn shape(&self) -> Shape {
        let region = self
            .fields
            .values()
            .any(|field| ResultKind::parse(&field.result_type).is_region());
        if region { Shape::Region } else { Shape::Span }
    }
}

fn visit_element(
    element: &BytesStart<'_>,
    open: &[Option<String>],
    fields: &mut BTreeMap<String, LabelField>,
) -> Result<Option<String>, SchemaParseError> {
    let tag = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut name = None;
    let mut to_name = None;
    let mut value = None;
    let mut assertion = None;
    for attr in element.attributes() {
        let attr = attr.map_err(|err| SchemaParseError::Markup(err.to_string()))?;
        let text = attr
            .unescape_value()
            .map_err(|err| SchemaParseError::Markup(err.to_string()))?
            .into_owned();
        match attr.key.as_ref() {
            b"name" => name = Some(text),
            b"toName" => to_name = Some(text),
            b"value" => value = Some(text),
            b"assertion" => assertion = Some(text),
            _ => {}
        }
    }

    if let Some(to_name) = to_name {
        let Some(name) = name else {
            return Err(SchemaParseError::MissingName(tag));
        };
        if fields.contains_key(&name) {
            return Err(SchemaParseError::DuplicateName(name));
        }
        let to_names = to_name
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect();
        fields.insert(
            name.clone(),
            LabelField {
                to_names,
                result_type: tag.to_lowercase(),
                ..LabelField::default()
            },
        );
        return Ok(Some(name));
    }

    if let Some(value) = value
        && let Some(owner) = open.iter().rev().flatten().next()
        && let Some(field) = fields.get_mut(owner)
    {
        if field.result_type == "labels" && assertion.as_deref() == Some("true") {
            field.assertions.insert(value.clone());
        }
        field.labels.insert(value);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NER_CONFIG: &str = r#"
<View>
  <Labels name="ner" toName="text">
    <Label value="PERSON" assertion="true"/>
    <Label value="ORG"/>
  </Labels>
  <Choices name="sentiment" toName="text">
    <Choice value="Positive"/>
    <Choice value="Negative"/>
  </Choices>
  <TextArea name="note" toName="text"/>
  <Text name="text" value="$text"/>
</View>
"#;

    #[test]
    fn parse_collects_fields_and_values() {
        let schema = LabelSchema::parse(NER_CONFIG).expect("schema");
        let ner = schema.field("ner").expect("ner");
        assert_eq!(ner.result_type, "labels");
        assert_eq!(ner.primary_target(), "text");
        assert!(ner.labels.contains("PERSON"));
        assert!(ner.labels.contains("ORG"));
        let note = schema.field("note").expect("note");
        assert_eq!(note.result_type, "textarea");
        assert!(note.labels.is_empty());
        assert!(schema.field("text").is_none());
        assert_eq!(schema.shape(), Shape::Span);
    }

    #[test]
    fn assertion_labels_split_on_flag() {
        let schema = LabelSchema::parse(NER_CONFIG).expect("schema");
        assert_eq!(
            schema.assertion_labels(true).into_iter().collect::<Vec<_>>(),
            vec!["PERSON".to_string()]
        );
        assert_eq!(
            schema.assertion_labels(false).into_iter().collect::<Vec<_>>(),
            vec!["ORG".to_string()]
        );
    }

    #[test]
    fn schema_tuples_use_first_target() {
        let schema = LabelSchema::parse(
            r#"<View><Pairwise name="cmp" toName="left, right"/></View>"#,
        )
        .expect("schema");
        assert_eq!(
            schema.schema_tuples(),
            vec![SchemaTuple {
                from_name: "cmp".to_string(),
                to_name: "left".to_string(),
                result_type: "pairwise".to_string(),
            }]
        );
    }

    #[test]
    fn region_controls_select_region_shape() {
        let schema = LabelSchema::parse(
            r#"<View><Image name="image" value="$image"/><RectangleLabels name="box" toName="image"><Label value="Header"/></RectangleLabels></View>"#,
        )
        .expect("schema");
        assert_eq!(schema.shape(), Shape::Region);
    }

    #[test]
    fn missing_name_is_rejected() {
        let err = LabelSchema::parse(r#"<View><Labels toName="text"/></View>"#).unwrap_err();
        assert_eq!(err, SchemaParseError::MissingName("Labels".to_string()));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = LabelSchema::parse(
            r#"<View><Labels name="a" toName="t"/><Choices name="a" toName="t"/></View>"#,
        )
        .unwrap_err();
        assert_eq!(err, SchemaParseError::DuplicateName("a".to_string()));
    }

    #[test]
    fn broken_markup_is_rejected() {
        assert!(matches!(
            LabelSchema::parse("<View><Labels name=\"a\" toName=\"t\"></View>"),
            Err(SchemaParseError::Markup(_))
        ));
    }

    #[test]
    fn blank_config_parses_to_empty_schema() {
        assert_eq!(LabelSchema::parse("   "), Ok(LabelSchema::default()));
        let schema = LabelSchema::parse("").expect("empty");
        assert_eq!(schema.fields().count(), 0);
        assert!(schema.schema_tuples().is_empty());
        assert_eq!(schema.shape(), Shape::Span);
    }
}
