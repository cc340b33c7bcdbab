use annotation_core::{
    AggregationDelta, CompletionRecord, ConfidenceRange, CopySource, LabelSchema, ResultEntry,
    ReviewStatus, Shape, copy_results, validate_completion,
};
use annotation_db::{CompletionChange, CompletionEventKind, Db, ResultDetail, Task};
use serde_json::{Map, Value};

use crate::config::PatchParams;
use crate::error::{AppError, Result};
use crate::services::usage::log_usage;
use crate::services::{SharedConfig, open_db, project_schema, require_project, require_task};
use crate::util::time::{normalize_rfc3339_to_utc, now_rfc3339};

/// Editor-only keys that are never stored.
const TRANSIENT_KEYS: [&str; 2] = ["state", "confidence_range"];

#[derive(Clone)]
pub struct CompletionsService {
    config: SharedConfig,
}

impl CompletionsService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    /// Saves a new draft completion and counts its labels.
    pub fn create(
        &self,
        project_name: &str,
        task_id: i64,
        body: Value,
        username: &str,
    ) -> Result<i64> {
        let mut db = self.db()?;
        let project = require_project(&db, project_name)?;
        let task = require_task(&db, &project, task_id)?;
        let schema = project_schema(&project)?;
        validate_completion(&body, &schema)?;

        let mut body = into_object(body)?;
        body.insert("created_username".to_string(), Value::from(username));
        body.insert("created_ago".to_string(), Value::from(now_rfc3339()));
        let range = confidence_range(body.get("confidence_range"))?;
        if body.get("copy").and_then(Value::as_bool) == Some(true) {
            copy_from_source(&db, &task, &mut body, range)?;
        }
        body.remove("copy");
        for key in TRANSIENT_KEYS {
            body.remove(key);
        }

        let mut record: CompletionRecord = serde_json::from_value(Value::Object(body))?;
        let (id, usage) = db.append_counted_completion(project.id, task.pk, &mut record, username)?;
        log_usage(&project, &usage);
        tracing::info!(project = %project.name, task_id, completion_id = id, "completion saved");
        Ok(id)
    }

    /// Saves an already submitted completion without validation.
    pub fn submit_direct(
        &self,
        project_name: &str,
        task_id: i64,
        body: Value,
        username: &str,
    ) -> Result<i64> {
        let mut db = self.db()?;
        let project = require_project(&db, project_name)?;
        let task = require_task(&db, &project, task_id)?;
        let schema = project_schema(&project)?;
        if is_multi_page(&schema, &task) {
            return Err(AppError::InvalidInput(
                "Direct submit is not supported for multi-page documents in region projects"
                    .to_string(),
            ));
        }

        let mut body = into_object(body)?;
        if !has_text(body.get("created_username")) {
            body.insert("created_username".to_string(), Value::from(username));
        }
        if !has_text(body.get("created_ago")) {
            body.insert("created_ago".to_string(), Value::from(now_rfc3339()));
        }
        body.remove("state");

        let mut record: CompletionRecord = serde_json::from_value(Value::Object(body))?;
        let (id, usage) = db.append_counted_completion(project.id, task.pk, &mut record, username)?;
        log_usage(&project, &usage);
        tracing::info!(project = %project.name, task_id, completion_id = id, "completion submitted");
        Ok(id)
    }

    /// Merges `body` into a live completion and moves its label counts
    /// from the stored record to the merged one.
    pub fn patch(
        &self,
        project_name: &str,
        task_id: i64,
        completion_id: i64,
        body: Value,
        username: &str,
        params: &PatchParams,
    ) -> Result<CompletionRecord> {
        let mut db = self.db()?;
        let project = require_project(&db, project_name)?;
        let task = require_task(&db, &project, task_id)?;
        let schema = project_schema(&project)?;
        let page = is_multi_page(&schema, &task).then_some(params.current_page);
        let (merged, usage) = db
            .change_completion(
                project.id,
                task.pk,
                completion_id,
                CompletionEventKind::Update,
                username,
                |existing| -> Result<CompletionChange> {
                    validate_completion(&body, &schema)?;
                    patched(existing, body, username, page)
                },
            )?
            .ok_or_else(completion_not_found)?;
        if let Some(usage) = &usage {
            log_usage(&project, usage);
        }
        tracing::info!(project = %project.name, task_id, completion_id, "completion updated");
        Ok(merged)
    }

    /// Soft-deletes a draft and removes its label counts.
    pub fn delete(
        &self,
        project_name: &str,
        task_id: i64,
        completion_id: i64,
        username: &str,
    ) -> Result<()> {
        let mut db = self.db()?;
        let project = require_project(&db, project_name)?;
        let task = require_task(&db, &project, task_id)?;
        let allow_delete = self.config.allow_delete_completions;
        let (_, usage) = db
            .change_completion(
                project.id,
                task.pk,
                completion_id,
                CompletionEventKind::Delete,
                username,
                |existing| -> Result<CompletionChange> {
                    if !existing.is_created_by(username) {
                        return Err(AppError::InvalidInput(format!(
                            "user '{}' is not allowed to delete the completion.",
                            username
                        )));
                    }
                    if existing.is_submitted() {
                        return Err(AppError::Conflict(
                            "Completion is already submitted. Cannot delete submitted completion!"
                                .to_string(),
                        ));
                    }
                    if !allow_delete {
                        return Err(AppError::Forbidden(
                            "Completion removing is not allowed in server config".to_string(),
                        ));
                    }
                    let mut deleted = existing.clone();
                    deleted.deleted_at = Some(now_rfc3339());
                    Ok(CompletionChange {
                        record: deleted,
                        delta: Some(AggregationDelta::Remove(vec![existing])),
                    })
                },
            )?
            .ok_or_else(completion_not_found)?;
        if let Some(usage) = &usage {
            log_usage(&project, usage);
        }
        tracing::info!(project = %project.name, task_id, completion_id, "completion deleted");
        Ok(())
    }

    /// Records a review on a submitted completion. Label counts do not change.
    pub fn review(
        &self,
        project_name: &str,
        task_id: i64,
        completion_id: i64,
        body: Value,
        username: &str,
    ) -> Result<CompletionRecord> {
        let mut body = into_object(body)?;
        let Some(Value::Object(mut status)) = body.remove("review_status") else {
            return Err(invalid_review());
        };
        if !status.get("approved").is_some_and(Value::is_boolean) {
            return Err(invalid_review());
        }
        match status.get("reviewed_at").and_then(Value::as_str) {
            Some(reviewed_at) if !reviewed_at.is_empty() => {
                let normalized = normalize_rfc3339_to_utc(reviewed_at)?;
                status.insert("reviewed_at".to_string(), Value::from(normalized));
            }
            _ => {
                status.insert("reviewed_at".to_string(), Value::from(now_rfc3339()));
            }
        }
        if !has_text(status.get("reviewer")) {
            status.insert("reviewer".to_string(), Value::from(username));
        }
        let review: ReviewStatus = serde_json::from_value(Value::Object(status))?;

        let mut db = self.db()?;
        let project = require_project(&db, project_name)?;
        let task = require_task(&db, &project, task_id)?;
        let approved = review.approved;
        let (reviewed, _) = db
            .change_completion(
                project.id,
                task.pk,
                completion_id,
                CompletionEventKind::Review,
                username,
                |existing| -> Result<CompletionChange> {
                    if !existing.is_submitted() {
                        return Err(AppError::Conflict(
                            "Cannot review unsubmitted completions!".to_string(),
                        ));
                    }
                    if let Some(previous) = &existing.review_status {
                        return Err(AppError::Conflict(format!(
                            "Completion is already reviewed by user '{}'",
                            previous.reviewer
                        )));
                    }
                    let mut patch = body;
                    patch.remove("id");
                    patch.insert("review_status".to_string(), serde_json::to_value(&review)?);
                    if !approved {
                        patch.insert("honeypot".to_string(), Value::Bool(false));
                    }
                    Ok(CompletionChange {
                        record: merge(&existing, patch)?,
                        delta: None,
                    })
                },
            )?
            .ok_or_else(completion_not_found)?;
        tracing::info!(project = %project.name, task_id, completion_id, approved, "completion reviewed");
        Ok(reviewed)
    }

    pub fn get(&self, project_name: &str, task_id: i64, completion_id: i64) -> Result<CompletionRecord> {
        let db = self.db()?;
        let project = require_project(&db, project_name)?;
        let task = require_task(&db, &project, task_id)?;
        require_completion(&db, &task, completion_id)
    }

    pub fn list(&self, project_name: &str, task_id: i64) -> Result<Vec<CompletionRecord>> {
        let db = self.db()?;
        let project = require_project(&db, project_name)?;
        let task = require_task(&db, &project, task_id)?;
        Ok(db.completions_for_task(task.pk)?)
    }

    /// Completions of a task the user created or last edited.
    pub fn user_completions(
        &self,
        project_name: &str,
        task_id: i64,
        username: &str,
    ) -> Result<Vec<CompletionRecord>> {
        let db = self.db()?;
        let project = require_project(&db, project_name)?;
        Ok(db.user_completions(project.id, task_id, username)?)
    }

    pub fn result_detail(&self, project_name: &str) -> Result<Vec<ResultDetail>> {
        let db = self.db()?;
        let project = require_project(&db, project_name)?;
        Ok(db.completion_result_detail(project.id)?)
    }
}

fn require_completion(db: &Db, task: &Task, completion_id: i64) -> Result<CompletionRecord> {
    db.completion(task.pk, completion_id)?
        .ok_or_else(completion_not_found)
}

fn completion_not_found() -> AppError {
    AppError::NotFound("Completion not found".to_string())
}

/// The record a patch leaves behind and the usage delta it implies. `page`
/// is set for multi-page region tasks, where results of other pages are kept.
fn patched(
    existing: CompletionRecord,
    body: Value,
    username: &str,
    page: Option<i64>,
) -> Result<CompletionChange> {
    if !existing.is_created_by(username) {
        return Err(AppError::InvalidInput(format!(
            "user '{}' is not allowed to update the completion.",
            username
        )));
    }
    let mut patch = into_object(body)?;
    let honeypot_only = patch.len() == 1 && patch.contains_key("honeypot");
    if existing.is_submitted() && !honeypot_only {
        return Err(AppError::Conflict(
            "Completion is already submitted. Cannot update submitted completion!".to_string(),
        ));
    }

    if let Some(page) = page {
        let other_pages = existing
            .result
            .iter()
            .filter(|result| result.page_number() != Some(page))
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut results = match patch.remove("result") {
            Some(Value::Array(results)) => results,
            _ => Vec::new(),
        };
        if !results.is_empty() || !other_pages.is_empty() {
            results.extend(other_pages);
            patch.insert("result".to_string(), Value::Array(results));
        }
    }

    patch.remove("state");
    patch.insert("id".to_string(), Value::from(existing.id));
    if !existing.is_submitted() {
        patch.insert("updated_at".to_string(), Value::from(now_rfc3339()));
        patch.insert("updated_by".to_string(), Value::from(username));
    }
    let merged = merge(&existing, patch)?;
    let delta = if existing.result.is_empty() {
        AggregationDelta::Add(vec![merged.clone()])
    } else {
        AggregationDelta::Replace {
            old: vec![existing],
            new: vec![merged.clone()],
        }
    };
    Ok(CompletionChange {
        record: merged,
        delta: Some(delta),
    })
}

fn into_object(body: Value) -> Result<Map<String, Value>> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::InvalidInput(
            "completion body must be a JSON object".to_string(),
        )),
    }
}

fn invalid_review() -> AppError {
    AppError::InvalidInput("Invalid review data".to_string())
}

fn has_text(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|text| !text.is_empty())
}

/// Region projects whose task holds several page images.
fn is_multi_page(schema: &LabelSchema, task: &Task) -> bool {
    schema.shape() == Shape::Region && task.data.get("image").is_some_and(Value::is_array)
}

fn confidence_range(raw: Option<&Value>) -> Result<ConfidenceRange> {
    let Some(raw) = raw.filter(|value| !value.is_null()) else {
        return Ok(ConfidenceRange::default());
    };
    let bounds = raw
        .as_array()
        .filter(|bounds| bounds.len() == 2)
        .and_then(|bounds| Some((bounds[0].as_f64()?, bounds[1].as_f64()?)));
    match bounds {
        Some((min, max)) if min <= max => Ok(ConfidenceRange { min, max }),
        _ => Err(AppError::InvalidInput(
            "confidence_range must be [min, max]".to_string(),
        )),
    }
}

/// Replaces the body's result with the filtered result of the referenced
/// completion or prediction. An unknown reference leaves the body as is.
fn copy_from_source(
    db: &Db,
    task: &Task,
    body: &mut Map<String, Value>,
    range: ConfidenceRange,
) -> Result<()> {
    let source = CopySource::parse(body.get("data_type").and_then(Value::as_str).unwrap_or(""));
    let cid = match body.get("cid") {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::InvalidInput("copy requires a numeric cid".to_string()))?;

    let results: Option<Vec<ResultEntry>> = match source {
        CopySource::Completion => db
            .completions_for_task(task.pk)?
            .into_iter()
            .find(|completion| completion.id == cid)
            .map(|completion| completion.result),
        CopySource::Prediction => task
            .predictions
            .iter()
            .find(|prediction| prediction.get("id").and_then(Value::as_i64) == Some(cid))
            .map(|prediction| {
                serde_json::from_value(prediction.get("result").cloned().unwrap_or(Value::Array(Vec::new())))
            })
            .transpose()?,
    };
    let Some(results) = results else {
        tracing::debug!(task_id = task.task_id, cid, "copy source not found");
        return Ok(());
    };
    let copied = copy_results(&results, range, source);
    body.insert("result".to_string(), serde_json::to_value(copied)?);
    Ok(())
}

/// Top-level keys of `patch` overwrite the stored record.
fn merge(existing: &CompletionRecord, patch: Map<String, Value>) -> Result<CompletionRecord> {
    let Value::Object(mut merged) = serde_json::to_value(existing)? else {
        return Err(AppError::Message("completion did not serialize to an object".to_string()));
    };
    for (key, value) in patch {
        merged.insert(key, value);
    }
    Ok(serde_json::from_value(Value::Object(merged))?)
}
