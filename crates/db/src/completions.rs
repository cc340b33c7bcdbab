use annotation_core::{AggregationDelta, CompletionRecord};
use rusqlite::types::Value as SqlValue;
use rusqlite::{OptionalExtension, Transaction, TransactionBehavior, params, params_from_iter};
use serde_json::Value;

use crate::Db;
use crate::error::{DbError, Result};
use crate::helpers::{now_rfc3339, placeholders, row_to_completion};
use crate::meta::apply_delta_in;
use crate::types::{
    CompletionChange, CompletionEvent, CompletionEventKind, GroundTruthBy, ResultDetail,
    TaskCompletionSummary, UsageUpdate,
};

impl Db {
    /// The task's completion log in insertion order, soft-deleted entries included.
    pub fn completions_for_task(&self, task_pk: i64) -> Result<Vec<CompletionRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM completion WHERE task_pk = ?1 ORDER BY position ASC")?;
        let rows = stmt
            .query_map(params![task_pk], row_to_completion)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn completion(&self, task_pk: i64, completion_id: i64) -> Result<Option<CompletionRecord>> {
        self.conn
            .query_row(
                "SELECT body FROM completion WHERE task_pk = ?1 AND completion_id = ?2",
                params![task_pk, completion_id],
                row_to_completion,
            )
            .optional()
            .map_err(DbError::from)
    }

    /// Appends a completion to the task's log, assigning the next id within
    /// the task. Returns the assigned id.
    pub fn append_completion(
        &mut self,
        task_pk: i64,
        completion: &mut CompletionRecord,
        username: &str,
    ) -> Result<i64> {
        let tx = self.conn.transaction()?;
        let next_id = insert_completion(&tx, task_pk, completion)?;
        record_event(&tx, task_pk, next_id, CompletionEventKind::Create, username)?;
        tx.commit()?;
        Ok(next_id)
    }

    /// Rewrites a stored completion in place and logs the event.
    pub fn update_completion(
        &mut self,
        task_pk: i64,
        completion: &CompletionRecord,
        kind: CompletionEventKind,
        username: &str,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        let updated = write_completion(&tx, task_pk, completion)?;
        if updated == 0 {
            return Err(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
        }
        record_event(&tx, task_pk, completion.id, kind, username)?;
        tx.commit()?;
        Ok(())
    }

    /// Appends a completion and adds its labels to the project's usage in
    /// one write transaction. A completion stored already deleted counts nothing.
    pub fn append_counted_completion(
        &mut self,
        project_id: i64,
        task_pk: i64,
        completion: &mut CompletionRecord,
        username: &str,
    ) -> Result<(i64, UsageUpdate)> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let next_id = insert_completion(&tx, task_pk, completion)?;
        record_event(&tx, task_pk, next_id, CompletionEventKind::Create, username)?;
        let counted = if completion.is_deleted() {
            Vec::new()
        } else {
            vec![completion.clone()]
        };
        let usage = apply_delta_in(&tx, project_id, &AggregationDelta::Add(counted))?;
        tx.commit()?;
        Ok((next_id, usage))
    }

    /// Re-reads a live completion under the write lock and hands it to
    /// `change`, then stores the returned record, logs the event and applies
    /// the usage delta before the lock is released. Returns `None` when the
    /// completion is missing or soft-deleted. An error from `change` leaves
    /// everything untouched.
    pub fn change_completion<E, F>(
        &mut self,
        project_id: i64,
        task_pk: i64,
        completion_id: i64,
        kind: CompletionEventKind,
        username: &str,
        change: F,
    ) -> std::result::Result<Option<(CompletionRecord, Option<UsageUpdate>)>, E>
    where
        E: From<DbError>,
        F: FnOnce(CompletionRecord) -> std::result::Result<CompletionChange, E>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DbError::from)?;
        let existing = tx
            .query_row(
                r#"
                SELECT body FROM completion
                WHERE task_pk = ?1 AND completion_id = ?2 AND deleted_at IS NULL
                "#,
                params![task_pk, completion_id],
                row_to_completion,
            )
            .optional()
            .map_err(DbError::from)?;
        let Some(existing) = existing else {
            return Ok(None);
        };
        let CompletionChange { record, delta } = change(existing)?;
        if write_completion(&tx, task_pk, &record)? == 0 {
            return Err(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows).into());
        }
        record_event(&tx, task_pk, record.id, kind, username)?;
        let usage = match &delta {
            Some(delta) => Some(apply_delta_in(&tx, project_id, delta)?),
            None => None,
        };
        tx.commit().map_err(DbError::from)?;
        Ok(Some((record, usage)))
    }

    pub fn completion_events(&self, task_pk: i64) -> Result<Vec<CompletionEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT completion_id, kind, username, ts
            FROM completion_event
            WHERE task_pk = ?1
            ORDER BY id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![task_pk], |row| {
                Ok(CompletionEvent {
                    completion_id: row.get(0)?,
                    kind: row.get(1)?,
                    username: row.get(2)?,
                    ts: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Task ids of the project that hold at least one live completion.
    pub fn completion_ids(&self, project_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT t.task_id
            FROM task t
            JOIN completion c ON c.task_pk = t.id
            WHERE t.project_id = ?1 AND c.deleted_at IS NULL
            ORDER BY t.task_id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![project_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(rows)
    }

    pub fn task_completion_summary(
        &self,
        project_id: i64,
        task_ids: &[i64],
    ) -> Result<Vec<TaskCompletionSummary>> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT t.task_id,
                   (SELECT json_group_array(DISTINCT c2.created_username) FROM completion c2
                     WHERE c2.task_pk = t.id AND c2.created_username IS NOT NULL),
                   (SELECT json_group_array(DISTINCT c3.updated_by) FROM completion c3
                     WHERE c3.task_pk = t.id AND c3.updated_by IS NOT NULL),
                   MAX(c.created_ago),
                   MAX(c.updated_at)
            FROM task t
            JOIN completion c ON c.task_pk = t.id
            WHERE t.project_id = ?1 AND t.task_id IN ({})
            GROUP BY t.id
            ORDER BY t.task_id ASC
            "#,
            placeholders(1, task_ids.len())
        );
        let mut bound: Vec<SqlValue> = vec![SqlValue::Integer(project_id)];
        bound.extend(task_ids.iter().map(|id| SqlValue::Integer(*id)));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bound), |row| {
                let creators: String = row.get(1)?;
                let updaters: String = row.get(2)?;
                Ok((row.get::<_, i64>(0)?, creators, updaters, row.get(3)?, row.get(4)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut summaries = Vec::with_capacity(rows.len());
        for (task_id, creators, updaters, created_ago, updated_at) in rows {
            let mut created_usernames: Vec<String> = serde_json::from_str(&creators)?;
            let mut updated_by: Vec<String> = serde_json::from_str(&updaters)?;
            created_usernames.sort();
            updated_by.sort();
            summaries.push(TaskCompletionSummary {
                task_id,
                created_usernames,
                updated_by,
                created_ago,
                updated_at,
            });
        }
        Ok(summaries)
    }

    /// Live honeypot completions that are submitted or reviewed, optionally
    /// limited to tasks carrying any of `tags`.
    pub fn ground_truth_count(
        &self,
        project_id: i64,
        tags: &[String],
        by: GroundTruthBy,
    ) -> Result<i64> {
        let state = match by {
            GroundTruthBy::Submitted => "c.submitted_at IS NOT NULL",
            GroundTruthBy::Reviewed => "c.reviewed = 1",
        };
        let mut sql = format!(
            r#"
            SELECT COUNT(*)
            FROM completion c
            JOIN task t ON t.id = c.task_pk
            WHERE t.project_id = ?1
              AND c.honeypot = 1
              AND c.deleted_at IS NULL
              AND {}
            "#,
            state
        );
        let mut bound: Vec<SqlValue> = vec![SqlValue::Integer(project_id)];
        if !tags.is_empty() {
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM task_tag tt WHERE tt.task_pk = t.id AND tt.tag IN ({}))",
                placeholders(1, tags.len())
            ));
            bound.extend(tags.iter().map(|tag| SqlValue::Text(tag.clone())));
        }
        let count = self
            .conn
            .query_row(&sql, params_from_iter(bound), |row| row.get(0))?;
        Ok(count)
    }

    /// Completions of one task created or last updated by `username`.
    pub fn user_completions(
        &self,
        project_id: i64,
        task_id: i64,
        username: &str,
    ) -> Result<Vec<CompletionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.body
            FROM completion c
            JOIN task t ON t.id = c.task_pk
            WHERE t.project_id = ?1
              AND t.task_id = ?2
              AND (c.created_username = ?3 OR c.updated_by = ?3)
            ORDER BY c.position ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![project_id, task_id, username], row_to_completion)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every result of every live completion in the project.
    pub fn completion_result_detail(&self, project_id: i64) -> Result<Vec<ResultDetail>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT r.value ->> '$.from_name',
                   r.value ->> '$.to_name',
                   r.value ->> '$.type',
                   r.value -> '$.value'
            FROM completion c
            JOIN task t ON t.id = c.task_pk,
                 json_each(c.body, '$.result') r
            WHERE t.project_id = ?1 AND c.deleted_at IS NULL
            ORDER BY t.task_id ASC, c.position ASC, r.key ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                let value: Option<String> = row.get(3)?;
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    value,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut details = Vec::with_capacity(rows.len());
        for (from_name, to_name, result_type, value) in rows {
            let value = match value {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Value::Null,
            };
            details.push(ResultDetail {
                from_name: from_name.unwrap_or_default(),
                to_name: to_name.unwrap_or_default(),
                result_type: result_type.unwrap_or_default(),
                value,
            });
        }
        Ok(details)
    }
}

fn insert_completion(
    tx: &Transaction<'_>,
    task_pk: i64,
    completion: &mut CompletionRecord,
) -> Result<i64> {
    let (next_id, position): (i64, i64) = tx.query_row(
        r#"
        SELECT COALESCE(MAX(completion_id), 0) + 1, COUNT(*)
        FROM completion
        WHERE task_pk = ?1
        "#,
        params![task_pk],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    completion.id = next_id;
    tx.execute(
        r#"
        INSERT INTO completion (
          task_pk, completion_id, position, created_username, created_ago,
          updated_by, updated_at, submitted_at, honeypot, reviewed, deleted_at, body
        ) VALUES (
          ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12
        )
        "#,
        params![
            task_pk,
            next_id,
            position,
            completion.created_username,
            completion.created_ago,
            completion.updated_by,
            completion.updated_at,
            completion.submitted_at,
            completion.honeypot,
            completion.review_status.is_some(),
            completion.deleted_at,
            serde_json::to_string(completion)?,
        ],
    )?;
    Ok(next_id)
}

fn write_completion(
    tx: &Transaction<'_>,
    task_pk: i64,
    completion: &CompletionRecord,
) -> Result<usize> {
    let updated = tx.execute(
        r#"
        UPDATE completion
        SET created_username = ?3,
            created_ago = ?4,
            updated_by = ?5,
            updated_at = ?6,
            submitted_at = ?7,
            honeypot = ?8,
            reviewed = ?9,
            deleted_at = ?10,
            body = ?11
        WHERE task_pk = ?1 AND completion_id = ?2
        "#,
        params![
            task_pk,
            completion.id,
            completion.created_username,
            completion.created_ago,
            completion.updated_by,
            completion.updated_at,
            completion.submitted_at,
            completion.honeypot,
            completion.review_status.is_some(),
            completion.deleted_at,
            serde_json::to_string(completion)?,
        ],
    )?;
    Ok(updated)
}

fn record_event(
    tx: &Transaction<'_>,
    task_pk: i64,
    completion_id: i64,
    kind: CompletionEventKind,
    username: &str,
) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO completion_event (task_pk, completion_id, kind, username, ts)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![task_pk, completion_id, kind.as_str(), username, now_rfc3339()],
    )?;
    Ok(())
}
