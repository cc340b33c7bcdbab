use annotation_core::{AggregationDelta, SchemaTuple, UsageCounters, apply};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::Db;
use crate::error::{DbError, Result};
use crate::types::{CompletionsMeta, MetaWrite, UsageUpdate};

impl Db {
    pub fn read_meta(&self, project_id: i64) -> Result<Option<CompletionsMeta>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT from_name_to_name_type, used_labels_info
                FROM completions_meta
                WHERE project_id = ?1
                "#,
                params![project_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;
        let Some((schema, used_labels_info)) = row else {
            return Ok(None);
        };
        let used_labels_info = match used_labels_info {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        Ok(Some(CompletionsMeta {
            project_id,
            schema: serde_json::from_str(&schema)?,
            used_labels_info,
        }))
    }

    /// Stores the schema tuples of a new label configuration. Counts are left
    /// as they are.
    pub fn replace_schema_meta(
        &mut self,
        project_id: i64,
        schema: &[SchemaTuple],
    ) -> Result<MetaWrite> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !tracks_usage(&tx, project_id)? {
            tracing::debug!(project_id, "legacy project, schema meta not written");
            return Ok(MetaWrite::LegacySkipped);
        }
        tx.execute(
            r#"
            INSERT INTO completions_meta (project_id, from_name_to_name_type)
            VALUES (?1, ?2)
            ON CONFLICT(project_id) DO UPDATE SET
              from_name_to_name_type = excluded.from_name_to_name_type
            "#,
            params![project_id, serde_json::to_string(schema)?],
        )?;
        tx.commit()?;
        Ok(MetaWrite::Written)
    }

    /// Read-modify-write of the project's usage counters under the database
    /// write lock, so concurrent lifecycle events on one project serialize.
    pub fn apply_usage_delta(
        &mut self,
        project_id: i64,
        delta: &AggregationDelta,
    ) -> Result<UsageUpdate> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let update = apply_delta_in(&tx, project_id, delta)?;
        tx.commit()?;
        Ok(update)
    }
}

/// Counters read-modify-write on a connection already holding the write lock.
pub(crate) fn apply_delta_in(
    conn: &Connection,
    project_id: i64,
    delta: &AggregationDelta,
) -> Result<UsageUpdate> {
    if !tracks_usage(conn, project_id)? {
        tracing::debug!(
            project_id,
            delta = delta.kind(),
            "legacy project, usage aggregation skipped"
        );
        return Ok(UsageUpdate::LegacySkipped);
    }
    let stored: Option<Option<String>> = conn
        .query_row(
            "SELECT used_labels_info FROM completions_meta WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )
        .optional()?;
    let before: UsageCounters = match stored.flatten() {
        Some(raw) => serde_json::from_str(&raw)?,
        None => UsageCounters::new(),
    };
    tracing::debug!(
        project_id,
        delta = delta.kind(),
        before = %serde_json::to_string(&before)?,
        "updating label usage"
    );
    let after = apply(delta, before);
    tracing::debug!(
        project_id,
        after = %serde_json::to_string(&after)?,
        "label usage updated"
    );
    conn.execute(
        r#"
        INSERT INTO completions_meta (project_id, used_labels_info)
        VALUES (?1, ?2)
        ON CONFLICT(project_id) DO UPDATE SET
          used_labels_info = excluded.used_labels_info
        "#,
        params![project_id, serde_json::to_string(&after)?],
    )?;
    Ok(UsageUpdate::Applied(after))
}

fn tracks_usage(conn: &Connection, project_id: i64) -> Result<bool> {
    let created_version: Option<Option<String>> = conn
        .query_row(
            "SELECT created_version FROM project WHERE id = ?1",
            params![project_id],
            |row| row.get(0),
        )
        .optional()?;
    match created_version {
        None => Err(DbError::ProjectNotFound(project_id)),
        Some(version) => Ok(version.is_some_and(|version| !version.is_empty())),
    }
}
