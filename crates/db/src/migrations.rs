use rusqlite::Connection;

use crate::Db;
use crate::error::Result;

pub const MIGRATION_0001: &str = include_str!("../migrations/0001_init.sql");
pub const MIGRATION_0002: &str = include_str!("../migrations/0002_add_completion_event.sql");
pub const MIGRATION_0003: &str = include_str!("../migrations/0003_add_task_tags.sql");
pub const MIGRATION_0004: &str = include_str!("../migrations/0004_add_completion_reviewed.sql");

pub const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_init", MIGRATION_0001),
    ("0002_add_completion_event", MIGRATION_0002),
    ("0003_add_task_tags", MIGRATION_0003),
    ("0004_add_completion_reviewed", MIGRATION_0004),
];

impl Db {
    /// Applies every migration in one transaction. Safe to run on each start.
    pub fn migrate(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (name, sql) in MIGRATIONS {
            if *name == "0004_add_completion_reviewed" {
                if !table_has_column(&tx, "completion", "reviewed")? {
                    tx.execute_batch(sql)?;
                    backfill_reviewed(&tx)?;
                }
                continue;
            }
            tx.execute_batch(sql)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn backfill_reviewed(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        UPDATE completion
        SET reviewed = 1
        WHERE json_type(body, '$.review_status') = 'object'
        "#,
        [],
    )?;
    Ok(())
}
