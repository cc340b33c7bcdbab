mod completions;
mod error;
mod helpers;
mod meta;
pub mod migrations;
mod projects;
mod tasks;
mod types;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

pub use error::{DbError, Result};
pub use types::{
    CompletionChange, CompletionEvent, CompletionEventKind, CompletionsMeta, GroundTruthBy, MetaWrite, NewTask, Project, ResultDetail, Task,
    TaskAnnotations, TaskCompletionSummary, TaskQuery, UsageUpdate,
};

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Counter updates take the write lock up front; wait for it instead of failing.
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }
}
