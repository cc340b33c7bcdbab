mod export;
mod flatten;
mod projections;
mod types;

pub use export::{EXPORT_TIME_FORMAT, ExportTask, export_tasks};
pub use flatten::{flatten, flatten_tasks};
pub use projections::{annotator_rows, chunks_by_annotator, prediction_rows};
pub use types::{ChunkRow, FlatRow, Position, ReportError, ReportFilter, Result, RowSource};
