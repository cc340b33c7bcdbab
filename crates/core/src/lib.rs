mod completion;
mod copy;
mod extract;
mod schema;
mod usage;
mod validate;

pub use completion::{CompletionRecord, ResultEntry, ResultKind, ReviewStatus};
pub use copy::{ConfidenceRange, CopySource, copy_results};
pub use extract::{MalformedResultError, TEXTAREA_LABEL, extract_label_value, label_text};
pub use schema::{LabelField, LabelSchema, SchemaParseError, SchemaTuple, Shape};
pub use usage::{AggregationDelta, UsageCounters, apply, labels_info};
pub use validate::{ValidationError, validate, validate_completion};
