use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::completion::CompletionRecord;
use crate::extract::extract_label_value;

/// Per-project tally of field-name -> label-value -> count.
///
/// Sparse: a count never reaches zero in the map, and a field whose last label
/// is removed disappears with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageCounters(BTreeMap<String, BTreeMap<String, u64>>);

impl UsageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str, label: &str) -> Option<u64> {
        self.0.get(field).and_then(|labels| labels.get(label)).copied()
    }

    pub fn field(&self, field: &str) -> Option<&BTreeMap<String, u64>> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, u64)> {
        self.0.iter().flat_map(|(field, labels)| {
            labels
                .iter()
                .map(move |(label, count)| (field.as_str(), label.as_str(), *count))
        })
    }

    pub fn increment(&mut self, field: &str, label: &str, by: u64) {
        if by == 0 {
            return;
        }
        let count = self
            .0
            .entry(field.to_string())
            .or_default()
            .entry(label.to_string())
            .or_insert(0);
        *count = count.saturating_add(by);
    }

    /// Counts that would drop below one are removed; labels never seen are
    /// left alone.
    pub fn decrement(&mut self, field: &str, label: &str, by: u64) {
        let Some(labels) = self.0.get_mut(field) else {
            return;
        };
        let Some(count) = labels.get_mut(label) else {
            return;
        };
        if *count <= by {
            labels.remove(label);
        } else {
            *count -= by;
        }
        if labels.is_empty() {
            self.0.remove(field);
        }
    }

    pub fn merge(&mut self, other: &UsageCounters) {
        for (field, label, count) in other.iter() {
            self.increment(field, label, count);
        }
    }

    pub fn subtract(&mut self, other: &UsageCounters) {
        for (field, label, count) in other.iter() {
            self.decrement(field, label, count);
        }
    }
}

impl FromIterator<(String, String, u64)> for UsageCounters {
    fn from_iter<I: IntoIterator<Item = (String, String, u64)>>(iter: I) -> Self {
        let mut counters = Self::new();
        for (field, label, count) in iter {
            counters.increment(&field, &label, count);
        }
        counters
    }
}

/// Unit of work for the usage aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationDelta {
    Add(Vec<CompletionRecord>),
    Remove(Vec<CompletionRecord>),
    Replace {
        old: Vec<CompletionRecord>,
        new: Vec<CompletionRecord>,
    },
}

impl AggregationDelta {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Remove(_) => "remove",
            Self::Replace { .. } => "replace",
        }
    }
}

/// Label usage contributed by a set of completions. Entries that cannot yield
/// a label are skipped so one bad entry never drops the rest.
pub fn labels_info(completions: &[CompletionRecord]) -> UsageCounters {
    let mut info = UsageCounters::new();
    for completion in completions {
        for result in &completion.result {
            match extract_label_value(result) {
                Ok(Some(label)) => info.increment(&result.from_name, &label, 1),
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(
                        completion_id = completion.id,
                        result_id = result.id.as_deref().unwrap_or(""),
                        "skipping result: {}",
                        err
                    );
                }
            }
        }
    }
    info
}

/// Applies a delta to a counters snapshot. `Replace` removes the old
/// contribution before adding the new one, both against the same snapshot.
pub fn apply(delta: &AggregationDelta, mut counters: UsageCounters) -> UsageCounters {
    match delta {
        AggregationDelta::Add(completions) => counters.merge(&labels_info(completions)),
        AggregationDelta::Remove(completions) => counters.subtract(&labels_info(completions)),
        AggregationDelta::Replace { old, new } => {
            counters.subtract(&labels_info(old));
            counters.merge(&labels_info(new));
        }
    }
    counters
}
