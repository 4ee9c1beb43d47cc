use serde::{Deserialize, Serialize};

use crate::filter::FetchType;
use crate::job_record::RecordProjection;

/// Group key used when a record has no value on the grouping axis.
pub const UNKNOWN_GROUP: &str = "Unknown";

/// One group of a `stats` or `compare` aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateEntry {
    pub key: String,
    pub count: u64,
}

/// Output of one fetch. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchResult {
    pub fetch_type: FetchType,
    /// Grouping or comparison axis for `stats` / `compare`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<String>,
    /// Capped, ordered projections. Only populated for `list`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<RecordProjection>,
    /// Ordered group counts. Only populated for `stats` / `compare`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregate: Vec<AggregateEntry>,
    /// Match count before any cap.
    pub total_count: u64,
}

impl FetchResult {
    pub fn count(total_count: u64) -> Self {
        Self {
            fetch_type: FetchType::Count,
            axis: None,
            records: Vec::new(),
            aggregate: Vec::new(),
            total_count,
        }
    }

    pub fn aggregate_count(&self, key: &str) -> Option<u64> {
        self.aggregate
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.count)
    }

    pub fn has_aggregate(&self) -> bool {
        matches!(self.fetch_type, FetchType::Stats | FetchType::Compare)
            && !self.aggregate.is_empty()
    }
}
