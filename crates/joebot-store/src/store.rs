use std::collections::BTreeMap;
use std::ops::Bound;

use joebot_models::{Condition, JobRecord};
use tracing::info;

use crate::error::StoreError;
use crate::sqlite::SqliteSource;
use crate::vocabulary::Vocabulary;

/// Immutable in-memory snapshot of every job record.
///
/// Built once at startup and shared read-only (behind an `Arc`) by all
/// concurrent queries. There is no write path.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<JobRecord>,
    by_year: BTreeMap<i32, Vec<usize>>,
    undated: Vec<usize>,
    vocabulary: Vocabulary,
}

impl RecordStore {
    pub fn new(records: Vec<JobRecord>) -> Self {
        let mut by_year: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        let mut undated = Vec::new();
        for (i, record) in records.iter().enumerate() {
            match record.year {
                Some(year) => by_year.entry(year).or_default().push(i),
                None => undated.push(i),
            }
        }
        let vocabulary = Vocabulary::from_records(&records);
        Self {
            records,
            by_year,
            undated,
            vocabulary,
        }
    }

    /// Load every row from the jobs database at `path`.
    pub fn load(path: &str) -> Result<Self, StoreError> {
        let source = SqliteSource::open(path)?;
        Self::from_source(&source)
    }

    pub fn from_source(source: &SqliteSource) -> Result<Self, StoreError> {
        let store = Self::new(source.load_all()?);
        info!(
            records = store.len(),
            years = store.by_year.len(),
            "Record store loaded"
        );
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[JobRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&JobRecord> {
        self.records.get(index)
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Indices of records that could satisfy `conditions`, narrowed by the
    /// year index. Always a superset of the true matches, in ascending order.
    pub fn candidates(&self, conditions: &[Condition]) -> Vec<usize> {
        let mut lower = Bound::Unbounded;
        let mut upper = Bound::Unbounded;
        let mut exact: Option<&[i32]> = None;
        for condition in conditions {
            match condition {
                Condition::Year(years) => exact = Some(years),
                Condition::YearAtLeast(y) => lower = Bound::Included(*y),
                Condition::YearAtMost(y) => upper = Bound::Included(*y),
                Condition::Text { .. } => {}
            }
        }

        if let (Bound::Included(lo), Bound::Included(hi)) = (lower, upper) {
            if lo > hi {
                return Vec::new();
            }
        }

        let mut indices: Vec<usize> = match exact {
            Some(years) => years
                .iter()
                .filter_map(|y| self.by_year.get(y))
                .flatten()
                .copied()
                .collect(),
            None if lower == Bound::Unbounded && upper == Bound::Unbounded => {
                return (0..self.records.len()).collect();
            }
            None => self
                .by_year
                .range((lower, upper))
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Records without a year. Never matched by a year condition.
    pub fn undated(&self) -> usize {
        self.undated.len()
    }
}
