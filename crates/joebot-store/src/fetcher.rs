use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use joebot_models::text::{contains_word, matches_code_line};
use joebot_models::{
    AggregateEntry, Condition, FetchResult, FetchType, FilterField, JobRecord, ValidatedSpec,
    UNKNOWN_GROUP,
};
use tracing::{debug, info};

use crate::cache::ResultCache;
use crate::error::StoreError;
use crate::store::RecordStore;

/// Maximum groups kept in a `stats` result.
pub const STATS_GROUP_LIMIT: usize = 50;

/// Executes validated requests against the record store.
///
/// Read-through: checks the moka result cache first, computes on a miss
/// and memoizes. Never writes to the store.
#[derive(Clone)]
pub struct Fetcher {
    store: Arc<RecordStore>,
    cache: ResultCache,
}

impl Fetcher {
    pub fn new(store: Arc<RecordStore>, cache_capacity: u64, cache_ttl: Duration) -> Self {
        Self {
            store,
            cache: ResultCache::new(cache_capacity, cache_ttl),
        }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Run one request. Empty matches are a normal result; only a request
    /// that validation should have rejected is an error.
    pub async fn fetch(&self, spec: &ValidatedSpec) -> Result<FetchResult, StoreError> {
        let key = spec.cache_key();
        if let Some(hit) = self.cache.get(&key).await {
            debug!(fetch_type = %spec.fetch_type(), "Fetch served from cache");
            return Ok(hit.as_ref().clone());
        }

        let start = Instant::now();
        let result = self.execute(spec)?;
        info!(
            fetch_type = %spec.fetch_type(),
            total_count = result.total_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetch executed"
        );
        self.cache.insert(key, Arc::new(result.clone())).await;
        Ok(result)
    }

    /// Uncached execution.
    pub fn execute(&self, spec: &ValidatedSpec) -> Result<FetchResult, StoreError> {
        match spec.fetch_type() {
            FetchType::Count => {
                let total = self.matching(spec.conditions()).len() as u64;
                Ok(FetchResult::count(total))
            }
            FetchType::List => Ok(self.list(spec)),
            FetchType::Stats => self.stats(spec),
            FetchType::Compare => self.compare(spec),
        }
    }

    pub fn cached_results(&self) -> u64 {
        self.cache.entry_count()
    }

    fn matching(&self, conditions: &[Condition]) -> Vec<&JobRecord> {
        self.store
            .candidates(conditions)
            .into_iter()
            .filter_map(|i| self.store.get(i))
            .filter(|record| conditions.iter().all(|c| matches(record, c)))
            .collect()
    }

    fn list(&self, spec: &ValidatedSpec) -> FetchResult {
        let mut records = self.matching(spec.conditions());
        let total_count = records.len() as u64;
        records.sort_by(|a, b| list_order(a, b));
        FetchResult {
            fetch_type: FetchType::List,
            axis: None,
            records: records
                .into_iter()
                .take(spec.limit())
                .map(JobRecord::project)
                .collect(),
            aggregate: Vec::new(),
            total_count,
        }
    }

    fn stats(&self, spec: &ValidatedSpec) -> Result<FetchResult, StoreError> {
        let axis = spec.group_by().ok_or_else(|| {
            StoreError::InvariantViolation("stats request without a grouping axis".to_string())
        })?;
        let records = self.matching(spec.conditions());

        let mut groups: HashMap<String, u64> = HashMap::new();
        for record in &records {
            for key in group_keys(record, axis) {
                *groups.entry(key).or_default() += 1;
            }
        }

        let mut aggregate: Vec<AggregateEntry> = groups
            .into_iter()
            .map(|(key, count)| AggregateEntry { key, count })
            .collect();
        if axis == FilterField::Year {
            aggregate.sort_by(|a, b| year_key_order(&a.key, &b.key));
        } else {
            aggregate.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        }
        aggregate.truncate(STATS_GROUP_LIMIT);

        Ok(FetchResult {
            fetch_type: FetchType::Stats,
            axis: Some(axis.name().to_string()),
            records: Vec::new(),
            aggregate,
            total_count: records.len() as u64,
        })
    }

    fn compare(&self, spec: &ValidatedSpec) -> Result<FetchResult, StoreError> {
        let axis = spec.compare_axis().ok_or_else(|| {
            StoreError::InvariantViolation("compare request without an axis".to_string())
        })?;
        if spec.compare_arms().len() < 2 {
            return Err(StoreError::InvariantViolation(format!(
                "compare request with {} values",
                spec.compare_arms().len()
            )));
        }

        let base = self.matching(spec.conditions());
        let aggregate: Vec<AggregateEntry> = spec
            .compare_arms()
            .iter()
            .map(|arm| AggregateEntry {
                key: arm.label.clone(),
                count: base.iter().filter(|r| matches(r, &arm.condition)).count() as u64,
            })
            .collect();
        let total_count = aggregate.iter().map(|e| e.count).sum();

        Ok(FetchResult {
            fetch_type: FetchType::Compare,
            axis: Some(axis.name().to_string()),
            records: Vec::new(),
            aggregate,
            total_count,
        })
    }
}

/// Whether `record` satisfies one condition. Missing attributes never match.
pub fn matches(record: &JobRecord, condition: &Condition) -> bool {
    match condition {
        Condition::Year(years) => record.year.is_some_and(|y| years.contains(&y)),
        Condition::YearAtLeast(min) => record.year.is_some_and(|y| y >= *min),
        Condition::YearAtMost(max) => record.year.is_some_and(|y| y <= *max),
        Condition::Text {
            field: FilterField::Keywords,
            terms,
        } => {
            let haystacks = [
                record.keywords.as_deref(),
                Some(record.title.as_str()),
                record.description.as_deref(),
            ];
            terms.iter().any(|term| {
                haystacks
                    .iter()
                    .flatten()
                    .any(|text| contains_word(text, term))
            })
        }
        Condition::Text {
            field: FilterField::Field,
            terms,
        } => record
            .field_codes()
            .any(|line| terms.iter().any(|term| matches_code_line(line, term))),
        Condition::Text { field, terms } => record
            .text(*field)
            .is_some_and(|value| terms.iter().any(|term| contains_word(value, term))),
    }
}

fn group_keys(record: &JobRecord, axis: FilterField) -> Vec<String> {
    let keys: Vec<String> = match axis {
        FilterField::Year => record.year.map(|y| y.to_string()).into_iter().collect(),
        FilterField::Field => record.field_codes().map(str::to_string).collect(),
        other => record.text(other).map(str::to_string).into_iter().collect(),
    };
    if keys.is_empty() {
        vec![UNKNOWN_GROUP.to_string()]
    } else {
        keys
    }
}

/// Newest year first, `Unknown` last.
fn year_key_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<i32>().ok(), b.parse::<i32>().ok()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Year descending, then institution ascending, then id. Missing values last.
fn list_order(a: &JobRecord, b: &JobRecord) -> Ordering {
    let year = match (a.year, b.year) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    let institution = match (a.text(FilterField::Institution), b.text(FilterField::Institution)) {
        (Some(x), Some(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    year.then(institution).then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use joebot_models::{FilterSchema, FilterSpec, ScalarValue};

    fn job(id: &str, institution: &str, field: &str, country: &str, year: i32) -> JobRecord {
        JobRecord {
            id: id.to_string(),
            title: format!("{field} position"),
            institution: Some(institution.to_string()),
            field: Some(field.to_string()),
            country: Some(country.to_string()),
            year: Some(year),
            ..Default::default()
        }
    }

    fn fixture() -> Fetcher {
        let store = RecordStore::new(vec![
            job("1", "Harvard", "econ", "US", 2023),
            job("2", "Harvard", "econ", "US", 2024),
            job("3", "MIT", "cs", "US", 2024),
        ]);
        Fetcher::new(Arc::new(store), 100, Duration::from_secs(60))
    }

    fn validated(spec: FilterSpec) -> ValidatedSpec {
        FilterSchema::full(2025).validate(spec).unwrap()
    }

    #[tokio::test]
    async fn count_with_institution_filter() {
        let spec = validated(FilterSpec::new(FetchType::Count).with_filter("institution", "Harvard"));
        let result = fixture().fetch(&spec).await.unwrap();
        assert_eq!(result.total_count, 2);
        assert!(result.records.is_empty());
    }

    #[tokio::test]
    async fn compare_years_keeps_requested_order() {
        let spec = validated(
            FilterSpec::new(FetchType::Compare)
                .with_filter("institution", "Harvard")
                .compared_by("year", [2023, 2024]),
        );
        let result = fixture().fetch(&spec).await.unwrap();
        let pairs: Vec<(&str, u64)> = result
            .aggregate
            .iter()
            .map(|e| (e.key.as_str(), e.count))
            .collect();
        assert_eq!(pairs, vec![("2023", 1), ("2024", 1)]);
        assert_eq!(result.axis.as_deref(), Some("year"));
    }

    #[tokio::test]
    async fn compare_reports_zero_counts() {
        let spec = validated(
            FilterSpec::new(FetchType::Compare).compared_by("institution", ["MIT", "Yale", "Harvard"]),
        );
        let result = fixture().fetch(&spec).await.unwrap();
        assert_eq!(result.aggregate_count("MIT"), Some(1));
        assert_eq!(result.aggregate_count("Yale"), Some(0));
        assert_eq!(result.aggregate[2].key, "Harvard");
        assert_eq!(result.total_count, 3);
    }

    #[tokio::test]
    async fn empty_match_is_not_an_error() {
        let spec = validated(FilterSpec::new(FetchType::List).with_filter("institution", "Stanford"));
        let result = fixture().fetch(&spec).await.unwrap();
        assert_eq!(result.total_count, 0);
        assert!(result.records.is_empty());
    }

    #[tokio::test]
    async fn empty_filters_count_everything() {
        let result = fixture()
            .fetch(&validated(FilterSpec::no_match()))
            .await
            .unwrap();
        assert_eq!(result.total_count, 3);
    }

    #[tokio::test]
    async fn value_sets_match_any_member() {
        let spec = validated(FilterSpec::new(FetchType::Count).with_filter(
            "institution",
            vec![ScalarValue::from("MIT"), ScalarValue::from("Yale")],
        ));
        assert_eq!(fixture().fetch(&spec).await.unwrap().total_count, 1);
    }

    #[tokio::test]
    async fn list_orders_by_year_then_institution() {
        let spec = validated(FilterSpec::new(FetchType::List));
        let result = fixture().fetch(&spec).await.unwrap();
        let ids: Vec<&str> = result.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
    }

    #[tokio::test]
    async fn list_is_capped_with_full_total() {
        let records = (0..30)
            .map(|i| job(&format!("{i:02}"), "Harvard", "econ", "US", 1995 + i))
            .collect();
        let fetcher = Fetcher::new(
            Arc::new(RecordStore::new(records)),
            10,
            Duration::from_secs(60),
        );
        let result = fetcher
            .fetch(&validated(FilterSpec::new(FetchType::List)))
            .await
            .unwrap();
        assert_eq!(result.records.len(), 25);
        assert_eq!(result.total_count, 30);
        assert_eq!(result.records[0].year, Some(2024));
        assert!(result
            .records
            .windows(2)
            .all(|w| w[0].year >= w[1].year));
    }

    #[tokio::test]
    async fn stats_by_year_newest_first() {
        let spec = validated(FilterSpec::new(FetchType::Stats).grouped_by("year"));
        let result = fixture().fetch(&spec).await.unwrap();
        let keys: Vec<&str> = result.aggregate.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["2024", "2023"]);
        assert_eq!(result.aggregate_count("2024"), Some(2));
        assert_eq!(result.total_count, 3);
    }

    #[tokio::test]
    async fn stats_by_institution_count_descending() {
        let spec = validated(FilterSpec::new(FetchType::Stats).grouped_by("institution"));
        let result = fixture().fetch(&spec).await.unwrap();
        assert_eq!(result.aggregate[0].key, "Harvard");
        assert_eq!(result.aggregate[0].count, 2);
        assert_eq!(result.aggregate.len(), 2);
    }

    #[tokio::test]
    async fn stats_groups_missing_values_as_unknown() {
        let mut records = vec![job("1", "MIT", "cs", "US", 2024)];
        records.push(JobRecord {
            id: "2".to_string(),
            title: "Economist".to_string(),
            ..Default::default()
        });
        let fetcher = Fetcher::new(Arc::new(RecordStore::new(records)), 10, Duration::from_secs(60));
        let spec = validated(FilterSpec::new(FetchType::Stats).grouped_by("country"));
        let result = fetcher.fetch(&spec).await.unwrap();
        assert_eq!(result.aggregate_count(UNKNOWN_GROUP), Some(1));
        assert_eq!(result.aggregate_count("US"), Some(1));
    }

    #[tokio::test]
    async fn stats_by_field_counts_each_code() {
        let records = vec![
            job("1", "MIT", "C1 Econometrics\nJ2 Labor", "US", 2024),
            job("2", "Yale", "J2 Labor", "US", 2024),
        ];
        let fetcher = Fetcher::new(Arc::new(RecordStore::new(records)), 10, Duration::from_secs(60));
        let spec = validated(FilterSpec::new(FetchType::Stats).grouped_by("field"));
        let result = fetcher.fetch(&spec).await.unwrap();
        assert_eq!(result.aggregate[0].key, "J2 Labor");
        assert_eq!(result.aggregate[0].count, 2);
        assert_eq!(result.aggregate_count("C1 Econometrics"), Some(1));
        assert_eq!(result.total_count, 2);
    }

    #[tokio::test]
    async fn year_range_is_inclusive() {
        let spec = validated(
            FilterSpec::new(FetchType::Count)
                .with_filter("year_min", 2023)
                .with_filter("year_max", 2023),
        );
        assert_eq!(fixture().fetch(&spec).await.unwrap().total_count, 1);
    }

    #[tokio::test]
    async fn keywords_search_title() {
        let spec = validated(FilterSpec::new(FetchType::Count).with_filter("keywords", "econ"));
        assert_eq!(fixture().fetch(&spec).await.unwrap().total_count, 2);
    }

    #[tokio::test]
    async fn repeated_fetch_is_cached_and_identical() {
        let fetcher = fixture();
        let spec = validated(FilterSpec::new(FetchType::Stats).grouped_by("institution"));
        let first = fetcher.fetch(&spec).await.unwrap();
        let second = fetcher.fetch(&spec).await.unwrap();
        assert_eq!(first, second);
        fetcher.cache.sync().await;
        assert_eq!(fetcher.cached_results(), 1);
    }

    #[test]
    fn word_boundaries_prevent_false_matches() {
        let record = job("1", "Smith College", "econ", "US", 2024);
        let mit = Condition::Text {
            field: FilterField::Institution,
            terms: vec!["MIT".to_string()],
        };
        assert!(!matches(&record, &mit));
    }

    #[test]
    fn missing_year_never_matches_year_conditions() {
        let record = JobRecord::default();
        assert!(!matches(&record, &Condition::YearAtMost(2100)));
        assert!(!matches(&record, &Condition::Year(vec![2024])));
    }
}
