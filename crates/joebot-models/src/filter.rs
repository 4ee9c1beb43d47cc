use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of data request a `FilterSpec` makes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchType {
    #[default]
    Count,
    List,
    /// Accepts `aggregate`, the older name used by planner prompts.
    #[serde(alias = "aggregate")]
    Stats,
    Compare,
}

impl FetchType {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchType::Count => "count",
            FetchType::List => "list",
            FetchType::Stats => "stats",
            FetchType::Compare => "compare",
        }
    }
}

impl fmt::Display for FetchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single filter or compare value as it arrives from a resolver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(untagged)]
pub enum ScalarValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int(n) => write!(f, "{n}"),
            ScalarValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self {
        ScalarValue::Int(n)
    }
}

impl From<i32> for ScalarValue {
    fn from(n: i32) -> Self {
        ScalarValue::Int(i64::from(n))
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::Text(s)
    }
}

/// Either one value (equality) or a set of values (membership).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FilterValue {
    One(ScalarValue),
    AnyOf(Vec<ScalarValue>),
}

impl FilterValue {
    pub fn values(&self) -> &[ScalarValue] {
        match self {
            FilterValue::One(v) => std::slice::from_ref(v),
            FilterValue::AnyOf(vs) => vs,
        }
    }
}

impl From<ScalarValue> for FilterValue {
    fn from(value: ScalarValue) -> Self {
        FilterValue::One(value)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        FilterValue::One(n.into())
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::One(s.into())
    }
}

impl From<Vec<ScalarValue>> for FilterValue {
    fn from(values: Vec<ScalarValue>) -> Self {
        FilterValue::AnyOf(values)
    }
}

/// Set only by the deterministic matcher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatcherConfidence {
    Matched,
    #[serde(rename = "none")]
    NoMatch,
}

/// A structured data request produced by either resolver.
///
/// Field names are plain strings here; `FilterSchema::validate` is what
/// turns a `FilterSpec` into something the fetcher will accept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FilterSpec {
    #[serde(default)]
    pub fetch_type: FetchType,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,
    #[serde(default, alias = "aggregate_by", skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_by: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compare_values: Vec<ScalarValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub visualize: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher_confidence: Option<MatcherConfidence>,
}

impl FilterSpec {
    pub fn new(fetch_type: FetchType) -> Self {
        Self {
            fetch_type,
            ..Default::default()
        }
    }

    /// The terminal "nothing recognized" request: count everything.
    pub fn no_match() -> Self {
        Self {
            matcher_confidence: Some(MatcherConfidence::NoMatch),
            ..Self::new(FetchType::Count)
        }
    }

    pub fn with_filter(mut self, field: &str, value: impl Into<FilterValue>) -> Self {
        self.filters.insert(field.to_string(), value.into());
        self
    }

    pub fn grouped_by(mut self, field: &str) -> Self {
        self.group_by = Some(field.to_string());
        self
    }

    pub fn compared_by<V: Into<ScalarValue>>(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.compare_by = Some(field.to_string());
        self.compare_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_no_match(&self) -> bool {
        self.matcher_confidence == Some(MatcherConfidence::NoMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_planner_arguments() {
        let json = r#"{
            "fetch_type": "compare",
            "filters": {"institution": "Harvard", "state": ["MA", "NY"]},
            "compare_by": "year",
            "compare_values": [2023, "2024"]
        }"#;
        let spec: FilterSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.fetch_type, FetchType::Compare);
        assert_eq!(
            spec.filters["institution"],
            FilterValue::One(ScalarValue::Text("Harvard".to_string()))
        );
        assert_eq!(spec.filters["state"].values().len(), 2);
        assert_eq!(
            spec.compare_values,
            vec![ScalarValue::Int(2023), ScalarValue::Text("2024".to_string())]
        );
    }

    #[test]
    fn aggregate_is_an_alias_for_stats() {
        let spec: FilterSpec =
            serde_json::from_str(r#"{"fetch_type": "aggregate", "aggregate_by": "state"}"#)
                .unwrap();
        assert_eq!(spec.fetch_type, FetchType::Stats);
        assert_eq!(spec.group_by.as_deref(), Some("state"));
    }

    #[test]
    fn missing_fetch_type_defaults_to_count() {
        let spec: FilterSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec, FilterSpec::new(FetchType::Count));
    }

    #[test]
    fn no_match_serializes_confidence_as_none() {
        let json = serde_json::to_value(FilterSpec::no_match()).unwrap();
        assert_eq!(json["matcher_confidence"], "none");
        assert_eq!(json["fetch_type"], "count");
        assert!(json.get("visualize").is_none());
    }

    #[test]
    fn builder_keeps_compare_order() {
        let spec = FilterSpec::new(FetchType::Compare).compared_by("year", [2024, 2019, 2021]);
        assert_eq!(
            spec.compare_values,
            vec![
                ScalarValue::Int(2024),
                ScalarValue::Int(2019),
                ScalarValue::Int(2021)
            ]
        );
    }
}
