use std::collections::BTreeSet;
use std::fmt::{self, Write as _};
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::{FetchType, FilterSpec, FilterValue, ScalarValue};

pub const MIN_YEAR: i32 = 1900;
pub const DEFAULT_LIST_CAP: usize = 25;

/// Every attribute a `FilterSpec` may name.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Year,
    YearMin,
    YearMax,
    Institution,
    Field,
    Country,
    State,
    Section,
    Department,
    Keywords,
}

impl FilterField {
    pub const ALL: [FilterField; 10] = [
        FilterField::Year,
        FilterField::YearMin,
        FilterField::YearMax,
        FilterField::Institution,
        FilterField::Field,
        FilterField::Country,
        FilterField::State,
        FilterField::Section,
        FilterField::Department,
        FilterField::Keywords,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterField::Year => "year",
            FilterField::YearMin => "year_min",
            FilterField::YearMax => "year_max",
            FilterField::Institution => "institution",
            FilterField::Field => "field",
            FilterField::Country => "country",
            FilterField::State => "state",
            FilterField::Section => "section",
            FilterField::Department => "department",
            FilterField::Keywords => "keywords",
        }
    }

    /// Parses a field name. `jel_classification` is accepted for `field`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "jel_classification" => Some(FilterField::Field),
            other => Self::ALL.into_iter().find(|f| f.name() == other),
        }
    }

    pub fn is_year(self) -> bool {
        matches!(
            self,
            FilterField::Year | FilterField::YearMin | FilterField::YearMax
        )
    }

    /// Whether records can be grouped or compared on this field.
    pub fn is_axis(self) -> bool {
        !matches!(
            self,
            FilterField::YearMin | FilterField::YearMax | FilterField::Keywords
        )
    }

    fn description(self) -> &'static str {
        match self {
            FilterField::Year => "posting year, integer (e.g. 2024)",
            FilterField::YearMin => "earliest posting year, inclusive",
            FilterField::YearMax => "latest posting year, inclusive",
            FilterField::Institution => "hiring institution name (e.g. \"Harvard\")",
            FilterField::Field => "JEL classification or subject (e.g. \"C1\", \"Labor\")",
            FilterField::Country => "country name",
            FilterField::State => "US state or region",
            FilterField::Section => "job type (e.g. \"Full-Time Academic\", \"Postdoc\")",
            FilterField::Department => "department name",
            FilterField::Keywords => "free text searched in keywords, title and description",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a `FilterSpec` was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("invalid value `{value}` for `{field}`: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("`{0}` cannot be used to group or compare")]
    NotAnAxis(String),

    #[error("stats requires `group_by`")]
    MissingGroupBy,

    #[error("compare requires `compare_by`")]
    MissingCompareAxis,

    #[error("compare requires at least two compare_values, got {0}")]
    TooFewCompareValues(usize),

    #[error("duplicate compare value `{0}`")]
    DuplicateCompareValue(String),
}

impl SchemaViolation {
    fn invalid(field: FilterField, value: impl ToString, reason: &str) -> Self {
        SchemaViolation::InvalidValue {
            field: field.name().to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A typed predicate over records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Year equals any of the values.
    Year(Vec<i32>),
    YearAtLeast(i32),
    YearAtMost(i32),
    /// Text attribute matches any of the terms.
    Text { field: FilterField, terms: Vec<String> },
}

/// One value of a `compare` request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompareArm {
    /// The value as the caller wrote it; used as the aggregate key.
    pub label: String,
    pub condition: Condition,
}

/// A `FilterSpec` that passed `FilterSchema::validate`. The fetcher only
/// accepts this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSpec {
    spec: FilterSpec,
    conditions: Vec<Condition>,
    group_by: Option<FilterField>,
    compare_axis: Option<FilterField>,
    compare_arms: Vec<CompareArm>,
    limit: usize,
}

impl ValidatedSpec {
    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn into_spec(self) -> FilterSpec {
        self.spec
    }

    pub fn fetch_type(&self) -> FetchType {
        self.spec.fetch_type
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Grouping axis. Only set for `stats`.
    pub fn group_by(&self) -> Option<FilterField> {
        self.group_by
    }

    /// Comparison axis. Only set for `compare`.
    pub fn compare_axis(&self) -> Option<FilterField> {
        self.compare_axis
    }

    pub fn compare_arms(&self) -> &[CompareArm] {
        &self.compare_arms
    }

    /// Maximum records returned by `list`, already clamped to the cap.
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn visualize(&self) -> bool {
        self.spec.visualize
    }

    /// Stable key over everything that affects the fetch result.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{:?}|{:?}|{:?}|{:?}|{}",
            self.spec.fetch_type,
            self.conditions,
            self.group_by,
            self.compare_axis,
            self.compare_arms,
            self.limit
        )
    }
}

/// The legal vocabulary for structured requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSchema {
    fields: BTreeSet<FilterField>,
    years: RangeInclusive<i32>,
    list_cap: usize,
}

impl FilterSchema {
    /// Builds a schema from configured field names. `current_year` bounds
    /// accepted years at `current_year + 1`.
    pub fn new<S: AsRef<str>>(
        field_names: &[S],
        list_cap: usize,
        current_year: i32,
    ) -> Result<Self, SchemaViolation> {
        let fields = field_names
            .iter()
            .map(|name| {
                FilterField::from_name(name.as_ref())
                    .ok_or_else(|| SchemaViolation::UnknownField(name.as_ref().to_string()))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self {
            fields,
            years: MIN_YEAR..=current_year + 1,
            list_cap: list_cap.max(1),
        })
    }

    /// Every known field, default list cap.
    pub fn full(current_year: i32) -> Self {
        Self {
            fields: FilterField::ALL.into_iter().collect(),
            years: MIN_YEAR..=current_year + 1,
            list_cap: DEFAULT_LIST_CAP,
        }
    }

    pub fn contains(&self, field: FilterField) -> bool {
        self.fields.contains(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = FilterField> + '_ {
        self.fields.iter().copied()
    }

    pub fn axes(&self) -> impl Iterator<Item = FilterField> + '_ {
        self.fields().filter(|f| f.is_axis())
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.years.clone()
    }

    pub fn list_cap(&self) -> usize {
        self.list_cap
    }

    /// Resolves a field name, rejecting names outside this schema.
    pub fn resolve(&self, name: &str) -> Result<FilterField, SchemaViolation> {
        FilterField::from_name(name)
            .filter(|field| self.contains(*field))
            .ok_or_else(|| SchemaViolation::UnknownField(name.to_string()))
    }

    fn resolve_axis(&self, name: &str) -> Result<FilterField, SchemaViolation> {
        let field = self.resolve(name)?;
        if field.is_axis() {
            Ok(field)
        } else {
            Err(SchemaViolation::NotAnAxis(name.to_string()))
        }
    }

    fn year(&self, field: FilterField, value: &ScalarValue) -> Result<i32, SchemaViolation> {
        let parsed = match value {
            ScalarValue::Int(n) => i32::try_from(*n).ok(),
            ScalarValue::Text(s) => s.trim().parse::<i32>().ok(),
        };
        let year = parsed.ok_or_else(|| SchemaViolation::invalid(field, value, "not a year"))?;
        if self.years.contains(&year) {
            Ok(year)
        } else {
            Err(SchemaViolation::invalid(
                field,
                value,
                &format!(
                    "outside {}..={}",
                    self.years.start(),
                    self.years.end()
                ),
            ))
        }
    }

    fn term(field: FilterField, value: &ScalarValue) -> Result<String, SchemaViolation> {
        match value {
            ScalarValue::Int(n) => Ok(n.to_string()),
            ScalarValue::Text(s) if s.trim().is_empty() => {
                Err(SchemaViolation::invalid(field, s, "empty text"))
            }
            ScalarValue::Text(s) => Ok(s.trim().to_string()),
        }
    }

    fn condition(
        &self,
        field: FilterField,
        value: &FilterValue,
    ) -> Result<Condition, SchemaViolation> {
        let values = value.values();
        if values.is_empty() {
            return Err(SchemaViolation::invalid(field, "[]", "empty value set"));
        }
        match field {
            FilterField::Year => Ok(Condition::Year(
                values
                    .iter()
                    .map(|v| self.year(field, v))
                    .collect::<Result<_, _>>()?,
            )),
            FilterField::YearMin | FilterField::YearMax => {
                let [single] = values else {
                    return Err(SchemaViolation::invalid(
                        field,
                        values.len(),
                        "expects a single year",
                    ));
                };
                let year = self.year(field, single)?;
                Ok(if field == FilterField::YearMin {
                    Condition::YearAtLeast(year)
                } else {
                    Condition::YearAtMost(year)
                })
            }
            _ => Ok(Condition::Text {
                field,
                terms: values
                    .iter()
                    .map(|v| Self::term(field, v))
                    .collect::<Result<_, _>>()?,
            }),
        }
    }

    /// Checks every field name and value in `spec`.
    ///
    /// `group_by` / `compare_by` on fetch kinds that do not use them are
    /// still checked, then ignored.
    pub fn validate(&self, spec: FilterSpec) -> Result<ValidatedSpec, SchemaViolation> {
        let mut conditions = Vec::with_capacity(spec.filters.len());
        let (mut lower, mut upper) = (None, None);
        for (name, value) in &spec.filters {
            let field = self.resolve(name)?;
            let condition = self.condition(field, value)?;
            match condition {
                Condition::YearAtLeast(y) => lower = Some(y),
                Condition::YearAtMost(y) => upper = Some(y),
                _ => {}
            }
            conditions.push(condition);
        }
        if let (Some(lo), Some(hi)) = (lower, upper) {
            if lo > hi {
                return Err(SchemaViolation::invalid(
                    FilterField::YearMin,
                    lo,
                    "after year_max",
                ));
            }
        }

        let group_axis = spec
            .group_by
            .as_deref()
            .map(|name| self.resolve_axis(name))
            .transpose()?;
        let compare_axis = spec
            .compare_by
            .as_deref()
            .map(|name| self.resolve_axis(name))
            .transpose()?;

        let mut validated = ValidatedSpec {
            spec: FilterSpec::default(),
            conditions,
            group_by: None,
            compare_axis: None,
            compare_arms: Vec::new(),
            limit: spec
                .limit
                .map(|l| l.clamp(1, self.list_cap))
                .unwrap_or(self.list_cap),
        };

        match spec.fetch_type {
            FetchType::Stats => {
                let default_axis = Some(FilterField::Year).filter(|f| self.contains(*f));
                validated.group_by =
                    Some(group_axis.or(default_axis).ok_or(SchemaViolation::MissingGroupBy)?);
            }
            FetchType::Compare => {
                let axis = compare_axis.ok_or(SchemaViolation::MissingCompareAxis)?;
                if spec.compare_values.len() < 2 {
                    return Err(SchemaViolation::TooFewCompareValues(
                        spec.compare_values.len(),
                    ));
                }
                let mut seen = BTreeSet::new();
                for value in &spec.compare_values {
                    let condition = self.condition(axis, &FilterValue::One(value.clone()))?;
                    let label = value.to_string().trim().to_string();
                    if !seen.insert(label.to_lowercase()) {
                        return Err(SchemaViolation::DuplicateCompareValue(label));
                    }
                    validated.compare_arms.push(CompareArm { label, condition });
                }
                validated.compare_axis = Some(axis);
            }
            FetchType::Count | FetchType::List => {}
        }

        validated.spec = spec;
        Ok(validated)
    }

    /// The request the matcher falls back to when nothing in the query is
    /// recognized: an unfiltered count flagged as no-match.
    pub fn no_match(&self) -> ValidatedSpec {
        ValidatedSpec {
            spec: FilterSpec::no_match(),
            conditions: Vec::new(),
            group_by: None,
            compare_axis: None,
            compare_arms: Vec::new(),
            limit: self.list_cap,
        }
    }

    /// Plain-text description for the planner prompt.
    pub fn describe(&self) -> String {
        let mut out = String::from("Filter fields:\n");
        for field in self.fields() {
            let _ = writeln!(out, "- {}: {}", field.name(), field.description());
        }
        let axes: Vec<&str> = self.axes().map(FilterField::name).collect();
        let _ = writeln!(
            out,
            "\nfetch_type is one of: count, list, stats, compare.\n\
             - count: number of matching postings\n\
             - list: up to {} matching postings, newest first\n\
             - stats: counts grouped by `group_by` (default year)\n\
             - compare: counts for each of `compare_values` (at least two) on `compare_by`\n\
             group_by / compare_by must be one of: {}\n\
             Years must be between {} and {}. A filter value may be a list, meaning any of.",
            self.list_cap,
            axes.join(", "),
            self.years.start(),
            self.years.end()
        );
        out
    }
}
