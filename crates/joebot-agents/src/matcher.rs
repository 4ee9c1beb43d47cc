//! Rule-based text to `FilterSpec` resolution.
//!
//! No external calls, no randomness and no state between invocations:
//! the same text always yields the same `ValidatedSpec`. Every rule's
//! output goes through `FilterSchema::validate`; a rejected rule is
//! skipped and the next one is tried. When nothing fires the result is the
//! schema's no-match spec, so resolution always succeeds.

use std::cmp::Reverse;
use std::ops::Range;
use std::sync::{Arc, LazyLock};

use joebot_models::text::find_word;
use joebot_models::{
    FetchType, FilterField, FilterSchema, FilterSpec, FilterValue, MatcherConfidence, ScalarValue,
    ValidatedSpec,
};
use joebot_store::Vocabulary;
use regex::Regex;
use tracing::debug;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})\b").expect("valid year regex"));
static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:between|from)\s+(\d{4})\s*(?:and|to|through|-)\s*(\d{4})\b")
        .expect("valid year range regex")
});
static LOWER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:since|after|from)\s+(\d{4})\b").expect("valid lower bound regex")
});
static UPPER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:before|until|through)\s+(\d{4})\b").expect("valid upper bound regex")
});
static LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:top|first)\s+(\d{1,3})\b").expect("valid limit regex")
});
static AXIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:by|per)\s+([a-z]+)\b").expect("valid axis regex"));

const HELP_TRIGGERS: &[&str] = &["help", "what can", "how do i", "how to"];
const COMPARE_TRIGGERS: &[&str] = &[
    "compare",
    "compared to",
    "versus",
    "vs",
    "difference between",
];
const STATS_TRIGGERS: &[&str] = &[
    "stats",
    "statistics",
    "breakdown",
    "distribution",
    "trend",
    "over time",
    "chart",
    "graph",
    "plot",
];
const COUNT_TRIGGERS: &[&str] = &["how many", "count", "number of", "total"];
const LIST_TRIGGERS: &[&str] = &["list", "show", "find", "get", "which"];
const CHART_TRIGGERS: &[&str] = &["chart", "graph", "plot", "visualize", "visualise"];

/// Query phrases and the section terms they filter on.
const SECTION_TABLE: [(&[&str], &[&str]); 6] = [
    (&["full-time", "full time"], &["full-time"]),
    (&["tenure", "tenure-track", "tenured"], &["tenure"]),
    (&["visiting"], &["visiting"]),
    (&["temporary"], &["temporary"]),
    (
        &["postdoc", "postdocs", "postdoctoral", "post-doc"],
        &["postdoc", "postdoctoral"],
    ),
    (&["nonacademic", "non-academic", "industry"], &["nonacademic"]),
];

/// Fields matched against known values, in claim order.
const ENTITY_FIELDS: [FilterField; 3] = [
    FilterField::Institution,
    FilterField::Country,
    FilterField::State,
];

/// Shorter known values match too much ordinary text.
const MIN_ENTITY_LEN: usize = 3;

/// Result of deterministic resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The text asks for usage help. No fetch.
    Help,
    Fetch(ValidatedSpec),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Compare,
    Stats,
    Count,
    List,
    Entities,
}

impl Rule {
    const ORDER: [Rule; 5] = [
        Rule::Compare,
        Rule::Stats,
        Rule::Count,
        Rule::List,
        Rule::Entities,
    ];

    fn name(self) -> &'static str {
        match self {
            Rule::Compare => "compare",
            Rule::Stats => "stats",
            Rule::Count => "count",
            Rule::List => "list",
            Rule::Entities => "entities",
        }
    }
}

#[derive(Debug, Clone)]
struct KnownValue {
    lower: String,
    original: String,
}

/// Field values pulled out of one query.
#[derive(Debug, Default)]
struct Extraction {
    /// Distinct in-range years in order of appearance.
    years: Vec<i32>,
    year_min: Option<i32>,
    year_max: Option<i32>,
    entities: Vec<(FilterField, Vec<String>)>,
    sections: Vec<&'static str>,
    limit: Option<usize>,
    visualize: bool,
}

impl Extraction {
    fn is_empty(&self) -> bool {
        self.years.is_empty() && self.entities.is_empty() && self.sections.is_empty()
    }

    fn entity(&self, field: FilterField) -> Option<&[String]> {
        self.entities
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, values)| values.as_slice())
    }

    /// Spec carrying every extracted filter except those on `exclude`.
    fn spec(&self, fetch_type: FetchType, exclude: Option<FilterField>) -> FilterSpec {
        let mut spec = FilterSpec::new(fetch_type);
        if exclude != Some(FilterField::Year) {
            if self.year_min.is_some() || self.year_max.is_some() {
                if let Some(year) = self.year_min {
                    spec = spec.with_filter(FilterField::YearMin.name(), year);
                }
                if let Some(year) = self.year_max {
                    spec = spec.with_filter(FilterField::YearMax.name(), year);
                }
            } else if let Some(year) = self.years.first() {
                spec = spec.with_filter(FilterField::Year.name(), *year);
            }
        }
        for (field, values) in &self.entities {
            if Some(*field) != exclude {
                spec = spec.with_filter(field.name(), filter_value(values.iter().cloned()));
            }
        }
        if !self.sections.is_empty() {
            spec = spec.with_filter(
                FilterField::Section.name(),
                filter_value(self.sections.iter().map(|s| s.to_string())),
            );
        }
        spec.limit = self.limit;
        spec.visualize = self.visualize;
        spec.matcher_confidence = Some(MatcherConfidence::Matched);
        spec
    }
}

fn filter_value(values: impl Iterator<Item = String>) -> FilterValue {
    let mut values: Vec<ScalarValue> = values.map(ScalarValue::from).collect();
    if values.len() == 1 {
        FilterValue::One(values.remove(0))
    } else {
        FilterValue::AnyOf(values)
    }
}

fn mentions(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| find_word(text, phrase).is_some())
}

fn axis_for_word(word: &str) -> Option<FilterField> {
    let field = match word {
        "year" | "years" => FilterField::Year,
        "institution" | "institutions" | "school" | "schools" | "university" | "universities"
        | "employer" | "employers" => FilterField::Institution,
        "country" | "countries" => FilterField::Country,
        "state" | "states" | "region" | "regions" => FilterField::State,
        "type" | "types" | "section" | "sections" | "category" | "categories" => {
            FilterField::Section
        }
        "department" | "departments" => FilterField::Department,
        "field" | "fields" | "jel" | "subject" | "subjects" => FilterField::Field,
        _ => return None,
    };
    Some(field)
}

/// Rule-based resolver over a fixed schema and vocabulary.
pub struct DeterministicMatcher {
    schema: Arc<FilterSchema>,
    /// Per entity field, longest values first.
    known: Vec<(FilterField, Vec<KnownValue>)>,
}

impl DeterministicMatcher {
    pub fn new(schema: Arc<FilterSchema>, vocabulary: &Vocabulary) -> Self {
        let known = ENTITY_FIELDS
            .into_iter()
            .filter(|field| schema.contains(*field))
            .map(|field| {
                let mut values: Vec<KnownValue> = vocabulary
                    .values(field)
                    .filter(|v| v.chars().count() >= MIN_ENTITY_LEN)
                    .map(|v| KnownValue {
                        lower: v.to_lowercase(),
                        original: v.to_string(),
                    })
                    .collect();
                values.sort_by(|a, b| {
                    (Reverse(a.lower.chars().count()), &a.lower)
                        .cmp(&(Reverse(b.lower.chars().count()), &b.lower))
                });
                (field, values)
            })
            .collect();
        Self { schema, known }
    }

    pub fn schema(&self) -> &FilterSchema {
        &self.schema
    }

    pub fn resolve(&self, text: &str) -> MatchOutcome {
        let lower = text.to_lowercase();
        let extraction = self.extract(&lower);

        if extraction.is_empty() && mentions(&lower, HELP_TRIGGERS) {
            return MatchOutcome::Help;
        }

        for rule in Rule::ORDER {
            let Some(spec) = self.apply(rule, &lower, &extraction) else {
                continue;
            };
            match self.schema.validate(spec) {
                Ok(validated) => {
                    debug!(rule = rule.name(), fetch_type = %validated.fetch_type(), "Matcher rule fired");
                    return MatchOutcome::Fetch(validated);
                }
                Err(e) => {
                    debug!(rule = rule.name(), error = %e, "Matcher rule rejected by schema");
                }
            }
        }

        debug!("No matcher rule fired");
        MatchOutcome::Fetch(self.schema.no_match())
    }

    fn apply(&self, rule: Rule, text: &str, extraction: &Extraction) -> Option<FilterSpec> {
        match rule {
            Rule::Compare if mentions(text, COMPARE_TRIGGERS) => compare_spec(extraction),
            Rule::Stats => {
                let axis = AXIS_RE
                    .captures_iter(text)
                    .find_map(|caps| axis_for_word(&caps[1]));
                if axis.is_none() && !mentions(text, STATS_TRIGGERS) {
                    return None;
                }
                let spec = extraction.spec(FetchType::Stats, None);
                Some(match axis {
                    Some(field) => spec.grouped_by(field.name()),
                    None => spec,
                })
            }
            Rule::Count if mentions(text, COUNT_TRIGGERS) => {
                Some(extraction.spec(FetchType::Count, None))
            }
            Rule::List if mentions(text, LIST_TRIGGERS) => {
                Some(extraction.spec(FetchType::List, None))
            }
            Rule::Entities if !extraction.is_empty() => {
                Some(extraction.spec(FetchType::Count, None))
            }
            _ => None,
        }
    }

    fn extract(&self, text: &str) -> Extraction {
        let mut extraction = Extraction::default();
        let years = self.schema.years();
        let parse_year = |s: &str| s.parse::<i32>().ok().filter(|y| years.contains(y));

        if self.schema.contains(FilterField::Year) {
            for caps in YEAR_RE.captures_iter(text) {
                if let Some(year) = parse_year(&caps[1]) {
                    if !extraction.years.contains(&year) {
                        extraction.years.push(year);
                    }
                }
            }
        }

        let range = RANGE_RE.captures(text).and_then(|caps| {
            let a = parse_year(&caps[1])?;
            let b = parse_year(&caps[2])?;
            Some((a.min(b), a.max(b)))
        });
        if let Some((lo, hi)) = range {
            extraction.year_min = Some(lo);
            extraction.year_max = Some(hi);
        } else {
            extraction.year_min = LOWER_RE
                .captures(text)
                .and_then(|caps| parse_year(&caps[1]));
            extraction.year_max = UPPER_RE
                .captures(text)
                .and_then(|caps| parse_year(&caps[1]));
        }
        if !self.schema.contains(FilterField::YearMin) {
            extraction.year_min = None;
        }
        if !self.schema.contains(FilterField::YearMax) {
            extraction.year_max = None;
        }

        extraction.entities = self.extract_entities(text);

        if self.schema.contains(FilterField::Section) {
            for (phrases, terms) in SECTION_TABLE {
                if mentions(text, phrases) {
                    for &term in terms {
                        if !extraction.sections.contains(&term) {
                            extraction.sections.push(term);
                        }
                    }
                }
            }
        }

        extraction.limit = LIMIT_RE
            .captures(text)
            .and_then(|caps| caps[1].parse::<usize>().ok())
            .filter(|n| *n > 0);
        extraction.visualize = mentions(text, CHART_TRIGGERS);
        extraction
    }

    /// Longest known values claim text first; later matches may not overlap.
    fn extract_entities(&self, text: &str) -> Vec<(FilterField, Vec<String>)> {
        let mut claimed: Vec<Range<usize>> = Vec::new();
        let mut entities = Vec::new();
        for (field, values) in &self.known {
            let mut found: Vec<(usize, &str)> = Vec::new();
            for value in values {
                let Some(start) = find_word(text, &value.lower) else {
                    continue;
                };
                let span = start..start + value.lower.len();
                if claimed
                    .iter()
                    .any(|c| c.start < span.end && span.start < c.end)
                {
                    continue;
                }
                claimed.push(span);
                found.push((start, value.original.as_str()));
            }
            if !found.is_empty() {
                found.sort_by_key(|(start, _)| *start);
                entities.push((
                    *field,
                    found.into_iter().map(|(_, v)| v.to_string()).collect(),
                ));
            }
        }
        entities
    }
}

/// Years first, then the entity fields; the first axis with two or more
/// values is compared, in order of appearance.
fn compare_spec(extraction: &Extraction) -> Option<FilterSpec> {
    if extraction.years.len() >= 2 {
        let years = extraction.years.iter().copied();
        return Some(
            extraction
                .spec(FetchType::Compare, Some(FilterField::Year))
                .compared_by(FilterField::Year.name(), years),
        );
    }
    ENTITY_FIELDS.into_iter().find_map(|field| {
        let values = extraction.entity(field)?;
        (values.len() >= 2).then(|| {
            extraction
                .spec(FetchType::Compare, Some(field))
                .compared_by(field.name(), values.iter().cloned())
        })
    })
}
