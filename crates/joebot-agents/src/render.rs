//! Fixed text templates for deterministic-path answers.

use std::fmt::Write;

use joebot_models::{FetchResult, FetchType, FilterField, FilterSpec, FilterValue, ValidatedSpec};

/// Answer for a store invariant violation on the deterministic path.
pub const UNABLE_TO_PROCESS: &str =
    "Sorry, I was unable to process that question. Please try rephrasing it.";

/// Appended to fallback answers produced because the agent tier failed.
pub const DEGRADED_FOOTER: &str =
    "(Answered by the rule-based matcher; the planning agent was unavailable.)";

fn label(name: &str) -> String {
    match FilterField::from_name(name) {
        Some(FilterField::Section) => "job type".to_string(),
        Some(FilterField::Field) => "field (JEL)".to_string(),
        Some(FilterField::YearMin) => "from year".to_string(),
        Some(FilterField::YearMax) => "through year".to_string(),
        Some(field) => field.name().to_string(),
        None => name.replace('_', " "),
    }
}

fn describe_value(value: &FilterValue) -> String {
    value
        .values()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" or ")
}

/// ` matching institution: Harvard; year: 2024`, or empty without filters.
fn matching(spec: &FilterSpec) -> String {
    if spec.filters.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = spec
        .filters
        .iter()
        .map(|(name, value)| format!("{}: {}", label(name), describe_value(value)))
        .collect();
    format!(" matching {}", parts.join("; "))
}

fn plural(n: u64) -> &'static str {
    if n == 1 {
        "posting"
    } else {
        "postings"
    }
}

/// Render a deterministic fetch as answer text.
pub fn render(spec: &ValidatedSpec, result: &FetchResult) -> String {
    let filters = spec.spec();
    if filters.is_no_match() {
        return render_no_match(result);
    }
    match result.fetch_type {
        FetchType::Count => render_count(filters, result),
        FetchType::List => render_list(filters, result),
        FetchType::Stats => render_stats(filters, result),
        FetchType::Compare => render_compare(filters, result),
    }
}

fn render_no_match(result: &FetchResult) -> String {
    format!(
        "I couldn't find a filter I recognize in that question, so here is the overall \
         total: the dataset has {} job {}. Type `help` for example questions.",
        result.total_count,
        plural(result.total_count)
    )
}

fn render_count(spec: &FilterSpec, result: &FetchResult) -> String {
    let n = result.total_count;
    if spec.filters.is_empty() {
        format!("The dataset has {n} job {}.", plural(n))
    } else {
        format!("Found {n} job {}{}.", plural(n), matching(spec))
    }
}

fn render_list(spec: &FilterSpec, result: &FetchResult) -> String {
    let total = result.total_count;
    if total == 0 || result.records.is_empty() {
        return format!("No job postings found{}.", matching(spec));
    }

    let mut out = format!("Found {total} job {}{}.", plural(total), matching(spec));
    if (result.records.len() as u64) < total {
        let _ = write!(out, " Showing the {} most recent:", result.records.len());
    }
    out.push('\n');

    for (i, record) in result.records.iter().enumerate() {
        let _ = write!(out, "\n{}. {}", i + 1, record.title);
        if let Some(institution) = &record.institution {
            let _ = write!(out, " - {institution}");
        }
        if let Some(department) = &record.department {
            let _ = write!(out, " ({department})");
        }
        let details: Vec<String> = [
            record.location.clone(),
            record.year.map(|y| y.to_string()),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !details.is_empty() {
            let _ = write!(out, ", {}", details.join(", "));
        }
    }
    out
}

fn render_stats(spec: &FilterSpec, result: &FetchResult) -> String {
    let axis = label(result.axis.as_deref().unwrap_or("group"));
    if result.aggregate.is_empty() {
        return format!("No job postings found{}.", matching(spec));
    }

    let mut out = format!("Job postings by {axis}{}:\n", matching(spec));
    for entry in &result.aggregate {
        let _ = write!(out, "\n- {}: {}", entry.key, entry.count);
    }
    let _ = write!(out, "\n\nTotal: {}", result.total_count);
    out
}

fn render_compare(spec: &FilterSpec, result: &FetchResult) -> String {
    let axis = label(result.axis.as_deref().unwrap_or("value"));
    let mut out = format!("Job postings compared by {axis}{}:\n", matching(spec));
    for entry in &result.aggregate {
        let _ = write!(out, "\n- {}: {}", entry.key, entry.count);
    }

    if let [first, second] = result.aggregate.as_slice() {
        let diff = second.count as i64 - first.count as i64;
        let _ = write!(
            out,
            "\n\nChange from {} to {}: {diff:+}",
            first.key, second.key
        );
        if first.count > 0 {
            let pct = diff as f64 / first.count as f64 * 100.0;
            let _ = write!(out, " ({pct:+.1}%)");
        }
    }
    out
}

/// Append the degraded footer.
pub fn with_footer(text: &str) -> String {
    format!("{text}\n\n{DEGRADED_FOOTER}")
}
