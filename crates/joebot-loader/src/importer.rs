//! Import of JOE listing exports.
//!
//! An export is a JSON array of row objects (`*.json`), one row object per
//! line (`*.jsonl`), or the spreadsheet JOE offers for download (`*.xlsx`,
//! `*.xls`). Rows use the JOE column names (`jp_id`, `jp_title`,
//! `locations`, `JEL_Classifications`, ...). A spreadsheet's first sheet is
//! read and its first row names the columns.

use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Datelike, NaiveDate};
use joebot_models::JobRecord;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::config::ImportConfig;
use crate::error::LoaderError;
use crate::writer::JobWriter;

type Row = Map<String, Value>;

/// Outcome of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub files_imported: usize,
    pub files_skipped: usize,
    pub records: usize,
    /// Rows dropped for lacking a `jp_id`.
    pub rows_without_id: usize,
}

/// Import every export in `config.data_dir`, one transaction per file.
/// A file that fails to parse or write is logged and skipped.
pub fn import_dir(config: &ImportConfig, writer: &mut JobWriter) -> Result<ImportSummary, LoaderError> {
    let files = discover(Path::new(&config.data_dir))?;
    info!(files = files.len(), dir = %config.data_dir, "Found export files");

    let mut summary = ImportSummary::default();
    for path in files {
        let name = file_name(&path);
        let result = read_file(&path).and_then(|(records, dropped)| {
            let written = writer.write_all(&records, config.batch_size)?;
            Ok((written, dropped))
        });
        match result {
            Ok((written, dropped)) => {
                info!(file = %name, records = written, dropped, "Imported file");
                summary.files_imported += 1;
                summary.records += written;
                summary.rows_without_id += dropped;
            }
            Err(e) => {
                error!(file = %name, error = %e, "Skipping file");
                summary.files_skipped += 1;
            }
        }
    }

    info!(
        files = summary.files_imported,
        skipped = summary.files_skipped,
        records = summary.records,
        "Import complete"
    );
    Ok(summary)
}

/// Export files directly under `dir`, sorted by name.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, LoaderError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && format_of(path).is_some())
        .collect();
    files.sort();
    Ok(files)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    JsonLines,
    Spreadsheet,
}

fn format_of(path: &Path) -> Option<Format> {
    match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "json" => Some(Format::Json),
        "jsonl" => Some(Format::JsonLines),
        "xlsx" | "xlsm" | "xls" => Some(Format::Spreadsheet),
        _ => None,
    }
}

/// Parse one export. Returns the records and the number of rows without an id.
pub fn read_file(path: &Path) -> Result<(Vec<JobRecord>, usize), LoaderError> {
    let format = format_of(path)
        .ok_or_else(|| LoaderError::Format(path.display().to_string()))?;
    let rows: Vec<Row> = match format {
        Format::Json => serde_json::from_str(&fs::read_to_string(path)?)?,
        Format::JsonLines => fs::read_to_string(path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?,
        Format::Spreadsheet => sheet_rows(path)?,
    };

    let source = file_name(path);
    let total = rows.len();
    let records: Vec<JobRecord> = rows
        .iter()
        .filter_map(|row| record_from_row(row, &source))
        .collect();
    let dropped = total - records.len();
    if dropped > 0 {
        warn!(file = %source, dropped, "Rows without jp_id");
    }
    Ok((records, dropped))
}

/// Rows of the first worksheet keyed by the header row. Blank rows are skipped.
fn sheet_rows(path: &Path) -> Result<Vec<Row>, LoaderError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoaderError::Format(format!("{}: workbook has no sheets", path.display())))??;

    let mut lines = range.rows();
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<String> = header
        .iter()
        .map(|cell| match cell_value(cell) {
            Value::String(s) => s.trim().to_string(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect();

    Ok(lines
        .map(|cells| {
            columns
                .iter()
                .zip(cells)
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, cell)| (name.clone(), cell_value(cell)))
                .filter(|(_, value)| !value.is_null())
                .collect::<Row>()
        })
        .filter(|row| !row.is_empty())
        .collect())
}

/// JSON value of one cell. Dates become `YYYY-MM-DD HH:MM:SS` like the
/// JSON exports.
fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| Value::String(d.format("%Y-%m-%d %H:%M:%S").to_string()))
            .unwrap_or(Value::Null),
        Data::Error(_) | Data::Empty => Value::Null,
    }
}

/// Map a JOE export row onto a `JobRecord`. `None` when the row has no id.
pub fn record_from_row(row: &Row, source_file: &str) -> Option<JobRecord> {
    let id = text(row, "jp_id")?;
    let date_active = text(row, "Date_Active").and_then(|d| parse_date(&d));
    let year = date_active
        .map(|d| d.year())
        .or_else(|| text(row, "joe_issue_ID").and_then(|issue| issue_year(&issue)));
    let (city, state, country) = split_location(text(row, "locations").as_deref());

    Some(JobRecord {
        id,
        title: text(row, "jp_title").unwrap_or_default(),
        institution: text(row, "jp_institution"),
        department: text(row, "jp_department"),
        section: text(row, "jp_section"),
        field: text(row, "JEL_Classifications"),
        city,
        state,
        country,
        year,
        date_active,
        deadline: text(row, "Application_deadline"),
        keywords: text(row, "jp_keywords"),
        description: text(row, "jp_full_text"),
        source_file: Some(source_file.to_string()),
    })
}

/// Trimmed, non-empty text of a cell. Integral numbers lose their `.0`.
fn text(row: &Row, key: &str) -> Option<String> {
    let value = match row.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!value.is_empty()).then_some(value)
}

/// Leading `YYYY-MM-DD` of a date or datetime string.
fn parse_date(value: &str) -> Option<NaiveDate> {
    value.get(..10)?.parse().ok()
}

/// Year prefix of an issue id such as `2025-02`.
fn issue_year(issue: &str) -> Option<i32> {
    let prefix = issue.split('-').next()?.trim();
    if prefix.len() == 4 && prefix.bytes().all(|b| b.is_ascii_digit()) {
        prefix.parse().ok()
    } else {
        None
    }
}

/// Split "City, State, Country". Two parts are city and country, one part
/// is the country.
fn split_location(location: Option<&str>) -> (Option<String>, Option<String>, Option<String>) {
    let Some(location) = location else {
        return (None, None, None);
    };
    // Multi-location postings list one location per line; keep the first.
    let first = location.lines().next().unwrap_or_default();
    let parts: Vec<String> = first
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    match parts.as_slice() {
        [] => (None, None, None),
        [country] => (None, None, Some(country.clone())),
        [city, country] => (Some(city.clone()), None, Some(country.clone())),
        [city, state, .., country] => {
            (Some(city.clone()), Some(state.clone()), Some(country.clone()))
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn maps_joe_columns() {
        let r = row(json!({
            "jp_id": 123456,
            "jp_title": " Assistant Professor ",
            "jp_institution": "Harvard University",
            "jp_department": "Economics",
            "jp_section": "US: Full-Time Academic",
            "locations": "Cambridge, Massachusetts, UNITED STATES",
            "JEL_Classifications": "C1 Econometrics\nJ2 Labor",
            "Application_deadline": "2024-11-15",
            "Date_Active": "2024-08-01 00:00:00",
            "jp_keywords": "labor",
            "jp_full_text": "We invite applications.",
        }));
        let record = record_from_row(&r, "joe_2024.json").unwrap();

        assert_eq!(record.id, "123456");
        assert_eq!(record.title, "Assistant Professor");
        assert_eq!(record.city.as_deref(), Some("Cambridge"));
        assert_eq!(record.state.as_deref(), Some("Massachusetts"));
        assert_eq!(record.country.as_deref(), Some("UNITED STATES"));
        assert_eq!(record.year, Some(2024));
        assert_eq!(record.date_active, NaiveDate::from_ymd_opt(2024, 8, 1));
        assert_eq!(record.field.as_deref(), Some("C1 Econometrics\nJ2 Labor"));
        assert_eq!(record.source_file.as_deref(), Some("joe_2024.json"));
    }

    #[test]
    fn year_falls_back_to_issue_id() {
        let r = row(json!({"jp_id": "7", "Date_Active": null, "joe_issue_ID": "2019-02"}));
        assert_eq!(record_from_row(&r, "f").unwrap().year, Some(2019));

        let r = row(json!({"jp_id": "8", "joe_issue_ID": "winter"}));
        assert_eq!(record_from_row(&r, "f").unwrap().year, None);
    }

    #[test]
    fn rows_without_id_are_dropped() {
        assert!(record_from_row(&row(json!({"jp_title": "x"})), "f").is_none());
        assert!(record_from_row(&row(json!({"jp_id": "  "})), "f").is_none());
    }

    #[test]
    fn location_shapes() {
        assert_eq!(
            split_location(Some("London, UNITED KINGDOM")),
            (Some("London".to_string()), None, Some("UNITED KINGDOM".to_string()))
        );
        assert_eq!(
            split_location(Some("CANADA")),
            (None, None, Some("CANADA".to_string()))
        );
        assert_eq!(
            split_location(Some("Austin, Texas, UNITED STATES\nDallas, Texas, UNITED STATES")).0,
            Some("Austin".to_string())
        );
        assert_eq!(split_location(None), (None, None, None));
    }

    #[test]
    fn spreadsheet_cells_become_json() {
        assert_eq!(cell_value(&Data::Int(7)), json!(7));
        assert_eq!(cell_value(&Data::Float(123456.0)), json!(123456.0));
        assert_eq!(cell_value(&Data::String("Yale".into())), json!("Yale"));
        assert_eq!(cell_value(&Data::Empty), Value::Null);
        assert_eq!(
            cell_value(&Data::DateTimeIso("2024-08-01T00:00:00".into())),
            json!("2024-08-01T00:00:00")
        );

        let r = row(json!({"jp_id": 123456.0, "Date_Active": "2024-08-01T00:00:00"}));
        let record = record_from_row(&r, "joe.xlsx").unwrap();
        assert_eq!(record.id, "123456");
        assert_eq!(record.year, Some(2024));
    }

    #[test]
    fn discover_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jsonl", "a.json", "notes.txt", "c.JSON", "d.xlsx", "e.csv"] {
            fs::write(dir.path().join(name), "[]").unwrap();
        }
        let names: Vec<String> = discover(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["a.json", "b.jsonl", "c.JSON", "d.xlsx"]);
    }
}
