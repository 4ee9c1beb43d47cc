use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schema::FilterField;

/// The SQLite table the loader writes and the store reads.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS jobs (
///     id           TEXT PRIMARY KEY,
///     title        TEXT NOT NULL,
///     institution  TEXT,
///     department   TEXT,
///     section      TEXT,
///     field        TEXT,
///     city         TEXT,
///     state        TEXT,
///     country      TEXT,
///     year         INTEGER,
///     date_active  TEXT,
///     deadline     TEXT,
///     keywords     TEXT,
///     description  TEXT,
///     source_file  TEXT
/// );
/// ```
///
/// `field` holds one JEL classification per line.
pub const JOBS_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS jobs (
    id           TEXT PRIMARY KEY,
    title        TEXT NOT NULL,
    institution  TEXT,
    department   TEXT,
    section      TEXT,
    field        TEXT,
    city         TEXT,
    state        TEXT,
    country      TEXT,
    year         INTEGER,
    date_active  TEXT,
    deadline     TEXT,
    keywords     TEXT,
    description  TEXT,
    source_file  TEXT
);
CREATE INDEX IF NOT EXISTS idx_jobs_year ON jobs(year);
CREATE INDEX IF NOT EXISTS idx_jobs_institution ON jobs(institution);
";

/// Column list in the order `JobRecord` is read and written.
pub const JOBS_COLUMNS: &str = "id, title, institution, department, section, field, city, state, \
country, year, date_active, deadline, keywords, description, source_file";

/// One job posting. Created by the loader, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct JobRecord {
    pub id: String,
    pub title: String,
    pub institution: Option<String>,
    pub department: Option<String>,
    pub section: Option<String>,
    /// JEL classifications, newline separated.
    pub field: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub year: Option<i32>,
    pub date_active: Option<NaiveDate>,
    pub deadline: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub source_file: Option<String>,
}

impl JobRecord {
    /// Text value of a filterable attribute. Year fields have no text value.
    pub fn text(&self, field: FilterField) -> Option<&str> {
        let value = match field {
            FilterField::Institution => self.institution.as_deref(),
            FilterField::Department => self.department.as_deref(),
            FilterField::Section => self.section.as_deref(),
            FilterField::Field => self.field.as_deref(),
            FilterField::Country => self.country.as_deref(),
            FilterField::State => self.state.as_deref(),
            FilterField::Keywords => self.keywords.as_deref(),
            FilterField::Year | FilterField::YearMin | FilterField::YearMax => None,
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }

    /// Individual JEL classification lines.
    pub fn field_codes(&self) -> impl Iterator<Item = &str> {
        self.field
            .as_deref()
            .unwrap_or_default()
            .split(['\n', '\r'])
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    /// "City, State, Country" with missing parts skipped.
    pub fn location(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.city, &self.state, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    pub fn project(&self) -> RecordProjection {
        RecordProjection {
            id: self.id.clone(),
            title: self.title.clone(),
            institution: self.institution.clone(),
            department: self.department.clone(),
            section: self.section.clone(),
            location: self.location(),
            year: self.year,
        }
    }
}

/// The subset of a record returned by `list` fetches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordProjection {
    pub id: String,
    pub title: String,
    pub institution: Option<String>,
    pub department: Option<String>,
    pub section: Option<String>,
    pub location: Option<String>,
    pub year: Option<i32>,
}
