use std::path::Path;

use chrono::NaiveDate;
use joebot_models::{JobRecord, JOBS_COLUMNS, JOBS_TABLE_DDL};
use rusqlite::{Connection, OpenFlags, Row};

use crate::error::StoreError;

/// Read-only access to the jobs database written by `joebot-loader`.
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    /// Open a read-only connection. A missing file is `Unavailable`: run
    /// `joebot-loader` first.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        if !Path::new(path).is_file() {
            return Err(StoreError::Unavailable(format!(
                "no jobs database at {path}"
            )));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database with the jobs table created.
    /// The in-memory DB is writable so tests can seed data.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(JOBS_TABLE_DDL)?;
        Ok(Self { conn })
    }

    /// Every row, in id order.
    pub fn load_all(&self) -> Result<Vec<JobRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {JOBS_COLUMNS} FROM jobs ORDER BY id"))?;
        let records = stmt
            .query_map([], read_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or_default())
    }

    /// Insert a record. In production the loader writes the database; this
    /// exists for tests.
    pub fn insert(&self, record: &JobRecord) -> Result<(), StoreError> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO jobs ({JOBS_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            rusqlite::params![
                record.id,
                record.title,
                record.institution,
                record.department,
                record.section,
                record.field,
                record.city,
                record.state,
                record.country,
                record.year,
                record.date_active,
                record.deadline,
                record.keywords,
                record.description,
                record.source_file,
            ],
        )?;
        Ok(())
    }
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    // Dates from older exports are not always ISO formatted.
    let date_active: Option<String> = row.get(10)?;
    Ok(JobRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        institution: row.get(2)?,
        department: row.get(3)?,
        section: row.get(4)?,
        field: row.get(5)?,
        city: row.get(6)?,
        state: row.get(7)?,
        country: row.get(8)?,
        year: row.get(9)?,
        date_active: date_active.and_then(|d| d.get(..10)?.parse::<NaiveDate>().ok()),
        deadline: row.get(11)?,
        keywords: row.get(12)?,
        description: row.get(13)?,
        source_file: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(id: &str, institution: &str, year: i32) -> JobRecord {
        JobRecord {
            id: id.to_string(),
            title: "Assistant Professor".to_string(),
            institution: Some(institution.to_string()),
            year: Some(year),
            date_active: NaiveDate::from_ymd_opt(year, 9, 1),
            ..Default::default()
        }
    }

    #[test]
    fn insert_and_load() {
        let source = SqliteSource::open_in_memory().unwrap();
        source.insert(&make_record("b", "MIT", 2024)).unwrap();
        source.insert(&make_record("a", "Harvard", 2023)).unwrap();

        let records = source.load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a");
        assert_eq!(records[0].date_active, NaiveDate::from_ymd_opt(2023, 9, 1));
        assert_eq!(source.count().unwrap(), 2);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = SqliteSource::open("/nonexistent/joebot/jobs.db").err().unwrap();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.to_string().contains("/nonexistent/joebot/jobs.db"));
    }

    #[test]
    fn insert_replaces_same_id() {
        let source = SqliteSource::open_in_memory().unwrap();
        source.insert(&make_record("a", "MIT", 2024)).unwrap();
        source.insert(&make_record("a", "Harvard", 2024)).unwrap();

        let records = source.load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].institution.as_deref(), Some("Harvard"));
    }

    #[test]
    fn empty_database_loads_nothing() {
        let source = SqliteSource::open_in_memory().unwrap();
        assert!(source.load_all().unwrap().is_empty());
    }

    #[test]
    fn open_missing_file_fails() {
        assert!(SqliteSource::open("/nonexistent/dir/jobs.db").is_err());
    }
}
