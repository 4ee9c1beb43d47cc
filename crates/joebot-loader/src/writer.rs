use std::path::Path;

use joebot_models::{JobRecord, JOBS_COLUMNS, JOBS_TABLE_DDL};
use rusqlite::Connection;
use tracing::debug;

use crate::error::LoaderError;

/// Writable connection to the jobs database.
///
/// WAL journal lets `joebot` keep reading while an import runs.
pub struct JobWriter {
    conn: Connection,
}

impl JobWriter {
    /// Open (or create) the database and its schema.
    pub fn open(path: &str) -> Result<Self, LoaderError> {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(JOBS_TABLE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> Result<Self, LoaderError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(JOBS_TABLE_DDL)?;
        Ok(Self { conn })
    }

    /// Write `records` in one transaction, replacing rows with the same id.
    /// Nothing is written if any insert fails.
    pub fn write_all(
        &mut self,
        records: &[JobRecord],
        batch_size: usize,
    ) -> Result<usize, LoaderError> {
        let batch_size = batch_size.max(1);
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT OR REPLACE INTO jobs ({JOBS_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ))?;
            for (i, record) in records.iter().enumerate() {
                stmt.execute(rusqlite::params![
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
                ])?;
                if (i + 1) % batch_size == 0 {
                    debug!(written = i + 1, total = records.len(), "Import progress");
                }
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Count all rows in the jobs table.
    pub fn count(&self) -> Result<usize, LoaderError> {
        let count: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(count)
    }
}
