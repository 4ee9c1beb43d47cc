use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A validated request could not be executed. Always a defect.
    #[error("Store invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Store not available: {0}")]
    Unavailable(String),
}
