use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// A unique column already holds this value. Carries the column name.
    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    Lock,
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Map a unique-constraint failure on one of `columns` (given as
    /// `table.column`) to [`DbError::Conflict`]. Other errors pass through.
    pub(crate) fn unique_violation(err: rusqlite::Error, columns: &[(&str, &'static str)]) -> Self {
        if let rusqlite::Error::SqliteFailure(code, Some(msg)) = &err {
            if code.code == ErrorCode::ConstraintViolation {
                for &(qualified, field) in columns {
                    if msg.contains(qualified) {
                        return DbError::Conflict(field);
                    }
                }
            }
        }
        DbError::Sqlite(err)
    }
}
