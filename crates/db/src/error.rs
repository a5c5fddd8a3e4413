use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the store.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("unique constraint on {table}({}) violated", .columns.join(", "))]
    UniqueViolation { table: String, columns: Vec<String> },

    #[error("foreign key constraint violated")]
    ForeignKeyViolation,

    #[error("stored value in column '{column}' is invalid: {reason}")]
    Corrupt { column: &'static str, reason: String },

    #[error("i/o failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
}

impl DbError {
    pub fn corrupt(column: &'static str, reason: impl Into<String>) -> Self {
        DbError::Corrupt {
            column,
            reason: reason.into(),
        }
    }

    /// Whether this is a uniqueness violation over exactly `columns` of `table`.
    pub fn violates_unique(&self, table: &str, columns: &[&str]) -> bool {
        match self {
            DbError::UniqueViolation {
                table: violated,
                columns: violated_columns,
            } => violated == table && violated_columns.iter().eq(columns.iter()),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return unique_violation(db_err.message());
            }
            if db_err.is_foreign_key_violation() {
                return DbError::ForeignKeyViolation;
            }
        }
        DbError::Sqlx(err)
    }
}

/// SQLite names the offending columns, not the constraint:
/// `UNIQUE constraint failed: reviews.book_id, reviews.user_id`.
fn unique_violation(message: &str) -> DbError {
    let target = message
        .split_once(": ")
        .map_or(message, |(_, target)| target);

    let mut table = String::new();
    let mut columns = Vec::new();
    for qualified in target.split(',').map(str::trim) {
        match qualified.split_once('.') {
            Some((t, column)) => {
                table = t.to_string();
                columns.push(column.to_string());
            }
            None => columns.push(qualified.to_string()),
        }
    }

    DbError::UniqueViolation { table, columns }
}
