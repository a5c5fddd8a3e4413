//! Project-specific utilities live here.

use lectern_db::DbError;
use lectern_http::error::AppError;
use serde_json::{json, Value};
use time::OffsetDateTime;

/// Current UTC time, the clock every persisted timestamp comes from.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Timestamps are stored as integer nanoseconds since the Unix epoch, so
/// they order correctly in SQL.
pub fn to_unix_nanos(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos()).unwrap_or(i64::MAX)
}

pub fn from_unix_nanos(column: &'static str, nanos: i64) -> Result<OffsetDateTime, DbError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
        .map_err(|e| DbError::corrupt(column, e.to_string()))
}

/// Collects field violations so one request reports all of them at once.
#[derive(Debug, Default)]
pub struct Violations(Vec<Value>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, error: impl Into<String>) {
        self.0.push(json!({ "field": field, "error": error.into() }));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trimmed, required text field with character-count bounds.
    pub fn text(
        &mut self,
        field: &str,
        value: Option<&str>,
        min: usize,
        max: usize,
    ) -> Option<String> {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            self.add(field, "is required");
            return None;
        };

        let len = value.chars().count();
        if len < min {
            self.add(field, format!("must be at least {min} characters long"));
            None
        } else if len > max {
            self.add(field, format!("cannot be more than {max} characters"));
            None
        } else {
            Some(value.to_string())
        }
    }

    /// Fail with every collected violation, or hand back `value`.
    pub fn finish<T>(self, value: impl FnOnce() -> Option<T>) -> Result<T, AppError> {
        if !self.0.is_empty() {
            return Err(AppError::validation(self.0, "Validation failed"));
        }
        value().ok_or_else(|| AppError::validation(Vec::new(), "Validation failed"))
    }
}
