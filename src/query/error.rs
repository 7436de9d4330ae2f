//! Query error types
//!
//! Data-quality problems never surface here: malformed records are
//! dropped at ingest and unknown types or stat ids simply vanish from the
//! result. These errors mark structurally invalid calls from the caller.

use thiserror::Error;

/// Errors that can occur during query execution
#[derive(Error, Debug)]
pub enum QueryError {
    /// Endpoint range with end not after start
    #[error("Invalid endpoint range: start {start} must be less than end {end}")]
    InvalidEndpoints { start: i64, end: i64 },

    /// Stats were requested without an endpoint window to compute them over
    #[error("Stats requested but no endpoints supplied")]
    MissingEndpoints,

    /// Active day outside 0..=6
    #[error("Invalid day of week: {0} (expected 0..=6)")]
    InvalidDayOfWeek(u8),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueryError::InvalidEndpoints { start: 10, end: 5 };
        assert_eq!(
            err.to_string(),
            "Invalid endpoint range: start 10 must be less than end 5"
        );

        let err = QueryError::MissingEndpoints;
        assert_eq!(err.to_string(), "Stats requested but no endpoints supplied");
    }
}
