//! Error types for the analytics service.

use std::time::Duration;

use chrono::{DateTime, Utc};
use gut_tracker_client::RepositoryError;
use thiserror::Error;

/// Analytics errors.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid date range: end {end} is before start {start}")]
    InvalidDateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("{analysis} analysis failed: {message}")]
    AnalysisFailed {
        analysis: &'static str,
        message: String,
    },

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Invalid analysis type: {0}")]
    InvalidAnalysisType(String),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),

    #[error("Record fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Record fetch cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<RepositoryError> for AnalyticsError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Unauthorized(msg) => AnalyticsError::NotAuthorized(msg),
            other => AnalyticsError::Repository(other),
        }
    }
}

impl AnalyticsError {
    /// Short label used for the `outcome` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDateRange { .. } => "invalid_date_range",
            Self::InsufficientData(_) => "insufficient_data",
            Self::AnalysisFailed { .. } => "analysis_failed",
            Self::NotAuthorized(_) => "not_authorized",
            Self::InvalidAnalysisType(_) => "invalid_analysis_type",
            Self::Repository(_) => "repository",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "config",
        }
    }
}

/// Result type alias for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_passes_through() {
        let err: AnalyticsError = RepositoryError::Unauthorized("user u2".into()).into();
        assert!(matches!(err, AnalyticsError::NotAuthorized(ref m) if m == "user u2"));
        assert_eq!(err.kind(), "not_authorized");
    }

    #[test]
    fn other_repository_errors_are_wrapped() {
        let err: AnalyticsError = RepositoryError::NotFound("meals".into()).into();
        assert!(matches!(err, AnalyticsError::Repository(RepositoryError::NotFound(_))));
    }
}
