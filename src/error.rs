//! Error types for Jaipp
//!
//! All errors in the library are converted to `AppError`.
//! Callers (the UI layer) match on the variant to decide how to
//! notify the user.

use thiserror::Error;

/// Library-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// No signed-in actor; raised before any remote call
    #[error("Not signed in")]
    NotAuthenticated,

    /// Insert collided with an existing relationship id
    #[error("Relationship already exists")]
    UniquenessViolation,

    /// Network or backend service failure
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// Target does not exist
    #[error("Resource not found")]
    NotFound,

    /// Caller supplied invalid input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend refused the request (4xx other than auth/conflict)
    #[error("Request rejected by backend: {0}")]
    Rejected(String),

    /// Row returned by the backend failed boundary validation
    #[error("Invalid data from backend: {0}")]
    InvalidData(String),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Stable label used for metrics and structured logs.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::NotAuthenticated => "not_authenticated",
            AppError::UniquenessViolation => "uniqueness_violation",
            AppError::RemoteUnavailable(_) => "remote_unavailable",
            AppError::NotFound => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Rejected(_) => "rejected",
            AppError::InvalidData(_) => "invalid_data",
            AppError::Database(_) => "database",
            AppError::HttpClient(_) => "http_client",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    /// Whether the failure came from the transport or backend rather than the caller.
    pub fn is_remote_unavailable(&self) -> bool {
        matches!(
            self,
            AppError::RemoteUnavailable(_) | AppError::Database(_) | AppError::HttpClient(_)
        )
    }

    /// Record this error in the error counter.
    pub(crate) fn record(&self, operation: &str) {
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL
            .with_label_values(&[self.error_type(), operation])
            .inc();
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
