//! Scanner agent error types

use thiserror::Error;

/// Result type for scanner operations
pub type Result<T> = std::result::Result<T, ScannerError>;

/// Scanner agent errors
#[derive(Debug, Error)]
pub enum ScannerError {
    /// Network request failed
    #[error("Network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP error status
    #[error("HTTP {status}: {message}")]
    HttpStatus {
        status: reqwest::StatusCode,
        message: String,
    },

    /// Retry limit exceeded
    #[error("Retry limit exceeded after {attempts} attempts")]
    RetryLimitExceeded { attempts: u32 },

    /// Client build error
    #[error("Failed to build HTTP client: {0}")]
    BuildError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive entry escaping the destination directory
    #[error("Unsafe path in archive: {0}")]
    UnsafePath(String),

    #[error("Job queue is full")]
    QueueFull,

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Reporting to the API was refused
    #[error("Report rejected: {0}")]
    Report(String),
}

impl ScannerError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ScannerError::RequestFailed(e) => e.is_timeout() || e.is_connect(),
            ScannerError::HttpStatus { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl From<clearance_domain::DomainError> for ScannerError {
    fn from(err: clearance_domain::DomainError) -> Self {
        Self::Report(err.to_string())
    }
}

impl From<walkdir::Error> for ScannerError {
    fn from(err: walkdir::Error) -> Self {
        Self::Io(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_server_side_statuses_are_retried() {
        let unavailable = ScannerError::HttpStatus {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            message: String::new(),
        };
        let rejected = ScannerError::HttpStatus {
            status: reqwest::StatusCode::BAD_REQUEST,
            message: String::new(),
        };
        assert!(unavailable.is_retryable());
        assert!(!rejected.is_retryable());
        assert!(!ScannerError::QueueFull.is_retryable());
    }
}
