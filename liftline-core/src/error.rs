//! Error types for Liftline.
//!
//! One hierarchy covers the whole fetch path. Errors are `Clone` because the
//! outcome of a single in-flight fetch is handed to every caller waiting on it.

use thiserror::Error;

/// Result type alias using `LiftlineError`.
pub type Result<T> = std::result::Result<T, LiftlineError>;

/// Main error type for all Liftline operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiftlineError {
    // ═══════════════════════════════════════════════════════════════════════════
    // ADMISSION
    // ═══════════════════════════════════════════════════════════════════════════

    /// The concurrency ceiling is reached. Not a fault; the caller may serve
    /// stale data instead.
    #[error("Temporarily unavailable: {0}")]
    Unavailable(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // FETCH ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Network, timeout, or navigation failure while fetching a resource.
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// The fetch completed but produced nothing usable.
    #[error("No data: {0}")]
    NoData(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// An operation exceeded its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // DISCOVERY ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// A discovery candidate failed its existence probe.
    #[error("Validation failed for '{url}': {reason}")]
    ValidationFailed { url: String, reason: String },

    /// No discovery strategy produced a valid source.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rendering or cropping a document failed.
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // BROWSER ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The shared browser could not be launched or is cooling down.
    #[error("Browser unavailable: {0}")]
    BrowserUnavailable(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // LOOKUP ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The requested resort key is not known.
    #[error("Unknown resort: {0}")]
    UnknownResort(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION & STORAGE
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION & INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl LiftlineError {
    /// Returns true if a later attempt may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LiftlineError::Unavailable(_)
                | LiftlineError::FetchFailed(_)
                | LiftlineError::HttpError(_)
                | LiftlineError::Timeout(_)
                | LiftlineError::BrowserUnavailable(_)
        )
    }

    /// Returns true for failures that count as "the fetch failed".
    ///
    /// Conversion and browser failures are fetch failures for the resource
    /// they were producing. Admission rejections and "nothing found" are not.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            LiftlineError::FetchFailed(_)
                | LiftlineError::HttpError(_)
                | LiftlineError::Timeout(_)
                | LiftlineError::ConversionFailed(_)
                | LiftlineError::BrowserUnavailable(_)
                | LiftlineError::JsonError(_)
                | LiftlineError::IoError(_)
        )
    }

    /// Shorthand for a validation failure.
    pub fn validation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        LiftlineError::ValidationFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for LiftlineError {
    fn from(err: serde_json::Error) -> Self {
        LiftlineError::JsonError(err.to_string())
    }
}

impl From<std::io::Error> for LiftlineError {
    fn from(err: std::io::Error) -> Self {
        LiftlineError::IoError(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for LiftlineError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        LiftlineError::Timeout(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LiftlineError::validation("https://x.test/map.jpg", "HTTP 404");
        assert!(err.to_string().contains("map.jpg"));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_error_classification() {
        assert!(LiftlineError::FetchFailed("x".into()).is_fetch_failure());
        assert!(LiftlineError::ConversionFailed("x".into()).is_fetch_failure());
        assert!(LiftlineError::BrowserUnavailable("x".into()).is_fetch_failure());
        assert!(!LiftlineError::Unavailable("x".into()).is_fetch_failure());
        assert!(!LiftlineError::NotFound("x".into()).is_fetch_failure());

        assert!(LiftlineError::Unavailable("x".into()).is_recoverable());
        assert!(!LiftlineError::UnknownResort("x".into()).is_recoverable());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid");
        let result: Result<serde_json::Value> = json_result.map_err(LiftlineError::from);
        assert!(matches!(result, Err(LiftlineError::JsonError(_))));
    }

    #[test]
    fn test_errors_are_shareable() {
        let err = LiftlineError::Timeout("navigation".into());
        let copy = err.clone();
        assert_eq!(err, copy);
    }
}
