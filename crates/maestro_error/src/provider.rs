//! Provider error types and retry classification.

/// Provider-reported error conditions.
///
/// These represent failures surfaced by a backend during a call attempt.
/// The router never inspects provider error text directly; classification
/// goes through these typed kinds.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum ProviderErrorKind {
    /// Provider reported throttling (HTTP 429 or equivalent)
    #[display("Rate limited by provider (retry after {:?}s)", retry_after_seconds)]
    RateLimited {
        /// Provider-suggested wait before retrying, when advertised
        retry_after_seconds: Option<f64>,
    },
    /// HTTP error with status code and message
    #[display("HTTP {} error: {}", status_code, message)]
    Http {
        /// HTTP status code
        status_code: u16,
        /// Error message body
        message: String,
    },
    /// Request timed out before the provider answered
    #[display("Request timed out after {}s", elapsed_seconds)]
    Timeout {
        /// Seconds elapsed before giving up
        elapsed_seconds: f64,
    },
    /// Connection-level failure (DNS, TLS, refused)
    #[display("Connection failed: {}", _0)]
    Connection(String),
    /// Credentials rejected by the provider
    #[display("Authentication failed: {}", _0)]
    Auth(String),
    /// The provider rejected the request as malformed
    #[display("Invalid request: {}", _0)]
    InvalidRequest(String),
    /// Response body could not be decoded
    #[display("Failed to parse provider response: {}", _0)]
    Parse(String),
}

impl ProviderErrorKind {
    /// Check if this error type should be retried against the same model.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderErrorKind::RateLimited { .. } => true,
            ProviderErrorKind::Http { status_code, .. } => {
                matches!(*status_code, 408 | 429 | 500 | 502 | 503 | 504)
            }
            ProviderErrorKind::Timeout { .. } => true,
            ProviderErrorKind::Connection(_) => true,
            _ => false,
        }
    }
}

/// Provider error with source location tracking.
///
/// # Examples
///
/// ```
/// use maestro_error::{ProviderError, ProviderErrorKind};
///
/// let err = ProviderError::new(ProviderErrorKind::RateLimited {
///     retry_after_seconds: Some(30.0),
/// });
/// assert!(format!("{}", err).contains("Rate limited"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Provider Error: {} at {}:{}", kind, file, line)]
pub struct ProviderError {
    /// The kind of error that occurred
    pub kind: ProviderErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ProviderError {
    /// Create a new ProviderError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ProviderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

/// Trait for errors that support retry logic.
///
/// This trait allows error types to specify whether they should trigger a
/// retry against the same backend. Transient conditions like 503 (service
/// unavailable), 429 (rate limit), or network timeouts return true.
/// Permanent conditions like 401 (unauthorized) or 400 (bad request) return
/// false.
///
/// # Examples
///
/// ```
/// use maestro_error::{ProviderError, ProviderErrorKind, RetryableError};
///
/// let err = ProviderError::new(ProviderErrorKind::Http {
///     status_code: 503,
///     message: "Service unavailable".to_string(),
/// });
/// assert!(err.is_retryable());
/// ```
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for ProviderError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
