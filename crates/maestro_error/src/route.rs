//! Routing error types.

use std::fmt;

/// Why one model in a fallback chain could not serve a request.
///
/// Collected per chain entry so that an exhausted chain can report the
/// reason each candidate was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFailure {
    /// Provider id of the failed candidate
    pub provider: String,
    /// Model id of the failed candidate
    pub model: String,
    /// Human-readable reason the candidate was rejected
    pub reason: String,
}

impl fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.provider, self.model, self.reason)
    }
}

/// Error kinds for request routing.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteErrorKind {
    /// The payload exceeds the model's context window. Never retried against
    /// the same model.
    CapabilityMismatch {
        /// Estimated tokens required by the payload
        required_tokens: u64,
        /// The model's context window in tokens
        context_window_tokens: u64,
    },
    /// The model's circuit breaker is open.
    BreakerOpen,
    /// Local tracker or provider predicts throttling beyond the wait budget.
    RateLimited {
        /// Predicted seconds until capacity frees up
        wait_seconds: f64,
    },
    /// Every model in the chain failed or was skipped.
    AllModelsExhausted(Vec<ModelFailure>),
    /// The caller-supplied deadline expired during a wait or call.
    DeadlineExceeded,
    /// The fallback chain passed to execute was empty.
    EmptyChain,
}

impl fmt::Display for RouteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteErrorKind::CapabilityMismatch {
                required_tokens,
                context_window_tokens,
            } => write!(
                f,
                "Payload needs ~{} tokens but context window is {}",
                required_tokens, context_window_tokens
            ),
            RouteErrorKind::BreakerOpen => write!(f, "Circuit breaker is open"),
            RouteErrorKind::RateLimited { wait_seconds } => {
                write!(f, "Rate limited, capacity frees in {:.1}s", wait_seconds)
            }
            RouteErrorKind::AllModelsExhausted(failures) => {
                write!(f, "All {} models exhausted: ", failures.len())?;
                for (i, failure) in failures.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", failure)?;
                }
                Ok(())
            }
            RouteErrorKind::DeadlineExceeded => write!(f, "Caller deadline exceeded"),
            RouteErrorKind::EmptyChain => write!(f, "Model chain is empty"),
        }
    }
}

/// Routing error with location tracking.
#[derive(Debug, Clone)]
pub struct RouteError {
    kind: RouteErrorKind,
    line: u32,
    file: &'static str,
}

impl RouteError {
    /// Create a new routing error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RouteErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &RouteErrorKind {
        &self.kind
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Route Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for RouteError {}

impl<T> From<T> for RouteError
where
    T: Into<RouteErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}
