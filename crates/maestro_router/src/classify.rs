//! Typed error classification per provider.
//!
//! The router's retry logic never matches on provider error text; each
//! provider gets a classifier that maps its typed errors onto a retry
//! disposition. The provider's live signal always takes precedence over
//! the local tracker's prediction.

use maestro_error::{ProviderError, ProviderErrorKind};

/// What the router should do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorDisposition {
    /// Throttled: back off and retry the same model.
    RateLimited {
        /// Provider-suggested wait, when advertised
        retry_after_seconds: Option<f64>,
    },
    /// Transient provider trouble: advance the chain, charge the breaker.
    Transient,
    /// Permanent for this model: advance the chain, charge the breaker.
    Terminal,
}

impl ErrorDisposition {
    /// Short label for telemetry.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorDisposition::RateLimited { .. } => "rate_limited",
            ErrorDisposition::Transient => "transient",
            ErrorDisposition::Terminal => "terminal",
        }
    }
}

/// Maps a provider error onto a retry disposition.
pub trait ErrorClassifier: Send + Sync {
    /// Classify one failed attempt.
    fn classify(&self, error: &ProviderError) -> ErrorDisposition;
}

/// Status-code based classifier usable with any HTTP provider.
///
/// 429 is a rate limit; 408 and 5xx are transient; everything else is
/// terminal for the model.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusClassifier;

impl ErrorClassifier for StatusClassifier {
    fn classify(&self, error: &ProviderError) -> ErrorDisposition {
        match &error.kind {
            ProviderErrorKind::RateLimited {
                retry_after_seconds,
            } => ErrorDisposition::RateLimited {
                retry_after_seconds: *retry_after_seconds,
            },
            ProviderErrorKind::Http { status_code, .. } => match status_code {
                429 => ErrorDisposition::RateLimited {
                    retry_after_seconds: None,
                },
                408 | 500 | 502 | 503 | 504 => ErrorDisposition::Transient,
                _ => ErrorDisposition::Terminal,
            },
            ProviderErrorKind::Timeout { .. } => ErrorDisposition::Transient,
            ProviderErrorKind::Connection(_) => ErrorDisposition::Transient,
            _ => ErrorDisposition::Terminal,
        }
    }
}

/// Classifier for the Anthropic API.
///
/// Anthropic additionally signals overload with 529, which is transient,
/// not a quota problem.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicClassifier;

impl ErrorClassifier for AnthropicClassifier {
    fn classify(&self, error: &ProviderError) -> ErrorDisposition {
        if let ProviderErrorKind::Http {
            status_code: 529, ..
        } = &error.kind
        {
            return ErrorDisposition::Transient;
        }
        StatusClassifier.classify(error)
    }
}

/// Classifier for OpenAI-compatible APIs.
///
/// OpenAI reuses 429 for both throttling and an exhausted prepaid quota;
/// the latter is reported as `insufficient_quota` and no amount of waiting
/// fixes it.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiClassifier;

impl ErrorClassifier for OpenAiClassifier {
    fn classify(&self, error: &ProviderError) -> ErrorDisposition {
        if let ProviderErrorKind::Http {
            status_code: 429,
            message,
        } = &error.kind
        {
            if message.contains("insufficient_quota") {
                return ErrorDisposition::Terminal;
            }
        }
        StatusClassifier.classify(error)
    }
}

/// Classifier for the Gemini API.
///
/// Gemini reports throttling as 429 RESOURCE_EXHAUSTED and rolling
/// overload as 503; both map onto the standard dispositions.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiClassifier;

impl ErrorClassifier for GeminiClassifier {
    fn classify(&self, error: &ProviderError) -> ErrorDisposition {
        StatusClassifier.classify(error)
    }
}
