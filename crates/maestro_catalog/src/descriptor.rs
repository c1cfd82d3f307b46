//! Model descriptors and references.

use crate::RateLimitSpec;
use maestro_error::{CatalogError, CatalogErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Reference to one callable backend variant.
///
/// Fallback chains are ordered lists of these.
///
/// # Examples
///
/// ```
/// use maestro_catalog::ModelRef;
///
/// let primary = ModelRef::new("anthropic", "claude-3-5-sonnet");
/// assert_eq!(format!("{}", primary), "anthropic/claude-3-5-sonnet");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    /// Provider id (e.g., "anthropic", "openai", "gemini")
    pub provider: String,
    /// Model id (e.g., "claude-3-5-sonnet")
    pub name: String,
}

impl ModelRef {
    /// Create a new model reference.
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.name)
    }
}

/// Static description of one callable backend variant.
///
/// Loaded once at process start from configuration and immutable
/// thereafter; the catalog hands out shared references only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct ModelDescriptor {
    /// Provider id
    provider: String,
    /// Model id
    name: String,
    /// Context window size in tokens
    context_window_tokens: u64,
    /// Maximum output tokens per call
    max_output_tokens: u64,
    /// Cost per million input tokens in USD
    price_per_million_input_tokens: f64,
    /// Cost per million output tokens in USD
    price_per_million_output_tokens: f64,
    /// Map of tier name to rate limit spec
    rate_limits: HashMap<String, RateLimitSpec>,
}

impl ModelDescriptor {
    /// Create a descriptor, validating its invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDescriptor` when the context window is zero or a
    /// price is negative.
    pub fn new(
        provider: impl Into<String>,
        name: impl Into<String>,
        context_window_tokens: u64,
        max_output_tokens: u64,
        price_per_million_input_tokens: f64,
        price_per_million_output_tokens: f64,
        rate_limits: HashMap<String, RateLimitSpec>,
    ) -> Result<Self, CatalogError> {
        let descriptor = Self {
            provider: provider.into(),
            name: name.into(),
            context_window_tokens,
            max_output_tokens,
            price_per_million_input_tokens,
            price_per_million_output_tokens,
            rate_limits,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Check descriptor invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDescriptor` naming the violated constraint.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.context_window_tokens == 0 {
            return Err(self.invalid("context_window_tokens must be > 0"));
        }
        if self.price_per_million_input_tokens < 0.0 {
            return Err(self.invalid("price_per_million_input_tokens must be >= 0"));
        }
        if self.price_per_million_output_tokens < 0.0 {
            return Err(self.invalid("price_per_million_output_tokens must be >= 0"));
        }
        Ok(())
    }

    /// Rate limits for a named tier.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTier` when the tier is not configured for this model.
    pub fn limits_for_tier(&self, tier: &str) -> Result<&RateLimitSpec, CatalogError> {
        self.rate_limits.get(tier).ok_or_else(|| {
            CatalogError::new(CatalogErrorKind::UnknownTier {
                tier: tier.to_string(),
                provider: self.provider.clone(),
                model: self.name.clone(),
            })
        })
    }

    /// Reference to this descriptor.
    pub fn model_ref(&self) -> ModelRef {
        ModelRef::new(&self.provider, &self.name)
    }

    #[track_caller]
    fn invalid(&self, reason: &str) -> CatalogError {
        CatalogError::new(CatalogErrorKind::InvalidDescriptor {
            provider: self.provider.clone(),
            model: self.name.clone(),
            reason: reason.to_string(),
        })
    }
}
