//! Trait definitions for LLM backends.

use async_trait::async_trait;
use maestro_catalog::ModelRef;
use maestro_core::{GenerateRequest, GenerateResponse, TokenUsage};
use maestro_error::ProviderError;
use std::collections::HashMap;
use std::sync::Arc;

/// A backend call's payload plus its token accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    /// The generated output
    pub response: GenerateResponse,
    /// Token usage reported by (or measured for) the call
    pub usage: TokenUsage,
}

/// Core trait every callable backend must implement.
///
/// The router treats provider request/response formats as opaque beyond
/// token accounting and typed errors; implementations own the wire
/// protocol.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Issue one generation call.
    async fn generate(&self, req: &GenerateRequest) -> Result<BackendResponse, ProviderError>;

    /// Provider id (e.g., "anthropic", "openai", "gemini").
    fn provider_name(&self) -> &str;

    /// Model id (e.g., "claude-3-5-sonnet").
    fn model_name(&self) -> &str;
}

/// Registry of backends keyed by provider and model id.
///
/// Built once at startup; the router only reads it.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<(String, String), Arc<dyn ModelBackend>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its own provider/model ids.
    pub fn register(&mut self, backend: Arc<dyn ModelBackend>) {
        let key = (
            backend.provider_name().to_string(),
            backend.model_name().to_string(),
        );
        self.backends.insert(key, backend);
    }

    /// Look up the backend for a model reference.
    pub fn get(&self, model: &ModelRef) -> Option<Arc<dyn ModelBackend>> {
        self.backends
            .get(&(model.provider.clone(), model.name.clone()))
            .map(Arc::clone)
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// True when no backends are registered.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}
