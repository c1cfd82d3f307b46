//! The read-only model catalog.

use crate::{CatalogConfig, ModelDescriptor, ModelRef};
use maestro_error::{CatalogError, MaestroResult};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Registry of backend model descriptors.
///
/// Built once from a validated `CatalogConfig`; read-only afterwards.
/// Lookup failures are configuration errors surfaced at startup, not at
/// call time.
///
/// # Examples
///
/// ```no_run
/// use maestro_catalog::{Catalog, CatalogConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let catalog = Catalog::from_config(CatalogConfig::load()?)?;
/// let descriptor = catalog.resolve("anthropic", "claude-3-5-sonnet")?;
/// println!("window: {}", descriptor.context_window_tokens());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Descriptors keyed by (provider, model)
    models: HashMap<(String, String), ModelDescriptor>,
    /// Default tier name per provider
    default_tiers: HashMap<String, String>,
}

impl Catalog {
    /// Build a catalog from configuration, validating every descriptor.
    ///
    /// # Errors
    ///
    /// Returns the first descriptor validation failure.
    #[instrument(skip(config))]
    pub fn from_config(config: CatalogConfig) -> MaestroResult<Self> {
        let mut models = HashMap::new();
        let mut default_tiers = HashMap::new();

        for (provider, entry) in config.providers {
            default_tiers.insert(provider.clone(), entry.default_tier);

            for (name, model) in entry.models {
                let descriptor = ModelDescriptor::new(
                    provider.clone(),
                    name.clone(),
                    model.context_window_tokens,
                    model.max_output_tokens,
                    model.price_per_million_input_tokens,
                    model.price_per_million_output_tokens,
                    model.rate_limits,
                )?;
                models.insert((provider.clone(), name), descriptor);
            }
        }

        debug!(model_count = models.len(), "Catalog built");
        Ok(Self {
            models,
            default_tiers,
        })
    }

    /// Look up a descriptor by provider and model id.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotFound` when no such descriptor is registered.
    pub fn resolve(&self, provider: &str, name: &str) -> Result<&ModelDescriptor, CatalogError> {
        self.models
            .get(&(provider.to_string(), name.to_string()))
            .ok_or_else(|| CatalogError::not_found(provider, name))
    }

    /// Look up a descriptor by reference.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotFound` when no such descriptor is registered.
    pub fn resolve_ref(&self, model: &ModelRef) -> Result<&ModelDescriptor, CatalogError> {
        self.resolve(&model.provider, &model.name)
    }

    /// All descriptors that define rate limits for the named tier.
    pub fn list_by_tier(&self, tier: &str) -> Vec<&ModelDescriptor> {
        let mut matching: Vec<&ModelDescriptor> = self
            .models
            .values()
            .filter(|descriptor| descriptor.rate_limits().contains_key(tier))
            .collect();
        matching.sort_by(|a, b| {
            (a.provider(), a.name()).cmp(&(b.provider(), b.name()))
        });
        matching
    }

    /// The configured default tier for a provider, if any.
    pub fn default_tier(&self, provider: &str) -> Option<&str> {
        self.default_tiers.get(provider).map(String::as_str)
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// True when no descriptors are registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
