//! Configuration structures for the model catalog.
//!
//! This module provides TOML-based configuration for model descriptors. The
//! configuration system supports:
//! - Bundled defaults (include_str! from maestro.toml)
//! - User overrides (./maestro.toml or ~/.config/maestro/maestro.toml)
//! - Automatic merging with user values taking precedence

use crate::RateLimitSpec;
use config::{Config, File, FileFormat};
use maestro_error::{ConfigError, MaestroError, MaestroResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// One model's descriptor fields as they appear in TOML.
///
/// The provider and model ids come from the enclosing table keys, so the
/// entry itself carries only capability and pricing data.
///
/// # Example
///
/// ```toml
/// [providers.anthropic.models."claude-3-5-sonnet"]
/// context_window_tokens = 200_000
/// max_output_tokens = 8_192
/// price_per_million_input_tokens = 3.0
/// price_per_million_output_tokens = 15.0
///
/// [providers.anthropic.models."claude-3-5-sonnet".rate_limits.tier1]
/// requests_per_minute = 5
/// tokens_per_minute = 20_000
/// requests_per_day = -1
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelEntry {
    /// Context window size in tokens
    pub context_window_tokens: u64,

    /// Maximum output tokens per call
    pub max_output_tokens: u64,

    /// Cost per million input tokens in USD
    #[serde(default)]
    pub price_per_million_input_tokens: f64,

    /// Cost per million output tokens in USD
    #[serde(default)]
    pub price_per_million_output_tokens: f64,

    /// Map of tier name to rate limit spec
    #[serde(default)]
    pub rate_limits: HashMap<String, RateLimitSpec>,
}

/// Configuration for a specific provider.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProviderEntry {
    /// Name of the default tier for this provider
    pub default_tier: String,

    /// Map of model id to model entry
    #[serde(default)]
    pub models: HashMap<String, ModelEntry>,
}

/// Top-level catalog configuration.
///
/// Loads model descriptors from TOML files with a precedence system:
/// 1. Bundled defaults (include_str! from maestro.toml)
/// 2. User override (./maestro.toml or ~/.config/maestro/maestro.toml)
///
/// # Example
///
/// ```no_run
/// use maestro_catalog::CatalogConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Load configuration (bundled defaults + user overrides)
/// let config = CatalogConfig::load()?;
/// assert!(config.providers.contains_key("anthropic"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct CatalogConfig {
    /// Map of provider name to provider configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
}

impl CatalogConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> MaestroResult<Self> {
        debug!("Loading catalog configuration from file");

        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                MaestroError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                MaestroError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Load configuration with precedence: user override > bundled default.
    ///
    /// Configuration sources in order of precedence (later sources override
    /// earlier):
    /// 1. Bundled defaults (maestro.toml shipped with library)
    /// 2. User config in home directory (~/.config/maestro/maestro.toml)
    /// 3. User config in current directory (./maestro.toml)
    ///
    /// User config files are optional and will be silently skipped if not
    /// found.
    #[instrument]
    pub fn load() -> MaestroResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        // Bundled default configuration
        const DEFAULT_CONFIG: &str = include_str!("../../../maestro.toml");

        let mut builder = Config::builder()
            // Start with bundled defaults
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        // Add user config from home directory (optional)
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/maestro/maestro.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        // Add user config from current directory (optional, highest precedence)
        builder = builder.add_source(File::with_name("maestro").required(false));

        // Build and deserialize
        builder
            .build()
            .map_err(|e| {
                MaestroError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                MaestroError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }
}
