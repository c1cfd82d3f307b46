//! Tests for the catalog configuration system.

use maestro_catalog::{Catalog, CatalogConfig};

#[test]
fn test_load_bundled_defaults() {
    let config = CatalogConfig::load().unwrap();

    // Should have at least the Anthropic provider
    assert!(config.providers.contains_key("anthropic"));

    // Anthropic should ship a sonnet descriptor
    let anthropic = &config.providers["anthropic"];
    assert!(anthropic.models.contains_key("claude-3-5-sonnet"));

    // Descriptor should carry the expected capability data
    let sonnet = &anthropic.models["claude-3-5-sonnet"];
    assert_eq!(sonnet.context_window_tokens, 200_000);
    assert_eq!(sonnet.price_per_million_input_tokens, 3.0);

    // Tier 1 limits match the published numbers
    let tier1 = &sonnet.rate_limits["tier1"];
    assert_eq!(tier1.requests_per_minute, Some(5));
    assert_eq!(tier1.tokens_per_minute, Some(20_000));
    assert_eq!(tier1.requests_per_day, None); // -1 sentinel in TOML
}

#[test]
fn test_bundled_defaults_build_a_catalog() {
    let config = CatalogConfig::load().unwrap();
    let catalog = Catalog::from_config(config).unwrap();

    assert!(!catalog.is_empty());
    assert!(catalog.resolve("gemini", "gemini-2.0-flash").is_ok());
    assert_eq!(catalog.default_tier("anthropic"), Some("tier1"));

    // Gemini free tier includes a daily cap
    let flash = catalog.resolve("gemini", "gemini-2.0-flash").unwrap();
    let free = flash.limits_for_tier("free").unwrap();
    assert_eq!(free.requests_per_day, Some(250));
}

#[test]
fn test_config_from_file() {
    use std::io::Write;
    use tempfile::Builder;

    // Create a temporary config file with .toml extension
    let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        temp_file,
        r#"
[providers.test]
default_tier = "custom"

[providers.test.models."test-model"]
context_window_tokens = 32_000
max_output_tokens = 4_096
price_per_million_input_tokens = 1.0
price_per_million_output_tokens = 2.0

[providers.test.models."test-model".rate_limits.custom]
requests_per_minute = 42
tokens_per_minute = 999_000
requests_per_day = -1
"#
    )
    .unwrap();

    // Load config from the temporary file
    let config = CatalogConfig::from_file(temp_file.path()).unwrap();
    let catalog = Catalog::from_config(config).unwrap();

    let descriptor = catalog.resolve("test", "test-model").unwrap();
    let limits = descriptor.limits_for_tier("custom").unwrap();
    assert_eq!(limits.requests_per_minute, Some(42));
    assert_eq!(limits.tokens_per_minute, Some(999_000));
    assert_eq!(limits.requests_per_day, None);
}
