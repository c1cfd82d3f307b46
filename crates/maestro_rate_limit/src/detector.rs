//! Auto-detection of rate limits from API response headers.
//!
//! Different providers advertise their limits through different header
//! conventions. Header detection reflects the account's actual current
//! limits rather than stale configuration, and updates automatically when
//! a tier upgrade lands.

use maestro_catalog::RateLimitSpec;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Limits extracted from a provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedLimits {
    /// Tier name inferred from the advertised numbers
    pub tier_name: String,
    /// The advertised limits
    pub spec: RateLimitSpec,
}

/// Detects and caches rate limits from API response headers.
///
/// # Example
///
/// ```rust,ignore
/// use maestro_rate_limit::HeaderLimitDetector;
///
/// let detector = HeaderLimitDetector::new();
///
/// // After making an API call
/// if let Some(detected) = detector.detect_anthropic(response.headers()).await {
///     println!("Detected tier: {}", detected.tier_name);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct HeaderLimitDetector {
    /// Cached detected limits (updated on each API call)
    detected: Arc<RwLock<Option<DetectedLimits>>>,
}

impl HeaderLimitDetector {
    /// Create a new header limit detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect rate limits from Anthropic response headers.
    ///
    /// Anthropic uses prefixed headers:
    /// - `anthropic-ratelimit-requests-limit`: RPM limit
    /// - `anthropic-ratelimit-tokens-limit`: TPM limit
    #[instrument(skip(self, headers))]
    pub async fn detect_anthropic(&self, headers: &HeaderMap) -> Option<DetectedLimits> {
        let rpm = parse_header_u32(headers, "anthropic-ratelimit-requests-limit")?;
        let tpm = parse_header_u64(headers, "anthropic-ratelimit-tokens-limit")?;
        debug!(rpm, tpm, "Detected Anthropic rate limits");

        // Tier names follow the published spend-based ladder.
        let tier_name = match (rpm, tpm) {
            (5, 20_000) => "tier1",
            (50, 40_000) => "tier2",
            (1000, 80_000) => "tier3",
            (2000, 160_000) => "tier4",
            _ => "custom",
        };

        let detected = DetectedLimits {
            tier_name: tier_name.to_string(),
            spec: RateLimitSpec {
                requests_per_minute: Some(rpm),
                tokens_per_minute: Some(tpm),
                requests_per_day: None, // Anthropic has no daily cap
            },
        };

        *self.detected.write().await = Some(detected.clone());
        Some(detected)
    }

    /// Detect rate limits from OpenAI response headers.
    ///
    /// OpenAI uses detailed rate limit headers:
    /// - `x-ratelimit-limit-requests`: RPM limit
    /// - `x-ratelimit-limit-tokens`: TPM limit
    #[instrument(skip(self, headers))]
    pub async fn detect_openai(&self, headers: &HeaderMap) -> Option<DetectedLimits> {
        let rpm = parse_header_u32(headers, "x-ratelimit-limit-requests")?;
        let tpm = parse_header_u64(headers, "x-ratelimit-limit-tokens")?;
        debug!(rpm, tpm, "Detected OpenAI rate limits");

        let (tier_name, rpd) = match (rpm, tpm) {
            (3, 40_000) => ("free", Some(200)),
            (500, 200_000) => ("tier1", None),
            (5000, 2_000_000) => ("tier2", None),
            (10000, 10_000_000) => ("tier3", None),
            (10000, 100_000_000) => ("tier5", None),
            _ => ("custom", None),
        };

        let detected = DetectedLimits {
            tier_name: tier_name.to_string(),
            spec: RateLimitSpec {
                requests_per_minute: Some(rpm),
                tokens_per_minute: Some(tpm),
                requests_per_day: rpd,
            },
        };

        *self.detected.write().await = Some(detected.clone());
        Some(detected)
    }

    /// Detect rate limits from Gemini/Google AI response headers.
    ///
    /// Gemini exposes only `x-ratelimit-limit`; TPM and RPD are inferred
    /// from the advertised RPM.
    #[instrument(skip(self, headers))]
    pub async fn detect_gemini(&self, headers: &HeaderMap) -> Option<DetectedLimits> {
        let rpm = parse_header_u32(headers, "x-ratelimit-limit")?;
        debug!(rpm, "Detected Gemini RPM from x-ratelimit-limit header");

        let (tpm, rpd, tier_name) = if rpm <= 10 {
            (Some(250_000), Some(250), "free")
        } else if rpm <= 360 {
            (Some(4_000_000), None, "payasyougo")
        } else {
            (None, None, "custom")
        };

        let detected = DetectedLimits {
            tier_name: tier_name.to_string(),
            spec: RateLimitSpec {
                requests_per_minute: Some(rpm),
                tokens_per_minute: tpm,
                requests_per_day: rpd,
            },
        };

        *self.detected.write().await = Some(detected.clone());
        Some(detected)
    }

    /// Get last detected limits from cache.
    pub async fn get_cached(&self) -> Option<DetectedLimits> {
        self.detected.read().await.clone()
    }

    /// Clear the cached detected limits, forcing fresh detection on the
    /// next call.
    pub async fn clear_cache(&self) {
        *self.detected.write().await = None;
    }
}

/// Helper to parse u32 from header value.
fn parse_header_u32(headers: &HeaderMap, key: &str) -> Option<u32> {
    headers.get(key)?.to_str().ok()?.parse().ok()
}

/// Helper to parse u64 from header value.
fn parse_header_u64(headers: &HeaderMap, key: &str) -> Option<u64> {
    headers.get(key)?.to_str().ok()?.parse().ok()
}
