//! Keyed sliding-window rate limit tracker.

use crate::{Decision, UsageWindow};
use chrono::{DateTime, Utc};
use maestro_catalog::{ModelRef, RateLimitSpec};
use maestro_core::BudgetMultipliers;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

/// Identifies one `(provider, model, tier)` usage window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsageKey {
    /// Provider id
    pub provider: String,
    /// Model id
    pub model: String,
    /// Tier name
    pub tier: String,
}

impl UsageKey {
    /// Create a new usage key.
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        tier: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            tier: tier.into(),
        }
    }

    /// Key for a model reference at a tier.
    pub fn from_ref(model: &ModelRef, tier: impl Into<String>) -> Self {
        Self::new(&model.provider, &model.name, tier)
    }
}

impl fmt::Display for UsageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.provider, self.model, self.tier)
    }
}

/// Thread-safe sliding-window usage tracker.
///
/// One lock-guarded `UsageWindow` per key; the outer map lock is held only
/// long enough to find or insert an entry, so unrelated models never
/// serialize on each other. Budget multipliers scale the effective limits
/// before every decision.
///
/// # Examples
///
/// ```
/// use maestro_catalog::RateLimitSpec;
/// use maestro_rate_limit::{RateLimitTracker, UsageKey};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let tracker = RateLimitTracker::new();
/// let key = UsageKey::new("anthropic", "claude-3-5-sonnet", "tier1");
/// let spec = RateLimitSpec {
///     requests_per_minute: Some(5),
///     tokens_per_minute: Some(20_000),
///     requests_per_day: None,
/// };
///
/// let decision = tracker.can_proceed(&key, &spec, 1_000);
/// assert!(decision.allowed);
/// tracker.record_usage(&key, 1_000);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    /// Per-key windows; outer lock guards map shape only
    windows: Mutex<HashMap<UsageKey, Arc<Mutex<UsageWindow>>>>,
    /// Fractional scaling applied to every limit
    multipliers: BudgetMultipliers,
}

impl RateLimitTracker {
    /// Create a tracker using full configured quotas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker that scales limits by the given multipliers.
    pub fn with_multipliers(multipliers: BudgetMultipliers) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            multipliers,
        }
    }

    /// Can this key accept one more request consuming `estimated_tokens`?
    ///
    /// Returns a zero wait when allowed; otherwise the time until enough
    /// window entries age out to free the needed capacity.
    #[instrument(skip(self, spec))]
    pub fn can_proceed(
        &self,
        key: &UsageKey,
        spec: &RateLimitSpec,
        estimated_tokens: u64,
    ) -> Decision {
        self.can_proceed_at(key, spec, estimated_tokens, Instant::now(), Utc::now())
    }

    /// Record one completed call consuming `tokens_consumed`.
    ///
    /// Invoked only after a call actually completed (success, or a failure
    /// that still consumed provider quota).
    #[instrument(skip(self))]
    pub fn record_usage(&self, key: &UsageKey, tokens_consumed: u64) {
        self.record_usage_at(key, tokens_consumed, Instant::now(), Utc::now());
    }

    /// Decision variant taking explicit clocks.
    pub fn can_proceed_at(
        &self,
        key: &UsageKey,
        spec: &RateLimitSpec,
        estimated_tokens: u64,
        now: Instant,
        now_utc: DateTime<Utc>,
    ) -> Decision {
        let effective = self.effective_spec(spec);
        let window = self.window(key, now_utc);
        let mut window = lock(&window);
        let decision = window.decide(now, now_utc, &effective, estimated_tokens);
        trace!(
            %key,
            allowed = decision.allowed,
            wait_seconds = decision.wait_seconds(),
            "Capacity decision"
        );
        decision
    }

    /// Record variant taking explicit clocks.
    pub fn record_usage_at(
        &self,
        key: &UsageKey,
        tokens_consumed: u64,
        now: Instant,
        now_utc: DateTime<Utc>,
    ) {
        let window = self.window(key, now_utc);
        let mut window = lock(&window);
        window.record(now, now_utc, tokens_consumed);
        debug!(%key, tokens_consumed, "Usage recorded");
    }

    /// Snapshot of tokens currently counted in a key's window.
    pub fn tokens_in_window(&self, key: &UsageKey) -> u64 {
        let window = self.window(key, Utc::now());
        let window = lock(&window);
        window.tokens_in_window()
    }

    /// Apply budget multipliers to a configured spec.
    fn effective_spec(&self, spec: &RateLimitSpec) -> RateLimitSpec {
        RateLimitSpec {
            requests_per_minute: spec
                .requests_per_minute
                .map(|rpm| self.multipliers.apply_rpm(rpm)),
            tokens_per_minute: spec
                .tokens_per_minute
                .map(|tpm| self.multipliers.apply_tpm(tpm)),
            requests_per_day: spec
                .requests_per_day
                .map(|rpd| self.multipliers.apply_rpd(rpd)),
        }
    }

    /// Find or create the window for a key.
    fn window(&self, key: &UsageKey, now_utc: DateTime<Utc>) -> Arc<Mutex<UsageWindow>> {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            windows
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(UsageWindow::new(now_utc.date_naive())))),
        )
    }
}

/// Lock a window, recovering from poisoning.
fn lock(window: &Arc<Mutex<UsageWindow>>) -> std::sync::MutexGuard<'_, UsageWindow> {
    window
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
