//! Per-model circuit breakers.
//!
//! A breaker suspends calls to a model that is persistently erroring for
//! reasons unrelated to rate limiting (bad auth, provider outage), so the
//! retry budget is spent on legitimate rate-limit waits instead.

use maestro_catalog::ModelRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Breaker thresholds and cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens (default 5)
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds an open breaker waits before allowing a trial call (default 60)
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// Consecutive half-open successes required to close (default 1)
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_seconds() -> u64 {
    60
}

fn default_success_threshold() -> u32 {
    1
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_seconds: default_cooldown_seconds(),
            success_threshold: default_success_threshold(),
        }
    }
}

impl BreakerConfig {
    /// Cooldown as a `Duration`.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

/// Breaker status for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; calls flow through
    Closed,
    /// Calls short-circuit until the cooldown elapses
    Open {
        /// When the breaker opened
        opened_at: Instant,
    },
    /// Cooldown elapsed; one trial call at a time is allowed
    HalfOpen,
}

/// State machine guarding one model.
///
/// Closed → Open after `failure_threshold` consecutive failures; Open →
/// HalfOpen once the cooldown elapses; HalfOpen → Closed after
/// `success_threshold` consecutive trial successes, or straight back to
/// Open on any trial failure.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    probe_in_flight: bool,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            probe_in_flight: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Consecutive failures observed.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// May a call be attempted right now?
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Record a successful call.
    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => {
                // Idempotent: failures stay at zero.
                self.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                self.probe_in_flight = false;
                self.half_open_successes += 1;
                self.consecutive_failures = 0;
                if self.half_open_successes >= self.config.success_threshold {
                    debug!("Circuit breaker closing after successful trial");
                    self.state = CircuitState::Closed;
                    self.half_open_successes = 0;
                }
            }
            CircuitState::Open { .. } => {
                // A success from a call that raced the opening proves the
                // backend recovered.
                self.state = CircuitState::Closed;
                self.consecutive_failures = 0;
            }
        }
    }

    /// Record a failed call.
    pub fn record_failure(&mut self) {
        self.record_failure_at(Instant::now());
    }

    /// Allow variant taking an explicit clock.
    pub fn allow_at(&mut self, now: Instant) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open { opened_at } => {
                if now.duration_since(opened_at) >= self.config.cooldown() {
                    debug!("Circuit breaker cooldown elapsed, moving to half-open");
                    self.state = CircuitState::HalfOpen;
                    self.half_open_successes = 0;
                    self.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.probe_in_flight {
                    false
                } else {
                    self.probe_in_flight = true;
                    true
                }
            }
        }
    }

    /// Failure variant taking an explicit clock.
    pub fn record_failure_at(&mut self, now: Instant) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        match self.state {
            CircuitState::Closed => {
                if self.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        failures = self.consecutive_failures,
                        "Circuit breaker opening"
                    );
                    self.state = CircuitState::Open { opened_at: now };
                }
            }
            CircuitState::HalfOpen => {
                warn!("Trial call failed, circuit breaker reopening");
                self.probe_in_flight = false;
                self.state = CircuitState::Open { opened_at: now };
            }
            CircuitState::Open { .. } => {}
        }
    }
}

/// Per-model breaker registry.
///
/// One lock-guarded breaker per model key; the outer map lock is held only
/// for entry creation.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: Mutex<HashMap<String, Arc<Mutex<CircuitBreaker>>>>,
    config: BreakerConfig,
}

impl BreakerRegistry {
    /// Create a registry with default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the given thresholds.
    pub fn with_config(config: BreakerConfig) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// May a call to this model be attempted right now?
    pub fn allow(&self, model: &ModelRef) -> bool {
        let breaker = self.breaker(model);
        let mut breaker = lock(&breaker);
        breaker.allow()
    }

    /// Record a successful call to this model.
    pub fn record_success(&self, model: &ModelRef) {
        let breaker = self.breaker(model);
        let mut breaker = lock(&breaker);
        breaker.record_success();
    }

    /// Record a failed call to this model.
    pub fn record_failure(&self, model: &ModelRef) {
        let breaker = self.breaker(model);
        let mut breaker = lock(&breaker);
        breaker.record_failure();
    }

    /// Current state for a model.
    pub fn state(&self, model: &ModelRef) -> CircuitState {
        let breaker = self.breaker(model);
        let breaker = lock(&breaker);
        breaker.state()
    }

    fn breaker(&self, model: &ModelRef) -> Arc<Mutex<CircuitBreaker>> {
        let mut breakers = self
            .breakers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            breakers
                .entry(model.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(CircuitBreaker::new(self.config)))),
        )
    }
}

/// Lock a breaker, recovering from poisoning.
fn lock(breaker: &Arc<Mutex<CircuitBreaker>>) -> std::sync::MutexGuard<'_, CircuitBreaker> {
    breaker
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
