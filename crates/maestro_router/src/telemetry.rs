//! Structured attempt reporting.
//!
//! Every attempt (wait, retry, success, fallback, terminal failure) is
//! reported to a `TelemetrySink`, enabling external cost/latency dashboards
//! without coupling the router to any specific reporting backend. The
//! router never blocks on a failing sink; delivery errors are logged
//! locally and swallowed.

use maestro_error::TelemetryError;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter},
};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::info;

/// How one attempt ended.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttemptOutcome {
    /// Call completed and the response was returned
    Success,
    /// Backed off to wait out predicted throttling
    Waited,
    /// Provider reported throttling on a live call
    RateLimited,
    /// Gave up on this model and advanced the chain
    Fallback,
    /// Model skipped without an attempt (breaker open, window too small)
    Skipped,
    /// Attempt failed terminally for this model
    Failed,
}

/// One attempt's structured record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptEvent {
    /// Provider id
    pub provider: String,
    /// Model id
    pub model: String,
    /// Tier the attempt ran under
    pub tier: String,
    /// Attempt number against this model, starting at 0
    pub attempt: u32,
    /// How the attempt ended
    pub outcome: AttemptOutcome,
    /// Seconds waited (or scheduled to wait) before/for this attempt
    pub wait_seconds: f64,
    /// Input tokens consumed, when known
    pub tokens_in: u64,
    /// Output tokens produced, when known
    pub tokens_out: u64,
    /// Cost of the attempt in USD, when known
    pub cost_usd: f64,
    /// Error classification label, when the attempt failed
    pub error_kind: Option<String>,
}

/// Receives structured attempt events.
pub trait TelemetrySink: Send + Sync {
    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Returns a delivery error; the router logs and swallows it.
    fn report(&self, event: &AttemptEvent) -> Result<(), TelemetryError>;
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn report(&self, _event: &AttemptEvent) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Sink that emits each event as a structured tracing record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn report(&self, event: &AttemptEvent) -> Result<(), TelemetryError> {
        info!(
            provider = %event.provider,
            model = %event.model,
            tier = %event.tier,
            attempt = event.attempt,
            outcome = %event.outcome,
            wait_seconds = event.wait_seconds,
            tokens_in = event.tokens_in,
            tokens_out = event.tokens_out,
            cost_usd = event.cost_usd,
            error_kind = event.error_kind.as_deref().unwrap_or(""),
            "Attempt reported"
        );
        Ok(())
    }
}

static METRICS: OnceLock<RouterMetrics> = OnceLock::new();

/// OpenTelemetry instruments for router attempts.
///
/// Tracks attempts, errors, waits, token usage, and spend for all backends.
/// Metrics are labeled with provider and model name.
#[derive(Clone)]
struct RouterMetrics {
    /// Meter handle kept alive for metric instruments
    _meter: Meter,
    /// Total attempts by outcome
    attempts: Counter<u64>,
    /// Failed attempts by error kind
    errors: Counter<u64>,
    /// Seconds spent waiting for capacity
    wait_seconds: Histogram<f64>,
    /// Total tokens used (input + output)
    tokens_used: Counter<u64>,
    /// Spend in USD
    cost_usd: Counter<f64>,
}

impl RouterMetrics {
    fn init() -> Self {
        let meter = global::meter("maestro_router");

        Self {
            _meter: meter.clone(),
            attempts: meter
                .u64_counter("router.attempts")
                .with_description("Total routing attempts")
                .build(),
            errors: meter
                .u64_counter("router.errors")
                .with_description("Failed routing attempts")
                .build(),
            wait_seconds: meter
                .f64_histogram("router.wait")
                .with_unit("seconds")
                .with_description("Backoff wait before an attempt")
                .build(),
            tokens_used: meter
                .u64_counter("router.tokens")
                .with_description("Total tokens used (input + output)")
                .build(),
            cost_usd: meter
                .f64_counter("router.cost")
                .with_unit("usd")
                .with_description("Spend recorded for completed calls")
                .build(),
        }
    }

    fn get() -> &'static Self {
        METRICS.get_or_init(Self::init)
    }
}

/// Sink backed by OpenTelemetry counters and histograms.
#[derive(Debug, Clone, Copy, Default)]
pub struct OtelSink;

impl TelemetrySink for OtelSink {
    fn report(&self, event: &AttemptEvent) -> Result<(), TelemetryError> {
        let metrics = RouterMetrics::get();
        let labels = &[
            KeyValue::new("provider", event.provider.clone()),
            KeyValue::new("model", event.model.clone()),
            KeyValue::new("outcome", event.outcome.to_string()),
        ];

        metrics.attempts.add(1, labels);
        if event.wait_seconds > 0.0 {
            metrics.wait_seconds.record(event.wait_seconds, labels);
        }
        if let Some(kind) = &event.error_kind {
            metrics.errors.add(
                1,
                &[
                    KeyValue::new("provider", event.provider.clone()),
                    KeyValue::new("model", event.model.clone()),
                    KeyValue::new("error_kind", kind.clone()),
                ],
            );
        }
        let tokens = event.tokens_in + event.tokens_out;
        if tokens > 0 {
            metrics.tokens_used.add(tokens, labels);
        }
        if event.cost_usd > 0.0 {
            metrics.cost_usd.add(event.cost_usd, labels);
        }
        Ok(())
    }
}
