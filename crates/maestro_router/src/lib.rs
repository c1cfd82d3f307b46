//! Request routing across interchangeable LLM backends.
//!
//! The router reconciles three competing constraints in real time:
//! provider-imposed throughput limits, a hard per-model context ceiling,
//! and a cost budget. Given a primary model and an ordered fallback chain
//! it decides, per attempt, whether to wait, retry, substitute, or fail.
//!
//! Waiting on the preferred model is always favored over degrading to a
//! fallback; fallbacks are reserved for capability mismatches, open
//! circuit breakers, and genuinely unexpected provider failures.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod classify;
mod router;
mod telemetry;

pub use backend::{BackendRegistry, BackendResponse, ModelBackend};
pub use classify::{
    AnthropicClassifier, ErrorClassifier, ErrorDisposition, GeminiClassifier, OpenAiClassifier,
    StatusClassifier,
};
pub use router::{RequestRouter, RequestRouterBuilder, Routed};
pub use telemetry::{AttemptEvent, AttemptOutcome, NoopSink, OtelSink, TelemetrySink, TracingSink};
