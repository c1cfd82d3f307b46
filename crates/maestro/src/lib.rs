//! Maestro - LLM Request Orchestration
//!
//! Maestro issues requests to multiple interchangeable large-language-model
//! backends while respecting per-backend rate limits, controlling spend,
//! and maintaining availability through automatic fallback.
//!
//! # Features
//!
//! - **Sliding-window rate limiting**: per-(model, tier) request and token
//!   windows with computed waits, never fixed buckets
//! - **Wait-first routing**: waiting on the preferred model is favored over
//!   degrading to a fallback
//! - **Circuit breaking**: persistently failing models are suspended so
//!   retry budget goes to legitimate rate-limit waits
//! - **Budget enforcement**: daily/monthly spend ceilings are hard stops
//! - **Typed error classification**: per-provider classifiers instead of
//!   error-string matching
//! - **Structured telemetry**: every attempt reported to a pluggable sink
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use maestro::{
//!     Catalog, CatalogConfig, GenerateRequest, Message, ModelRef,
//!     RequestRouter, RoutePolicy,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Arc::new(Catalog::from_config(CatalogConfig::load()?)?);
//!     let router = RequestRouter::builder()
//!         .catalog(catalog)
//!         .backend(my_backend) // implements ModelBackend
//!         .build()?;
//!
//!     let request = GenerateRequest::builder()
//!         .messages(vec![Message::user("Hello!")])
//!         .build()?;
//!     let chain = vec![
//!         ModelRef::new("anthropic", "claude-3-5-sonnet"),
//!         ModelRef::new("openai", "gpt-4o-mini"),
//!     ];
//!
//!     let routed = router
//!         .execute(&request, &chain, "tier1", &RoutePolicy::default(), None)
//!         .await?;
//!     println!("{} (${:.4})", routed.response.text, routed.cost.cost_usd());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! Maestro is organized as a workspace with focused crates:
//!
//! - `maestro_core` - Request, policy, and token accounting types
//! - `maestro_error` - Error types
//! - `maestro_catalog` - Model descriptor registry and TOML configuration
//! - `maestro_rate_limit` - Sliding windows, circuit breakers, header detection
//! - `maestro_ledger` - Cost accounting and budget ceilings
//! - `maestro_router` - The orchestration core
//!
//! This crate (`maestro`) re-exports everything for convenience.

#![forbid(unsafe_code)]

// Re-export all workspace crates
pub use maestro_catalog::*;
pub use maestro_core::*;
pub use maestro_error::*;
pub use maestro_ledger::*;
pub use maestro_rate_limit::*;
pub use maestro_router::*;
