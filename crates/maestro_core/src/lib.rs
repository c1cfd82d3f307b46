//! Core data types for the maestro request orchestration library.
//!
//! This crate provides the foundation data types shared by the catalog,
//! rate limiting, cost accounting, and routing crates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod message;
mod policy;
mod request;
mod role;
mod telemetry;
mod token_counting;

pub use message::Message;
pub use policy::{
    BudgetMultipliers, BudgetMultipliersBuilder, RoutePolicy, RoutePolicyBuilder,
};
pub use request::{GenerateRequest, GenerateRequestBuilder, GenerateResponse};
pub use role::Role;
pub use telemetry::{init_telemetry, shutdown_telemetry};
pub use token_counting::{ContextSizer, TokenUsage, TokenizerProfile};
