//! Error types for the maestro library.
//!
//! This crate provides the foundation error types used throughout the maestro
//! ecosystem.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern for clean error
//! handling:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use maestro_error::{MaestroResult, ConfigError};
//!
//! fn load_settings() -> MaestroResult<String> {
//!     Err(ConfigError::new("missing providers table"))?
//! }
//!
//! match load_settings() {
//!     Ok(data) => println!("Got: {}", data),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod config;
mod error;
mod ledger;
mod provider;
mod route;
mod telemetry;

pub use catalog::{CatalogError, CatalogErrorKind};
pub use config::ConfigError;
pub use error::{MaestroError, MaestroErrorKind, MaestroResult};
pub use ledger::{LedgerError, LedgerErrorKind};
pub use provider::{ProviderError, ProviderErrorKind, RetryableError};
pub use route::{ModelFailure, RouteError, RouteErrorKind};
pub use telemetry::TelemetryError;
