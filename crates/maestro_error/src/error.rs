//! Top-level error wrapper types.

use crate::{
    CatalogError, ConfigError, LedgerError, ProviderError, RouteError, TelemetryError,
};

/// This is the foundation error enum. Each maestro crate contributes a
/// variant for its own error domain.
///
/// # Examples
///
/// ```
/// use maestro_error::{MaestroError, ConfigError};
///
/// let cfg_err = ConfigError::new("bad limits table");
/// let err: MaestroError = cfg_err.into();
/// assert!(format!("{}", err).contains("Config Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum MaestroErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Model catalog error
    #[from(CatalogError)]
    Catalog(CatalogError),
    /// Provider-reported error
    #[from(ProviderError)]
    Provider(ProviderError),
    /// Cost ledger / budget error
    #[from(LedgerError)]
    Ledger(LedgerError),
    /// Request routing error
    #[from(RouteError)]
    Route(RouteError),
    /// Telemetry delivery error
    #[from(TelemetryError)]
    Telemetry(TelemetryError),
}

/// Maestro error with kind discrimination.
///
/// # Examples
///
/// ```
/// use maestro_error::{MaestroResult, ConfigError};
///
/// fn might_fail() -> MaestroResult<()> {
///     Err(ConfigError::new("missing field"))?
/// }
///
/// match might_fail() {
///     Ok(_) => println!("Success"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Maestro Error: {}", _0)]
pub struct MaestroError(Box<MaestroErrorKind>);

impl MaestroError {
    /// Create a new error from a kind.
    pub fn new(kind: MaestroErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &MaestroErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to MaestroErrorKind
impl<T> From<T> for MaestroError
where
    T: Into<MaestroErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for maestro operations.
///
/// # Examples
///
/// ```
/// use maestro_error::{MaestroResult, ConfigError};
///
/// fn load() -> MaestroResult<String> {
///     Err(ConfigError::new("not found"))?
/// }
/// ```
pub type MaestroResult<T> = std::result::Result<T, MaestroError>;
