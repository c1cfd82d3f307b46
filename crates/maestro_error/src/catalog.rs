//! Model catalog error types.

/// Catalog-specific error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum CatalogErrorKind {
    /// Requested model is not registered in the catalog
    #[display("Model not found in catalog: {}/{}", provider, model)]
    ModelNotFound {
        /// Provider id that was looked up
        provider: String,
        /// Model id that was looked up
        model: String,
    },
    /// A descriptor failed validation at load time
    #[display("Invalid model descriptor for {}/{}: {}", provider, model, reason)]
    InvalidDescriptor {
        /// Provider id of the offending descriptor
        provider: String,
        /// Model id of the offending descriptor
        model: String,
        /// Why validation rejected it
        reason: String,
    },
    /// A tier referenced by a caller is not defined for the model
    #[display("Unknown tier {:?} for model {}/{}", tier, provider, model)]
    UnknownTier {
        /// Tier name that was requested
        tier: String,
        /// Provider id
        provider: String,
        /// Model id
        model: String,
    },
}

/// Catalog error with source location tracking.
///
/// # Examples
///
/// ```
/// use maestro_error::{CatalogError, CatalogErrorKind};
///
/// let err = CatalogError::new(CatalogErrorKind::ModelNotFound {
///     provider: "anthropic".to_string(),
///     model: "claude-3-5-sonnet".to_string(),
/// });
/// assert!(format!("{}", err).contains("not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Catalog Error: {} at {}:{}", kind, file, line)]
pub struct CatalogError {
    /// The kind of error that occurred
    pub kind: CatalogErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CatalogError {
    /// Create a new CatalogError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CatalogErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for a `ModelNotFound` error.
    #[track_caller]
    pub fn not_found(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::ModelNotFound {
            provider: provider.into(),
            model: model.into(),
        })
    }
}
