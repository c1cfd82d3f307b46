//! Cost ledger and budget error types.

use std::fmt;

/// Error kinds for cost accounting operations.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerErrorKind {
    /// A configured spend ceiling has been reached.
    BudgetExceeded {
        /// Budget scope that was exhausted ("day" or "month")
        scope: String,
        /// Configured ceiling in USD
        limit_usd: f64,
        /// Amount already spent in USD
        spent_usd: f64,
    },
    /// Pricing information is missing for a model.
    UnknownPricing {
        /// Provider id
        provider: String,
        /// Model id
        model: String,
    },
}

impl fmt::Display for LedgerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerErrorKind::BudgetExceeded {
                scope,
                limit_usd,
                spent_usd,
            } => write!(
                f,
                "Budget exceeded: spent ${:.4} of ${:.4} {} budget",
                spent_usd, limit_usd, scope
            ),
            LedgerErrorKind::UnknownPricing { provider, model } => {
                write!(f, "No pricing configured for {}/{}", provider, model)
            }
        }
    }
}

/// Cost ledger error with location tracking.
#[derive(Debug, Clone)]
pub struct LedgerError {
    kind: LedgerErrorKind,
    line: u32,
    file: &'static str,
}

impl LedgerError {
    /// Create a new ledger error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: LedgerErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &LedgerErrorKind {
        &self.kind
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ledger Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for LedgerError {}

impl<T> From<T> for LedgerError
where
    T: Into<LedgerErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}
