//! Immutable cost records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed call's financial record.
///
/// Immutable once created; appended to the ledger and aggregated into
/// daily/monthly totals on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct CostEntry {
    /// Provider id of the model that served the call
    provider: String,
    /// Model id that served the call
    model: String,
    /// Input tokens consumed
    input_tokens: u64,
    /// Output tokens produced
    output_tokens: u64,
    /// Cost of the call in USD
    cost_usd: f64,
    /// When the call completed
    timestamp: DateTime<Utc>,
}

impl CostEntry {
    /// Create a new cost entry.
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            input_tokens,
            output_tokens,
            cost_usd,
            timestamp,
        }
    }
}
