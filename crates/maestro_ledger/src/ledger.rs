//! The append-only cost ledger.

use crate::CostEntry;
use chrono::{DateTime, Datelike, Utc};
use maestro_catalog::ModelDescriptor;
use maestro_core::{RoutePolicy, TokenUsage};
use maestro_error::{LedgerError, LedgerErrorKind};
use std::sync::Mutex;
use tracing::{debug, instrument};

/// Time bucket a budget ceiling applies to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum BudgetScope {
    /// The current UTC day
    Day,
    /// The current calendar month
    Month,
}

/// Remaining headroom under a budget ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Budget {
    /// No ceiling configured for this scope
    Unlimited,
    /// USD remaining before the ceiling (never negative)
    Remaining(f64),
}

/// Append-only log of completed-call costs.
///
/// # Examples
///
/// ```
/// use maestro_catalog::ModelDescriptor;
/// use maestro_ledger::CostLedger;
/// use std::collections::HashMap;
///
/// let ledger = CostLedger::new();
/// let descriptor = ModelDescriptor::new(
///     "anthropic", "claude-3-5-sonnet", 200_000, 8_192, 3.0, 15.0, HashMap::new(),
/// ).unwrap();
///
/// let entry = ledger.record_cost(&descriptor, 1_000_000, 0);
/// assert!((*entry.cost_usd() - 3.0).abs() < 1e-9);
/// ```
#[derive(Debug, Default)]
pub struct CostLedger {
    /// Append-only entries behind a single lock
    entries: Mutex<Vec<CostEntry>>,
}

impl CostLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the cost of one completed call.
    ///
    /// Pricing comes from the descriptor:
    /// `cost = in/1e6 * price_in + out/1e6 * price_out`.
    #[instrument(skip(self, descriptor), fields(model = %descriptor.model_ref()))]
    pub fn record_cost(
        &self,
        descriptor: &ModelDescriptor,
        input_tokens: u64,
        output_tokens: u64,
    ) -> CostEntry {
        self.record_cost_at(descriptor, input_tokens, output_tokens, Utc::now())
    }

    /// Record variant taking an explicit timestamp.
    pub fn record_cost_at(
        &self,
        descriptor: &ModelDescriptor,
        input_tokens: u64,
        output_tokens: u64,
        timestamp: DateTime<Utc>,
    ) -> CostEntry {
        let usage = TokenUsage::new(input_tokens, output_tokens);
        let cost_usd = usage.calculate_cost(
            *descriptor.price_per_million_input_tokens(),
            *descriptor.price_per_million_output_tokens(),
        );

        let entry = CostEntry::new(
            descriptor.provider().clone(),
            descriptor.name().clone(),
            input_tokens,
            output_tokens,
            cost_usd,
            timestamp,
        );

        self.append(entry.clone());
        debug!(cost_usd, "Cost recorded");
        entry
    }

    /// Total recorded cost for one model across all time.
    pub fn total_for_model(&self, provider: &str, model: &str) -> f64 {
        self.snapshot()
            .iter()
            .filter(|entry| entry.provider() == provider && entry.model() == model)
            .map(|entry| entry.cost_usd())
            .sum()
    }

    /// Total cost recorded during the current UTC day.
    pub fn daily_total(&self) -> f64 {
        self.daily_total_at(Utc::now())
    }

    /// Total cost recorded during the current calendar month.
    pub fn monthly_total(&self) -> f64 {
        self.monthly_total_at(Utc::now())
    }

    /// Daily total relative to an explicit clock.
    pub fn daily_total_at(&self, now: DateTime<Utc>) -> f64 {
        self.snapshot()
            .iter()
            .filter(|entry| entry.timestamp().date_naive() == now.date_naive())
            .map(|entry| entry.cost_usd())
            .sum()
    }

    /// Monthly total relative to an explicit clock.
    pub fn monthly_total_at(&self, now: DateTime<Utc>) -> f64 {
        self.snapshot()
            .iter()
            .filter(|entry| {
                entry.timestamp().year() == now.year() && entry.timestamp().month() == now.month()
            })
            .map(|entry| entry.cost_usd())
            .sum()
    }

    /// Remaining headroom under the policy's ceiling for a scope.
    pub fn remaining_budget(&self, scope: BudgetScope, policy: &RoutePolicy) -> Budget {
        self.remaining_budget_at(scope, policy, Utc::now())
    }

    /// Headroom variant taking an explicit clock.
    pub fn remaining_budget_at(
        &self,
        scope: BudgetScope,
        policy: &RoutePolicy,
        now: DateTime<Utc>,
    ) -> Budget {
        let (ceiling, spent) = match scope {
            BudgetScope::Day => (*policy.daily_budget_usd(), self.daily_total_at(now)),
            BudgetScope::Month => (*policy.monthly_budget_usd(), self.monthly_total_at(now)),
        };
        match ceiling {
            None => Budget::Unlimited,
            Some(limit) => Budget::Remaining((limit - spent).max(0.0)),
        }
    }

    /// Fail when any configured ceiling is already met or passed.
    ///
    /// The router treats this as a hard stop: no model in the fallback
    /// chain may be tried once the budget is gone.
    ///
    /// # Errors
    ///
    /// Returns `BudgetExceeded` naming the exhausted scope.
    pub fn check_budget(&self, policy: &RoutePolicy) -> Result<(), LedgerError> {
        self.check_budget_at(policy, Utc::now())
    }

    /// Check variant taking an explicit clock.
    pub fn check_budget_at(
        &self,
        policy: &RoutePolicy,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        for (scope, ceiling, spent) in [
            (
                BudgetScope::Day,
                *policy.daily_budget_usd(),
                self.daily_total_at(now),
            ),
            (
                BudgetScope::Month,
                *policy.monthly_budget_usd(),
                self.monthly_total_at(now),
            ),
        ] {
            if let Some(limit) = ceiling {
                if spent >= limit {
                    return Err(LedgerError::new(LedgerErrorKind::BudgetExceeded {
                        scope: scope.to_string(),
                        limit_usd: limit,
                        spent_usd: spent,
                    }));
                }
            }
        }
        Ok(())
    }

    /// Copy of all recorded entries.
    ///
    /// Clones under the lock so aggregation never holds it while summing.
    pub fn snapshot(&self) -> Vec<CostEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn append(&self, entry: CostEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }
}
