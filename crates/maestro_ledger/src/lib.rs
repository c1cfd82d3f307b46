//! Cost accounting and budget enforcement.
//!
//! The ledger is an append-only log of completed-call costs, aggregated on
//! read into daily and monthly totals. A single lock guards appends because
//! budget enforcement needs process-wide consistency, not per-model
//! consistency; aggregation reads snapshot the log and never block writers
//! for longer than the clone.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod entry;
mod ledger;

pub use entry::CostEntry;
pub use ledger::{Budget, BudgetScope, CostLedger};
