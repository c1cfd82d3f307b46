//! Routing policy and budget multiplier configuration.

use serde::{Deserialize, Serialize};

/// Retry, wait, and spend policy for one `execute` call.
///
/// # Examples
///
/// ```
/// use maestro_core::RoutePolicy;
///
/// // Defaults: 3 retries, 300s wait ceiling, exponential base 2.0
/// let policy = RoutePolicy::default();
/// assert_eq!(*policy.max_retries(), 3);
///
/// let strict = RoutePolicy::builder()
///     .max_retries(1)
///     .daily_budget_usd(5.0)
///     .build();
/// assert_eq!(*strict.max_retries(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct RoutePolicy {
    /// Retry attempts per model before advancing the chain (default 3).
    #[serde(default = "default_max_retries")]
    max_retries: u32,

    /// Longest predicted wait worth sleeping through, in seconds (default 300).
    #[serde(default = "default_max_wait_seconds")]
    max_wait_seconds: f64,

    /// Exponential backoff base applied per attempt (default 2.0).
    #[serde(default = "default_backoff_base")]
    backoff_base: f64,

    /// Daily spend ceiling in USD. `None` means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    daily_budget_usd: Option<f64>,

    /// Monthly spend ceiling in USD. `None` means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    monthly_budget_usd: Option<f64>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_wait_seconds() -> f64 {
    300.0
}

fn default_backoff_base() -> f64 {
    2.0
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_wait_seconds: default_max_wait_seconds(),
            backoff_base: default_backoff_base(),
            daily_budget_usd: None,
            monthly_budget_usd: None,
        }
    }
}

impl RoutePolicy {
    /// Creates a new policy builder.
    pub fn builder() -> RoutePolicyBuilder {
        RoutePolicyBuilder::default()
    }

    /// Validates the policy fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the backoff base is below 1.0, the wait ceiling
    /// is negative, or a budget ceiling is not positive.
    pub fn validate(&self) -> Result<(), String> {
        if self.backoff_base < 1.0 {
            return Err(format!(
                "Backoff base must be >= 1.0, got {}",
                self.backoff_base
            ));
        }
        if self.max_wait_seconds < 0.0 {
            return Err(format!(
                "Max wait must be >= 0, got {}",
                self.max_wait_seconds
            ));
        }
        for (label, budget) in [
            ("daily", self.daily_budget_usd),
            ("monthly", self.monthly_budget_usd),
        ] {
            if let Some(value) = budget {
                if value <= 0.0 {
                    return Err(format!("{} budget must be > 0, got {}", label, value));
                }
            }
        }
        Ok(())
    }

    /// Backoff sleep for a wait prediction at the given attempt number.
    ///
    /// Attempt numbering starts at 0, so the first sleep equals the raw
    /// prediction and each subsequent one multiplies by the base.
    pub fn backoff_seconds(&self, wait_seconds: f64, attempt: u32) -> f64 {
        wait_seconds * self.backoff_base.powi(attempt as i32)
    }
}

/// Builder for `RoutePolicy`.
#[derive(Debug, Default)]
pub struct RoutePolicyBuilder {
    max_retries: Option<u32>,
    max_wait_seconds: Option<f64>,
    backoff_base: Option<f64>,
    daily_budget_usd: Option<f64>,
    monthly_budget_usd: Option<f64>,
}

impl RoutePolicyBuilder {
    /// Sets the per-model retry count.
    pub fn max_retries(mut self, value: u32) -> Self {
        self.max_retries = Some(value);
        self
    }

    /// Sets the wait ceiling in seconds.
    pub fn max_wait_seconds(mut self, value: f64) -> Self {
        self.max_wait_seconds = Some(value);
        self
    }

    /// Sets the exponential backoff base.
    pub fn backoff_base(mut self, value: f64) -> Self {
        self.backoff_base = Some(value);
        self
    }

    /// Sets the daily spend ceiling in USD.
    pub fn daily_budget_usd(mut self, value: f64) -> Self {
        self.daily_budget_usd = Some(value);
        self
    }

    /// Sets the monthly spend ceiling in USD.
    pub fn monthly_budget_usd(mut self, value: f64) -> Self {
        self.monthly_budget_usd = Some(value);
        self
    }

    /// Builds the `RoutePolicy`.
    pub fn build(self) -> RoutePolicy {
        RoutePolicy {
            max_retries: self.max_retries.unwrap_or_else(default_max_retries),
            max_wait_seconds: self
                .max_wait_seconds
                .unwrap_or_else(default_max_wait_seconds),
            backoff_base: self.backoff_base.unwrap_or_else(default_backoff_base),
            daily_budget_usd: self.daily_budget_usd,
            monthly_budget_usd: self.monthly_budget_usd,
        }
    }
}

/// Budget multipliers for throttling quota usage.
///
/// Multipliers scale the effective rate limits without modifying catalog
/// configuration. All multipliers are in the range (0.0, 1.0] where 1.0
/// means full quota usage.
///
/// # Examples
///
/// ```
/// use maestro_core::BudgetMultipliers;
///
/// // Use 80% of RPM, 50% of RPD
/// let conservative = BudgetMultipliers::builder()
///     .rpm_multiplier(0.8)
///     .rpd_multiplier(0.5)
///     .build();
///
/// // Default: use full quotas
/// let full = BudgetMultipliers::default();
/// assert_eq!(*full.rpm_multiplier(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(deny_unknown_fields)]
pub struct BudgetMultipliers {
    /// Multiplier for requests per minute (0.0-1.0, default 1.0).
    #[serde(default = "default_multiplier")]
    rpm_multiplier: f64,

    /// Multiplier for tokens per minute (0.0-1.0, default 1.0).
    #[serde(default = "default_multiplier")]
    tpm_multiplier: f64,

    /// Multiplier for requests per day (0.0-1.0, default 1.0).
    #[serde(default = "default_multiplier")]
    rpd_multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for BudgetMultipliers {
    fn default() -> Self {
        Self {
            rpm_multiplier: 1.0,
            tpm_multiplier: 1.0,
            rpd_multiplier: 1.0,
        }
    }
}

impl BudgetMultipliers {
    /// Creates a new multipliers builder.
    pub fn builder() -> BudgetMultipliersBuilder {
        BudgetMultipliersBuilder::default()
    }

    /// Validates that all multipliers are in valid range (0.0, 1.0].
    ///
    /// # Errors
    ///
    /// Returns an error if any multiplier is <= 0.0 or > 1.0.
    pub fn validate(&self) -> Result<(), String> {
        for (label, value) in [
            ("RPM", self.rpm_multiplier),
            ("TPM", self.tpm_multiplier),
            ("RPD", self.rpd_multiplier),
        ] {
            if value <= 0.0 || value > 1.0 {
                return Err(format!(
                    "{} multiplier must be in (0.0, 1.0], got {}",
                    label, value
                ));
            }
        }
        Ok(())
    }

    /// Applies this budget to a per-minute request limit.
    pub fn apply_rpm(&self, rpm: u32) -> u32 {
        (rpm as f64 * self.rpm_multiplier).round() as u32
    }

    /// Applies this budget to a per-minute token limit.
    pub fn apply_tpm(&self, tpm: u64) -> u64 {
        (tpm as f64 * self.tpm_multiplier).round() as u64
    }

    /// Applies this budget to a daily request limit.
    pub fn apply_rpd(&self, rpd: u32) -> u32 {
        (rpd as f64 * self.rpd_multiplier).round() as u32
    }

    /// Merges this budget with another, taking the minimum of each multiplier.
    pub fn merge(&self, other: &BudgetMultipliers) -> BudgetMultipliers {
        BudgetMultipliers {
            rpm_multiplier: self.rpm_multiplier.min(other.rpm_multiplier),
            tpm_multiplier: self.tpm_multiplier.min(other.tpm_multiplier),
            rpd_multiplier: self.rpd_multiplier.min(other.rpd_multiplier),
        }
    }
}

/// Builder for `BudgetMultipliers`.
#[derive(Debug, Default)]
pub struct BudgetMultipliersBuilder {
    rpm_multiplier: Option<f64>,
    tpm_multiplier: Option<f64>,
    rpd_multiplier: Option<f64>,
}

impl BudgetMultipliersBuilder {
    /// Sets the RPM multiplier.
    pub fn rpm_multiplier(mut self, value: f64) -> Self {
        self.rpm_multiplier = Some(value);
        self
    }

    /// Sets the TPM multiplier.
    pub fn tpm_multiplier(mut self, value: f64) -> Self {
        self.tpm_multiplier = Some(value);
        self
    }

    /// Sets the RPD multiplier.
    pub fn rpd_multiplier(mut self, value: f64) -> Self {
        self.rpd_multiplier = Some(value);
        self
    }

    /// Builds the `BudgetMultipliers`.
    pub fn build(self) -> BudgetMultipliers {
        BudgetMultipliers {
            rpm_multiplier: self.rpm_multiplier.unwrap_or(1.0),
            tpm_multiplier: self.tpm_multiplier.unwrap_or(1.0),
            rpd_multiplier: self.rpd_multiplier.unwrap_or(1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = RoutePolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.max_wait_seconds, 300.0);
        assert_eq!(policy.backoff_base, 2.0);
        assert!(policy.daily_budget_usd.is_none());
        assert!(policy.monthly_budget_usd.is_none());
    }

    #[test]
    fn test_backoff_sequence() {
        let policy = RoutePolicy::default();
        // 60s base wait across attempts 0..3 -> 60, 120, 240
        assert_eq!(policy.backoff_seconds(60.0, 0), 60.0);
        assert_eq!(policy.backoff_seconds(60.0, 1), 120.0);
        assert_eq!(policy.backoff_seconds(60.0, 2), 240.0);
    }

    #[test]
    fn test_policy_validation_rejects_sub_one_base() {
        let policy = RoutePolicy::builder().backoff_base(0.5).build();
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_policy_validation_rejects_zero_budget() {
        let policy = RoutePolicy::builder().daily_budget_usd(0.0).build();
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_multipliers_apply() {
        let budget = BudgetMultipliers::builder()
            .rpm_multiplier(0.5)
            .tpm_multiplier(0.8)
            .build();
        assert_eq!(budget.apply_rpm(10), 5);
        assert_eq!(budget.apply_tpm(250_000), 200_000);
        assert_eq!(budget.apply_rpd(250), 250);
    }

    #[test]
    fn test_multipliers_merge_takes_minimum() {
        let a = BudgetMultipliers::builder().rpm_multiplier(0.8).build();
        let b = BudgetMultipliers::builder().rpm_multiplier(0.5).build();
        let merged = a.merge(&b);
        assert_eq!(*merged.rpm_multiplier(), 0.5);
        assert_eq!(*merged.tpm_multiplier(), 1.0);
    }
}
