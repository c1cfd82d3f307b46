//! Sliding-window usage counters.

use chrono::{DateTime, NaiveDate, Utc};
use maestro_catalog::RateLimitSpec;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Length of the trailing window over which per-minute limits apply.
pub const WINDOW_DURATION: Duration = Duration::from_secs(60);

/// Sentinel wait for demand that no amount of window slide can satisfy,
/// e.g. a single request estimated above the whole per-minute token limit.
const NEVER: Duration = Duration::MAX;

/// Outcome of a capacity query.
///
/// `wait` is the time until enough window entries age out to free the
/// requested capacity; zero when `allowed` is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed right now
    pub allowed: bool,
    /// Time until sufficient capacity frees up (zero when allowed)
    pub wait: Duration,
}

impl Decision {
    /// Capacity is available now.
    pub fn proceed() -> Self {
        Self {
            allowed: true,
            wait: Duration::ZERO,
        }
    }

    /// Capacity frees up after the given wait.
    pub fn wait_for(wait: Duration) -> Self {
        Self {
            allowed: false,
            wait,
        }
    }

    /// No wait will ever free enough capacity.
    pub fn never() -> Self {
        Self {
            allowed: false,
            wait: NEVER,
        }
    }

    /// The wait expressed in seconds.
    pub fn wait_seconds(&self) -> f64 {
        self.wait.as_secs_f64()
    }
}

/// Mutable sliding-window counter state for one `(model, tier)` pair.
///
/// Entries cover the trailing 60 seconds and are pruned lazily at every
/// read or write, so they are always sorted and never stale at decision
/// time. The daily request counter resets when the UTC date rolls over.
///
/// Owned exclusively by the tracker and mutated under its per-key lock.
#[derive(Debug)]
pub struct UsageWindow {
    /// Trailing (timestamp, tokens) entries, oldest first
    entries: VecDeque<(Instant, u64)>,
    /// Requests recorded since the last day boundary
    requests_today: u32,
    /// UTC date the daily counter belongs to
    day: NaiveDate,
}

impl UsageWindow {
    /// Create an empty window for the given UTC date.
    pub fn new(day: NaiveDate) -> Self {
        Self {
            entries: VecDeque::new(),
            requests_today: 0,
            day,
        }
    }

    /// Tokens recorded in the trailing window (after pruning).
    pub fn tokens_in_window(&self) -> u64 {
        self.entries.iter().map(|(_, tokens)| tokens).sum()
    }

    /// Requests recorded in the trailing window (after pruning).
    pub fn requests_in_window(&self) -> usize {
        self.entries.len()
    }

    /// Requests recorded today.
    pub fn requests_today(&self) -> u32 {
        self.requests_today
    }

    /// Drop entries older than the window and roll the daily counter.
    fn refresh(&mut self, now: Instant, today: NaiveDate) {
        while let Some((stamp, _)) = self.entries.front() {
            if now.duration_since(*stamp) >= WINDOW_DURATION {
                self.entries.pop_front();
            } else {
                break;
            }
        }
        if today != self.day {
            self.day = today;
            self.requests_today = 0;
        }
    }

    /// Record one completed request consuming `tokens`.
    pub fn record(&mut self, now: Instant, now_utc: DateTime<Utc>, tokens: u64) {
        self.refresh(now, now_utc.date_naive());
        self.entries.push_back((now, tokens));
        self.requests_today = self.requests_today.saturating_add(1);
    }

    /// Can one more request consuming `estimated_tokens` proceed?
    ///
    /// Checks the per-minute request count, per-minute token count, and
    /// daily request count against `spec`. When blocked, the wait is the
    /// longest of the per-dimension waits, since every dimension must have
    /// capacity simultaneously.
    pub fn decide(
        &mut self,
        now: Instant,
        now_utc: DateTime<Utc>,
        spec: &RateLimitSpec,
        estimated_tokens: u64,
    ) -> Decision {
        self.refresh(now, now_utc.date_naive());

        let mut wait = Duration::ZERO;

        if let Some(rpd) = spec.requests_per_day {
            if rpd == 0 {
                return Decision::never();
            }
            if self.requests_today >= rpd {
                wait = wait.max(until_next_utc_midnight(now_utc));
            }
        }

        if let Some(rpm) = spec.requests_per_minute {
            if rpm == 0 {
                return Decision::never();
            }
            let count = self.entries.len();
            if count >= rpm as usize {
                // The (count - rpm)-th entry is the last that must expire
                // before one more request fits.
                let (stamp, _) = self.entries[count - rpm as usize];
                wait = wait.max(remaining(stamp, now));
            }
        }

        if let Some(tpm) = spec.tokens_per_minute {
            if estimated_tokens > tpm {
                return Decision::never();
            }
            let in_window = self.tokens_in_window();
            if in_window + estimated_tokens > tpm {
                let mut freed = 0u64;
                let mut token_wait = NEVER;
                for (stamp, tokens) in &self.entries {
                    freed += tokens;
                    if in_window - freed + estimated_tokens <= tpm {
                        token_wait = remaining(*stamp, now);
                        break;
                    }
                }
                wait = wait.max(token_wait);
            }
        }

        if wait.is_zero() {
            Decision::proceed()
        } else {
            Decision::wait_for(wait)
        }
    }
}

/// Time until `stamp` ages out of the trailing window.
fn remaining(stamp: Instant, now: Instant) -> Duration {
    WINDOW_DURATION.saturating_sub(now.duration_since(stamp))
}

/// Time until the daily counter resets at the next UTC midnight.
fn until_next_utc_midnight(now_utc: DateTime<Utc>) -> Duration {
    now_utc
        .date_naive()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .and_then(|midnight| (midnight - now_utc.naive_utc()).to_std().ok())
        .unwrap_or(NEVER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spec(rpm: Option<u32>, tpm: Option<u64>, rpd: Option<u32>) -> RateLimitSpec {
        RateLimitSpec {
            requests_per_minute: rpm,
            tokens_per_minute: tpm,
            requests_per_day: rpd,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlimited_spec_always_allows() {
        let now_utc = noon();
        let mut window = UsageWindow::new(now_utc.date_naive());
        for _ in 0..1000 {
            let now = Instant::now();
            assert!(window.decide(now, now_utc, &RateLimitSpec::unlimited(), 1_000).allowed);
            window.record(now, now_utc, 1_000);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_limit_blocks_then_frees() {
        let now_utc = noon();
        let mut window = UsageWindow::new(now_utc.date_naive());
        let spec = spec(Some(2), None, None);

        let start = Instant::now();
        window.record(start, now_utc, 10);
        window.record(start, now_utc, 10);

        let decision = window.decide(start, now_utc, &spec, 10);
        assert!(!decision.allowed);
        assert_eq!(decision.wait, WINDOW_DURATION);

        // After the window slides past the oldest entry, capacity frees.
        tokio::time::advance(Duration::from_secs(60)).await;
        let decision = window.decide(Instant::now(), now_utc, &spec, 10);
        assert!(decision.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_accounts_for_entry_age() {
        let now_utc = noon();
        let mut window = UsageWindow::new(now_utc.date_naive());
        let spec = spec(Some(1), None, None);

        window.record(Instant::now(), now_utc, 10);
        tokio::time::advance(Duration::from_secs(20)).await;

        let decision = window.decide(Instant::now(), now_utc, &spec, 10);
        assert!(!decision.allowed);
        assert_eq!(decision.wait, Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_limit_never_admits_oversized_request() {
        let now_utc = noon();
        let mut window = UsageWindow::new(now_utc.date_naive());
        let spec = spec(None, Some(20_000), None);

        let decision = window.decide(Instant::now(), now_utc, &spec, 30_000);
        assert!(!decision.allowed);
        assert_eq!(decision.wait, Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_limit_waits_for_partial_expiry() {
        let now_utc = noon();
        let mut window = UsageWindow::new(now_utc.date_naive());
        let spec = spec(None, Some(1_000), None);

        window.record(Instant::now(), now_utc, 600);
        tokio::time::advance(Duration::from_secs(10)).await;
        window.record(Instant::now(), now_utc, 300);

        // 900 in window; 400 more needs the first entry (600 tokens) gone.
        let decision = window.decide(Instant::now(), now_utc, &spec, 400);
        assert!(!decision.allowed);
        assert_eq!(decision.wait, Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_allows_above_limit() {
        // Admission never pushes the trailing counts above the limit.
        let now_utc = noon();
        let mut window = UsageWindow::new(now_utc.date_naive());
        let spec = spec(Some(5), Some(10_000), None);

        for _ in 0..50 {
            let now = Instant::now();
            let decision = window.decide(now, now_utc, &spec, 1_500);
            if decision.allowed {
                window.record(now, now_utc, 1_500);
                assert!(window.requests_in_window() <= 5);
                assert!(window.tokens_in_window() <= 10_000);
            }
            tokio::time::advance(Duration::from_secs(7)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_limit_waits_for_midnight() {
        let now_utc = noon();
        let mut window = UsageWindow::new(now_utc.date_naive());
        let spec = spec(None, None, Some(1));

        let now = Instant::now();
        window.record(now, now_utc, 10);
        tokio::time::advance(Duration::from_secs(120)).await;

        let decision = window.decide(Instant::now(), now_utc, &spec, 10);
        assert!(!decision.allowed);
        // Noon to midnight.
        assert_eq!(decision.wait, Duration::from_secs(12 * 3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_counter_resets_on_new_day() {
        let now_utc = noon();
        let mut window = UsageWindow::new(now_utc.date_naive());
        let spec = spec(None, None, Some(1));

        window.record(Instant::now(), now_utc, 10);
        assert!(!window.decide(Instant::now(), now_utc, &spec, 10).allowed);

        let tomorrow = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 1).unwrap();
        assert!(window.decide(Instant::now(), tomorrow, &spec, 10).allowed);
        assert_eq!(window.requests_today(), 0);
    }
}
