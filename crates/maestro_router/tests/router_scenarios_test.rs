//! End-to-end routing scenarios against mock backends.

use async_trait::async_trait;
use maestro_catalog::{Catalog, CatalogConfig, ModelEntry, ModelRef, ProviderEntry, RateLimitSpec};
use maestro_core::{GenerateRequest, GenerateResponse, Message, RoutePolicy, TokenUsage};
use maestro_error::{
    MaestroErrorKind, ProviderError, ProviderErrorKind, RouteErrorKind, TelemetryError,
};
use maestro_ledger::CostLedger;
use maestro_rate_limit::{BreakerRegistry, RateLimitTracker};
use maestro_router::{
    AttemptEvent, AttemptOutcome, BackendResponse, ModelBackend, RequestRouter, Routed,
    TelemetrySink,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Scriptable backend: pops queued results, then succeeds.
struct MockBackend {
    provider: String,
    model: String,
    script: Mutex<VecDeque<Result<BackendResponse, ProviderError>>>,
    calls: AtomicU32,
}

impl MockBackend {
    fn new(provider: &str, model: &str) -> Arc<Self> {
        Arc::new(Self {
            provider: provider.to_string(),
            model: model.to_string(),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
        })
    }

    fn push_error(&self, kind: ProviderErrorKind) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(ProviderError::new(kind)));
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn success() -> BackendResponse {
        BackendResponse {
            response: GenerateResponse {
                text: "ok".to_string(),
            },
            usage: TokenUsage::new(100, 50),
        }
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    async fn generate(&self, _req: &GenerateRequest) -> Result<BackendResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(Self::success()),
        }
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Backend whose calls never complete; used for deadline tests.
struct HangingBackend;

#[async_trait]
impl ModelBackend for HangingBackend {
    async fn generate(&self, _req: &GenerateRequest) -> Result<BackendResponse, ProviderError> {
        std::future::pending().await
    }

    fn provider_name(&self) -> &str {
        "test"
    }

    fn model_name(&self) -> &str {
        "model-a"
    }
}

/// Sink that collects every event for assertions.
#[derive(Default)]
struct CollectingSink {
    events: Mutex<Vec<AttemptEvent>>,
}

impl TelemetrySink for CollectingSink {
    fn report(&self, event: &AttemptEvent) -> Result<(), TelemetryError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn model_entry(context_window: u64, limits: RateLimitSpec) -> ModelEntry {
    let mut rate_limits = HashMap::new();
    rate_limits.insert("test".to_string(), limits);
    ModelEntry {
        context_window_tokens: context_window,
        max_output_tokens: 8_192,
        price_per_million_input_tokens: 3.0,
        price_per_million_output_tokens: 15.0,
        rate_limits,
    }
}

/// Catalog with two models under the "test" provider and "test" tier.
fn catalog(a_window: u64, a_limits: RateLimitSpec, b_window: u64) -> Arc<Catalog> {
    let mut models = HashMap::new();
    models.insert("model-a".to_string(), model_entry(a_window, a_limits));
    models.insert(
        "model-b".to_string(),
        model_entry(b_window, RateLimitSpec::unlimited()),
    );

    let mut providers = HashMap::new();
    providers.insert(
        "test".to_string(),
        ProviderEntry {
            default_tier: "test".to_string(),
            models,
        },
    );

    Arc::new(Catalog::from_config(CatalogConfig { providers }).unwrap())
}

fn chain() -> Vec<ModelRef> {
    vec![
        ModelRef::new("test", "model-a"),
        ModelRef::new("test", "model-b"),
    ]
}

fn request() -> GenerateRequest {
    GenerateRequest {
        messages: vec![Message::user("hello there")],
        ..Default::default()
    }
}

fn assert_exhausted(result: Result<Routed, maestro_error::MaestroError>) {
    match result {
        Err(e) => match e.kind() {
            MaestroErrorKind::Route(route) => {
                assert!(matches!(
                    route.kind(),
                    RouteErrorKind::AllModelsExhausted(_)
                ));
            }
            other => panic!("expected route error, got {:?}", other),
        },
        Ok(_) => panic!("expected exhaustion"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_primary_instead_of_falling_back() {
    // Model A allows 2 requests per minute; the third call must wait out
    // the window and still land on A, never touching B.
    let limits = RateLimitSpec {
        requests_per_minute: Some(2),
        tokens_per_minute: None,
        requests_per_day: None,
    };
    let a = MockBackend::new("test", "model-a");
    let b = MockBackend::new("test", "model-b");
    let router = RequestRouter::builder()
        .catalog(catalog(200_000, limits, 200_000))
        .backend(a.clone())
        .backend(b.clone())
        .build()
        .unwrap();

    let policy = RoutePolicy::default();
    let start = Instant::now();

    for _ in 0..3 {
        router
            .execute(&request(), &chain(), "test", &policy, None)
            .await
            .unwrap();
    }

    assert_eq!(a.calls(), 3);
    assert_eq!(b.calls(), 0);
    // The third call slept until the window slid.
    assert!(start.elapsed() >= Duration::from_secs(59));
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_after_consecutive_failures() {
    // Five transient failures open A's breaker; the sixth call goes
    // straight to B without any wait.
    let a = MockBackend::new("test", "model-a");
    let b = MockBackend::new("test", "model-b");
    let router = RequestRouter::builder()
        .catalog(catalog(200_000, RateLimitSpec::unlimited(), 200_000))
        .backend(a.clone())
        .backend(b.clone())
        .build()
        .unwrap();

    let policy = RoutePolicy::default();

    for _ in 0..5 {
        a.push_error(ProviderErrorKind::Http {
            status_code: 503,
            message: "unavailable".to_string(),
        });
        let routed = router
            .execute(&request(), &chain(), "test", &policy, None)
            .await
            .unwrap();
        assert_eq!(routed.response.text, "ok"); // served by B
    }
    assert_eq!(a.calls(), 5);
    assert_eq!(b.calls(), 5);

    let start = Instant::now();
    router
        .execute(&request(), &chain(), "test", &policy, None)
        .await
        .unwrap();
    assert_eq!(a.calls(), 5, "open breaker must skip A entirely");
    assert_eq!(b.calls(), 6);
    assert_eq!(start.elapsed(), Duration::ZERO, "skip must not wait");
}

#[tokio::test(start_paused = true)]
async fn test_capability_mismatch_skips_to_larger_window() {
    // ~200K token payload; A's window is 128K, B's is 1M.
    let a = MockBackend::new("test", "model-a");
    let b = MockBackend::new("test", "model-b");
    let router = RequestRouter::builder()
        .catalog(catalog(128_000, RateLimitSpec::unlimited(), 1_000_000))
        .backend(a.clone())
        .backend(b.clone())
        .build()
        .unwrap();

    let big_request = GenerateRequest {
        messages: vec![Message::user("x".repeat(600_000))],
        ..Default::default()
    };

    let routed = router
        .execute(&big_request, &chain(), "test", &RoutePolicy::default(), None)
        .await
        .unwrap();

    assert_eq!(a.calls(), 0, "capability mismatch is never attempted");
    assert_eq!(b.calls(), 1);
    assert_eq!(routed.response.text, "ok");
}

#[tokio::test(start_paused = true)]
async fn test_exact_window_boundary_is_accepted() {
    // An estimate exactly at the context window is allowed; one token
    // over is not.
    let a = MockBackend::new("test", "model-a");
    let b = MockBackend::new("test", "model-b");
    // "hello there" is 11 bytes -> ceil(11/3) = 4 tokens + 4 overhead = 8.
    let router = RequestRouter::builder()
        .catalog(catalog(8, RateLimitSpec::unlimited(), 1_000_000))
        .backend(a.clone())
        .backend(b.clone())
        .build()
        .unwrap();

    router
        .execute(&request(), &chain(), "test", &RoutePolicy::default(), None)
        .await
        .unwrap();
    assert_eq!(a.calls(), 1);

    let over = RequestRouter::builder()
        .catalog(catalog(7, RateLimitSpec::unlimited(), 1_000_000))
        .backend(a.clone())
        .backend(b.clone())
        .build()
        .unwrap();
    over.execute(&request(), &chain(), "test", &RoutePolicy::default(), None)
        .await
        .unwrap();
    assert_eq!(a.calls(), 1, "one token over must skip the model");
    assert_eq!(b.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_budget_ceiling_preempts_all_models() {
    let a = MockBackend::new("test", "model-a");
    let ledger = Arc::new(CostLedger::new());
    let router = RequestRouter::builder()
        .catalog(catalog(200_000, RateLimitSpec::unlimited(), 200_000))
        .backend(a.clone())
        .ledger(ledger.clone())
        .build()
        .unwrap();

    let policy = RoutePolicy::builder().daily_budget_usd(1.0).build();

    // Spend $1.05 (350K input tokens at $3/M) before the next request.
    let descriptor = catalog(200_000, RateLimitSpec::unlimited(), 200_000)
        .resolve("test", "model-a")
        .unwrap()
        .clone();
    ledger.record_cost(&descriptor, 350_000, 0);

    let result = router
        .execute(&request(), &chain(), "test", &policy, None)
        .await;

    match result {
        Err(e) => assert!(matches!(e.kind(), MaestroErrorKind::Ledger(_))),
        Ok(_) => panic!("expected budget error"),
    }
    assert_eq!(a.calls(), 0, "no model may be attempted once over budget");
}

#[tokio::test(start_paused = true)]
async fn test_provider_rate_limit_backs_off_exponentially() {
    // Three provider-reported throttles with a 1s hint produce sleeps of
    // 1s, 2s, 4s (wait * base^attempt), then the fourth attempt succeeds.
    let a = MockBackend::new("test", "model-a");
    for _ in 0..3 {
        a.push_error(ProviderErrorKind::RateLimited {
            retry_after_seconds: Some(1.0),
        });
    }
    let router = RequestRouter::builder()
        .catalog(catalog(200_000, RateLimitSpec::unlimited(), 200_000))
        .backend(a.clone())
        .build()
        .unwrap();

    let start = Instant::now();
    let routed = router
        .execute(&request(), &chain(), "test", &RoutePolicy::default(), None)
        .await
        .unwrap();

    assert_eq!(a.calls(), 4);
    assert_eq!(routed.response.text, "ok");
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_secs(7) && elapsed < Duration::from_secs(8),
        "expected ~7s of compounded backoff, got {:?}",
        elapsed
    );
}

#[tokio::test(start_paused = true)]
async fn test_deadline_expires_during_wait() {
    // A's window is exhausted and the predicted wait outlives the
    // caller's deadline; the wait must abort, not finish.
    let limits = RateLimitSpec {
        requests_per_minute: Some(1),
        tokens_per_minute: None,
        requests_per_day: None,
    };
    let a = MockBackend::new("test", "model-a");
    let tracker = Arc::new(RateLimitTracker::new());
    let router = RequestRouter::builder()
        .catalog(catalog(200_000, limits, 200_000))
        .backend(a.clone())
        .tracker(tracker.clone())
        .build()
        .unwrap();

    let policy = RoutePolicy::default();
    router
        .execute(&request(), &[chain()[0].clone()], "test", &policy, None)
        .await
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let start = Instant::now();
    let result = router
        .execute(
            &request(),
            &[chain()[0].clone()],
            "test",
            &policy,
            Some(deadline),
        )
        .await;

    match result {
        Err(e) => match e.kind() {
            MaestroErrorKind::Route(route) => {
                assert_eq!(route.kind(), &RouteErrorKind::DeadlineExceeded);
            }
            other => panic!("expected deadline error, got {:?}", other),
        },
        Ok(_) => panic!("expected deadline error"),
    }
    assert_eq!(start.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_expires_during_call() {
    let router = RequestRouter::builder()
        .catalog(catalog(200_000, RateLimitSpec::unlimited(), 200_000))
        .backend(Arc::new(HangingBackend))
        .build()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(3);
    let result = router
        .execute(
            &request(),
            &[ModelRef::new("test", "model-a")],
            "test",
            &RoutePolicy::default(),
            Some(deadline),
        )
        .await;

    match result {
        Err(e) => match e.kind() {
            MaestroErrorKind::Route(route) => {
                assert_eq!(route.kind(), &RouteErrorKind::DeadlineExceeded);
            }
            other => panic!("expected deadline error, got {:?}", other),
        },
        Ok(_) => panic!("expected deadline error"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_carries_per_model_reasons() {
    let a = MockBackend::new("test", "model-a");
    let b = MockBackend::new("test", "model-b");
    a.push_error(ProviderErrorKind::Auth("bad key".to_string()));
    b.push_error(ProviderErrorKind::Http {
        status_code: 500,
        message: "boom".to_string(),
    });

    let router = RequestRouter::builder()
        .catalog(catalog(200_000, RateLimitSpec::unlimited(), 200_000))
        .backend(a.clone())
        .backend(b.clone())
        .build()
        .unwrap();

    let result = router
        .execute(&request(), &chain(), "test", &RoutePolicy::default(), None)
        .await;

    match result {
        Err(e) => match e.kind() {
            MaestroErrorKind::Route(route) => match route.kind() {
                RouteErrorKind::AllModelsExhausted(failures) => {
                    assert_eq!(failures.len(), 2);
                    assert_eq!(failures[0].model, "model-a");
                    assert!(failures[0].reason.contains("Authentication"));
                    assert_eq!(failures[1].model, "model-b");
                }
                other => panic!("expected exhaustion, got {:?}", other),
            },
            other => panic!("expected route error, got {:?}", other),
        },
        Ok(_) => panic!("expected exhaustion"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_empty_chain_is_a_typed_error() {
    let router = RequestRouter::builder()
        .catalog(catalog(200_000, RateLimitSpec::unlimited(), 200_000))
        .build()
        .unwrap();

    let result = router
        .execute(&request(), &[], "test", &RoutePolicy::default(), None)
        .await;
    match result {
        Err(e) => match e.kind() {
            MaestroErrorKind::Route(route) => {
                assert_eq!(route.kind(), &RouteErrorKind::EmptyChain);
            }
            other => panic!("expected route error, got {:?}", other),
        },
        Ok(_) => panic!("expected error"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_success_updates_ledger_breaker_and_telemetry() {
    let a = MockBackend::new("test", "model-a");
    let ledger = Arc::new(CostLedger::new());
    let breakers = Arc::new(BreakerRegistry::new());
    let sink = Arc::new(CollectingSink::default());
    let router = RequestRouter::builder()
        .catalog(catalog(200_000, RateLimitSpec::unlimited(), 200_000))
        .backend(a.clone())
        .ledger(ledger.clone())
        .breakers(breakers.clone())
        .sink(sink.clone())
        .build()
        .unwrap();

    let routed = router
        .execute(&request(), &chain(), "test", &RoutePolicy::default(), None)
        .await
        .unwrap();

    // 100 in at $3/M + 50 out at $15/M
    let expected = 100.0 / 1e6 * 3.0 + 50.0 / 1e6 * 15.0;
    assert!((*routed.cost.cost_usd() - expected).abs() < 1e-12);
    assert!((ledger.total_for_model("test", "model-a") - expected).abs() < 1e-12);

    let events = sink.events.lock().unwrap();
    let success: Vec<_> = events
        .iter()
        .filter(|e| e.outcome == AttemptOutcome::Success)
        .collect();
    assert_eq!(success.len(), 1);
    assert_eq!(success[0].tokens_in, 100);
    assert_eq!(success[0].tokens_out, 50);
    assert!(success[0].cost_usd > 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_tier_advances_chain() {
    let a = MockBackend::new("test", "model-a");
    let b = MockBackend::new("test", "model-b");
    let router = RequestRouter::builder()
        .catalog(catalog(200_000, RateLimitSpec::unlimited(), 200_000))
        .backend(a.clone())
        .backend(b.clone())
        .build()
        .unwrap();

    // Neither model defines a "platinum" tier; the chain exhausts with
    // per-model reasons rather than panicking.
    let result = router
        .execute(&request(), &chain(), "platinum", &RoutePolicy::default(), None)
        .await;
    assert_exhausted(result);
    assert_eq!(a.calls(), 0);
    assert_eq!(b.calls(), 0);
}
