//! The request router: wait, retry, substitute, or fail.

use crate::{
    AttemptEvent, AttemptOutcome, BackendRegistry, BackendResponse, ErrorClassifier,
    ErrorDisposition, ModelBackend, NoopSink, StatusClassifier, TelemetrySink,
};
use maestro_catalog::{Catalog, ModelDescriptor, ModelRef, RateLimitSpec};
use maestro_core::{ContextSizer, GenerateRequest, GenerateResponse, RoutePolicy, TokenUsage, TokenizerProfile};
use maestro_error::{
    ConfigError, MaestroResult, ModelFailure, ProviderError, ProviderErrorKind, RouteError,
    RouteErrorKind,
};
use maestro_ledger::{CostEntry, CostLedger};
use maestro_rate_limit::{BreakerRegistry, RateLimitTracker, UsageKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Floor wait when a provider reports throttling without a retry-after hint.
const PROVIDER_BACKOFF_FLOOR_SECONDS: f64 = 2.0;

/// A served request: the response plus its accounting.
#[derive(Debug, Clone)]
pub struct Routed {
    /// The generated output
    pub response: GenerateResponse,
    /// Token usage for the winning call
    pub usage: TokenUsage,
    /// The ledger entry recorded for the winning call
    pub cost: CostEntry,
}

/// What became of one model in the chain.
enum ModelOutcome {
    /// The model served the request.
    Served(Routed),
    /// Advance to the next model, for this reason.
    Advance(String),
}

/// Routes requests across a fallback chain of models.
///
/// Per model, the router favors waiting out predicted throttling over
/// degrading to a fallback; it only advances the chain on capability
/// mismatches, open breakers, exhausted retry budgets, and non-retriable
/// provider errors. Budget and deadline expiry are hard stops that
/// preempt any further fallback.
///
/// Many callers may invoke [`RequestRouter::execute`] concurrently; the
/// only shared mutable state lives behind the tracker's and breakers'
/// per-key locks and the ledger's append lock.
pub struct RequestRouter {
    catalog: Arc<Catalog>,
    backends: BackendRegistry,
    tracker: Arc<RateLimitTracker>,
    breakers: Arc<BreakerRegistry>,
    ledger: Arc<CostLedger>,
    sizer: Arc<ContextSizer>,
    classifier: Arc<dyn ErrorClassifier>,
    sink: Arc<dyn TelemetrySink>,
}

impl RequestRouter {
    /// Creates a new router builder.
    pub fn builder() -> RequestRouterBuilder {
        RequestRouterBuilder::default()
    }

    /// The ledger this router records costs into.
    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    /// The tracker this router reserves capacity with.
    pub fn tracker(&self) -> &Arc<RateLimitTracker> {
        &self.tracker
    }

    /// Execute a request against an ordered fallback chain.
    ///
    /// Models are tried in priority order. For each: an open circuit
    /// breaker skips the model with no wait; a payload exceeding the
    /// context window skips it as a capability mismatch (never retried);
    /// otherwise a bounded retry loop waits out predicted throttling,
    /// sleeping `wait * backoff_base^attempt` between attempts.
    ///
    /// # Errors
    ///
    /// - `BudgetExceeded` before any attempt (and between attempts) once a
    ///   configured spend ceiling is hit; no fallback is tried.
    /// - `DeadlineExceeded` when the caller's deadline expires during a
    ///   wait or an in-flight call.
    /// - `AllModelsExhausted` carrying per-model reasons when the chain
    ///   runs out.
    #[instrument(skip(self, request, chain, policy, deadline), fields(chain_len = chain.len(), tier))]
    pub async fn execute(
        &self,
        request: &GenerateRequest,
        chain: &[ModelRef],
        tier: &str,
        policy: &RoutePolicy,
        deadline: Option<Instant>,
    ) -> MaestroResult<Routed> {
        if chain.is_empty() {
            return Err(RouteError::new(RouteErrorKind::EmptyChain).into());
        }

        // Spending into the red is worse than failing the request, so the
        // budget gate runs before any model is attempted.
        self.ledger.check_budget(policy)?;

        let mut failures: Vec<ModelFailure> = Vec::with_capacity(chain.len());

        for model in chain {
            let descriptor = match self.catalog.resolve_ref(model) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    debug!(%model, "Model missing from catalog, advancing chain");
                    failures.push(failure(model, e.kind.to_string()));
                    continue;
                }
            };

            if !self.breakers.allow(model) {
                debug!(%model, "Circuit breaker open, skipping without wait");
                self.emit(AttemptEvent {
                    outcome: AttemptOutcome::Skipped,
                    error_kind: Some("breaker_open".to_string()),
                    ..base_event(model, tier, 0)
                });
                failures.push(failure(model, "circuit breaker open".to_string()));
                continue;
            }

            let profile = TokenizerProfile::for_model(&model.name);
            let estimated_tokens = self.sizer.estimate(request, &profile);
            if estimated_tokens > *descriptor.context_window_tokens() {
                // Capability mismatch: no rate-limit wait can fix this, and
                // it is never retried against the same model.
                debug!(
                    %model,
                    estimated_tokens,
                    context_window = *descriptor.context_window_tokens(),
                    "Context window too small, advancing chain"
                );
                self.emit(AttemptEvent {
                    outcome: AttemptOutcome::Skipped,
                    tokens_in: estimated_tokens,
                    error_kind: Some("capability_mismatch".to_string()),
                    ..base_event(model, tier, 0)
                });
                failures.push(failure(
                    model,
                    RouteErrorKind::CapabilityMismatch {
                        required_tokens: estimated_tokens,
                        context_window_tokens: *descriptor.context_window_tokens(),
                    }
                    .to_string(),
                ));
                continue;
            }

            let limits = match descriptor.limits_for_tier(tier) {
                Ok(spec) => *spec,
                Err(e) => {
                    failures.push(failure(model, e.kind.to_string()));
                    continue;
                }
            };

            let key = UsageKey::from_ref(model, tier);
            let outcome = self
                .try_model(
                    request,
                    model,
                    descriptor,
                    &key,
                    &limits,
                    estimated_tokens,
                    tier,
                    policy,
                    deadline,
                )
                .await?;

            match outcome {
                ModelOutcome::Served(routed) => return Ok(routed),
                ModelOutcome::Advance(reason) => failures.push(failure(model, reason)),
            }
        }

        Err(RouteError::new(RouteErrorKind::AllModelsExhausted(failures)).into())
    }

    /// Run the bounded retry loop for one model.
    ///
    /// Returns `Err` only for hard stops (budget, deadline); everything
    /// that should merely advance the chain comes back as
    /// `ModelOutcome::Advance`.
    #[allow(clippy::too_many_arguments)]
    async fn try_model(
        &self,
        request: &GenerateRequest,
        model: &ModelRef,
        descriptor: &ModelDescriptor,
        key: &UsageKey,
        limits: &RateLimitSpec,
        estimated_tokens: u64,
        tier: &str,
        policy: &RoutePolicy,
        deadline: Option<Instant>,
    ) -> MaestroResult<ModelOutcome> {
        let mut attempt: u32 = 0;

        loop {
            // Concurrent callers may have spent the budget since the last
            // check; the ceiling preempts further attempts everywhere.
            self.ledger.check_budget(policy)?;

            let decision = self.tracker.can_proceed(key, limits, estimated_tokens);
            if !decision.allowed {
                let wait_seconds = decision.wait_seconds();
                if wait_seconds > *policy.max_wait_seconds() || attempt >= *policy.max_retries() {
                    self.emit(AttemptEvent {
                        outcome: AttemptOutcome::Fallback,
                        wait_seconds,
                        error_kind: Some("rate_limited".to_string()),
                        ..base_event(model, tier, attempt)
                    });
                    return Ok(ModelOutcome::Advance(
                        RouteErrorKind::RateLimited { wait_seconds }.to_string(),
                    ));
                }

                // Waiting on the preferred model beats degrading to a
                // fallback: sleep and re-query the same model.
                let sleep_seconds = policy.backoff_seconds(wait_seconds, attempt);
                debug!(%model, attempt, sleep_seconds, "Waiting for predicted capacity");
                self.emit(AttemptEvent {
                    outcome: AttemptOutcome::Waited,
                    wait_seconds: sleep_seconds,
                    ..base_event(model, tier, attempt)
                });
                self.sleep_through(sleep_seconds, deadline).await?;
                attempt += 1;
                continue;
            }

            let Some(backend) = self.backends.get(model) else {
                return Ok(ModelOutcome::Advance("no backend registered".to_string()));
            };

            debug!(%model, attempt, estimated_tokens, "Issuing call");
            let result = self.call_backend(backend.as_ref(), request, deadline).await?;

            match result {
                Ok(served) => return Ok(ModelOutcome::Served(self.complete(
                    served, model, descriptor, key, tier, attempt,
                ))),
                Err(provider_error) => {
                    // Anything the provider answered still consumed a
                    // request slot; connection failures never arrived.
                    if !matches!(provider_error.kind, ProviderErrorKind::Connection(_)) {
                        self.tracker.record_usage(key, 0);
                    }

                    match self.classifier.classify(&provider_error) {
                        ErrorDisposition::RateLimited {
                            retry_after_seconds,
                        } => {
                            // The provider's live signal takes precedence
                            // over the tracker's prediction.
                            let wait_seconds = retry_after_seconds
                                .unwrap_or(PROVIDER_BACKOFF_FLOOR_SECONDS);
                            if attempt >= *policy.max_retries()
                                || wait_seconds > *policy.max_wait_seconds()
                            {
                                self.emit(AttemptEvent {
                                    outcome: AttemptOutcome::Fallback,
                                    wait_seconds,
                                    error_kind: Some("rate_limited".to_string()),
                                    ..base_event(model, tier, attempt)
                                });
                                return Ok(ModelOutcome::Advance(format!(
                                    "retry budget exhausted: {}",
                                    provider_error.kind
                                )));
                            }

                            let sleep_seconds = policy.backoff_seconds(wait_seconds, attempt);
                            debug!(%model, attempt, sleep_seconds, "Provider throttled, backing off");
                            self.emit(AttemptEvent {
                                outcome: AttemptOutcome::RateLimited,
                                wait_seconds: sleep_seconds,
                                error_kind: Some("rate_limited".to_string()),
                                ..base_event(model, tier, attempt)
                            });
                            self.sleep_through(sleep_seconds, deadline).await?;
                            attempt += 1;
                        }
                        disposition => {
                            // Terminal for this model: charge the breaker
                            // and advance the chain with no further retries.
                            self.breakers.record_failure(model);
                            warn!(%model, error = %provider_error, "Backend failed, advancing chain");
                            self.emit(AttemptEvent {
                                outcome: AttemptOutcome::Failed,
                                error_kind: Some(disposition.label().to_string()),
                                ..base_event(model, tier, attempt)
                            });
                            return Ok(ModelOutcome::Advance(provider_error.kind.to_string()));
                        }
                    }
                }
            }
        }
    }

    /// Book a successful call: usage, cost, breaker, telemetry.
    fn complete(
        &self,
        served: BackendResponse,
        model: &ModelRef,
        descriptor: &ModelDescriptor,
        key: &UsageKey,
        tier: &str,
        attempt: u32,
    ) -> Routed {
        let usage = served.usage;
        self.tracker.record_usage(key, *usage.total_tokens());
        let cost = self
            .ledger
            .record_cost(descriptor, *usage.prompt_tokens(), *usage.completion_tokens());
        self.breakers.record_success(model);

        self.emit(AttemptEvent {
            outcome: AttemptOutcome::Success,
            tokens_in: *usage.prompt_tokens(),
            tokens_out: *usage.completion_tokens(),
            cost_usd: *cost.cost_usd(),
            ..base_event(model, tier, attempt)
        });

        Routed {
            response: served.response,
            usage,
            cost,
        }
    }

    /// Issue the call, bounded by the caller's deadline.
    async fn call_backend(
        &self,
        backend: &dyn ModelBackend,
        request: &GenerateRequest,
        deadline: Option<Instant>,
    ) -> MaestroResult<Result<BackendResponse, ProviderError>> {
        match deadline {
            None => Ok(backend.generate(request).await),
            Some(at) => match tokio::time::timeout_at(at, backend.generate(request)).await {
                Ok(result) => Ok(result),
                Err(_) => Err(RouteError::new(RouteErrorKind::DeadlineExceeded).into()),
            },
        }
    }

    /// Cancellable backoff sleep.
    ///
    /// Deadline expiry aborts the wait immediately rather than finishing
    /// the sleep; state already recorded for earlier attempts stays put.
    async fn sleep_through(&self, seconds: f64, deadline: Option<Instant>) -> MaestroResult<()> {
        let wait = Duration::from_secs_f64(seconds.max(0.0));
        match deadline {
            None => {
                tokio::time::sleep(wait).await;
                Ok(())
            }
            Some(at) => {
                tokio::select! {
                    biased;
                    _ = tokio::time::sleep_until(at) => {
                        Err(RouteError::new(RouteErrorKind::DeadlineExceeded).into())
                    }
                    _ = tokio::time::sleep(wait) => Ok(()),
                }
            }
        }
    }

    /// Deliver an event, logging and swallowing sink failures.
    fn emit(&self, event: AttemptEvent) {
        if let Err(e) = self.sink.report(&event) {
            warn!(error = %e, "Telemetry delivery failed");
        }
    }
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter")
            .field("catalog_models", &self.catalog.len())
            .field("backends", &self.backends)
            .finish()
    }
}

/// An event skeleton with the identifying fields filled in.
fn base_event(model: &ModelRef, tier: &str, attempt: u32) -> AttemptEvent {
    AttemptEvent {
        provider: model.provider.clone(),
        model: model.name.clone(),
        tier: tier.to_string(),
        attempt,
        outcome: AttemptOutcome::Failed,
        wait_seconds: 0.0,
        tokens_in: 0,
        tokens_out: 0,
        cost_usd: 0.0,
        error_kind: None,
    }
}

/// A per-model failure record for the exhaustion error.
fn failure(model: &ModelRef, reason: String) -> ModelFailure {
    ModelFailure {
        provider: model.provider.clone(),
        model: model.name.clone(),
        reason,
    }
}

/// Builder for `RequestRouter`.
///
/// The catalog is required; every other collaborator has a sensible
/// default (fresh tracker/breakers/ledger, status-code classifier, no-op
/// telemetry sink).
#[derive(Default)]
pub struct RequestRouterBuilder {
    catalog: Option<Arc<Catalog>>,
    backends: BackendRegistry,
    tracker: Option<Arc<RateLimitTracker>>,
    breakers: Option<Arc<BreakerRegistry>>,
    ledger: Option<Arc<CostLedger>>,
    sizer: Option<Arc<ContextSizer>>,
    classifier: Option<Arc<dyn ErrorClassifier>>,
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl RequestRouterBuilder {
    /// Sets the model catalog (required).
    pub fn catalog(mut self, catalog: Arc<Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Registers a backend.
    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.backends.register(backend);
        self
    }

    /// Sets the rate limit tracker.
    pub fn tracker(mut self, tracker: Arc<RateLimitTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Sets the breaker registry.
    pub fn breakers(mut self, breakers: Arc<BreakerRegistry>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    /// Sets the cost ledger.
    pub fn ledger(mut self, ledger: Arc<CostLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Sets the context sizer.
    pub fn sizer(mut self, sizer: Arc<ContextSizer>) -> Self {
        self.sizer = Some(sizer);
        self
    }

    /// Sets the error classifier.
    pub fn classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Sets the telemetry sink.
    pub fn sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds the router.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no catalog was provided.
    pub fn build(self) -> MaestroResult<RequestRouter> {
        let catalog = self
            .catalog
            .ok_or_else(|| ConfigError::new("RequestRouter requires a catalog"))?;

        Ok(RequestRouter {
            catalog,
            backends: self.backends,
            tracker: self.tracker.unwrap_or_else(|| Arc::new(RateLimitTracker::new())),
            breakers: self.breakers.unwrap_or_else(|| Arc::new(BreakerRegistry::new())),
            ledger: self.ledger.unwrap_or_else(|| Arc::new(CostLedger::new())),
            sizer: self.sizer.unwrap_or_else(|| Arc::new(ContextSizer::new())),
            classifier: self.classifier.unwrap_or_else(|| Arc::new(StatusClassifier)),
            sink: self.sink.unwrap_or_else(|| Arc::new(NoopSink)),
        })
    }
}
