//! Rate-limited, retrying transport decorator
//!
//! Every attempt first takes a slot from the shared rate gate, then runs
//! against the wrapped transport. Retryable outcomes are followed by a
//! backoff sleep and another attempt until the retry limit is reached.

use super::backoff::BackoffPolicy;
use super::classify::{Classifier, Verdict};
use super::gate::{RateGate, TickerGate, TokenBucketGate};
use crate::config::{ThrottlerConfig, TransportConfig};
use crate::error::{Error, Result};
use crate::http::{ReqwestTransport, Response, Transport, TransportFailure};
use crate::types::{BackoffOverflow, GateKind};
use async_trait::async_trait;
use reqwest::{Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct Inner {
    transport: Arc<dyn Transport>,
    gate: Arc<dyn RateGate>,
    classifier: Classifier,
    backoff: BackoffPolicy,
    retry_limit: u32,
}

/// Rate-limited, retrying transport.
///
/// Cloning is cheap and every clone shares the same rate gate, so one
/// throttler (or any number of clones) enforces a single outbound rate.
#[derive(Clone)]
pub struct Throttler {
    inner: Arc<Inner>,
}

impl Throttler {
    /// Create a throttler over the default reqwest transport
    pub fn new(requests_per_second: u32, retry_limit: u32) -> Result<Self> {
        Self::builder(requests_per_second, retry_limit).build()
    }

    /// Start building a throttler
    pub fn builder(requests_per_second: u32, retry_limit: u32) -> ThrottlerBuilder {
        ThrottlerBuilder::from_config(ThrottlerConfig {
            requests_per_second,
            retry_limit,
            ..ThrottlerConfig::default()
        })
    }

    /// Create a throttler from configuration
    pub fn from_config(config: &ThrottlerConfig) -> Result<Self> {
        ThrottlerBuilder::from_config(config.clone()).build()
    }

    pub(crate) fn assemble(
        transport: Arc<dyn Transport>,
        gate: Arc<dyn RateGate>,
        classifier: Classifier,
        backoff: BackoffPolicy,
        retry_limit: u32,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                gate,
                classifier,
                backoff,
                retry_limit,
            }),
        }
    }

    /// Maximum attempts per dispatch
    pub fn retry_limit(&self) -> u32 {
        self.inner.retry_limit
    }

    /// Time between two rate gate permits
    pub fn interval(&self) -> Duration {
        self.inner.gate.interval()
    }

    /// Body marker that forces a retry
    pub fn retry_marker(&self) -> Option<&str> {
        self.inner
            .classifier
            .marker()
            .and_then(|marker| std::str::from_utf8(marker).ok())
    }

    /// Backoff policy applied between attempts
    pub fn backoff(&self) -> BackoffPolicy {
        self.inner.backoff
    }

    /// Send a request, waiting for rate slots and retrying as needed
    pub async fn dispatch(&self, request: Request) -> Result<Response> {
        self.dispatch_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Send a request that the caller can abandon through `cancel`.
    ///
    /// Cancellation is observed while waiting for a slot, during the
    /// exchange itself and during backoff sleeps.
    pub async fn dispatch_with_cancel(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let inner = &*self.inner;
        let retry_limit = inner.retry_limit;
        let mut backoff = inner.backoff.start();
        let mut template = Some(request);

        for attempt in 1..=retry_limit {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = inner.gate.acquire() => {}
            }

            let request = next_request(&mut template)?;
            debug!(
                attempt,
                retry_limit,
                method = %request.method(),
                url = %request.url(),
                "dispatching attempt"
            );

            let verdict = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                verdict = async {
                    let outcome = inner.transport.round_trip(request).await;
                    inner.classifier.classify(outcome).await
                } => verdict,
            };

            let reason = match verdict {
                Verdict::Deliver(result) => {
                    debug!(attempt, ok = result.is_ok(), "attempt is final");
                    return result;
                }
                Verdict::Retry(reason) => reason,
            };

            if attempt == retry_limit {
                warn!(%reason, attempt, retry_limit, "retries exhausted");
                break;
            }
            if template.is_none() {
                warn!(
                    %reason,
                    attempt,
                    "retryable outcome but the request body cannot be replayed"
                );
                return Err(Error::RequestNotReplayable);
            }

            let delay = backoff.advance();
            warn!(
                %reason,
                attempt,
                retry_limit,
                delay_ms = delay.as_millis() as u64,
                "retrying request"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }

        Err(Error::RetriesExceeded { retry_limit })
    }
}

/// Clone the caller's request for the next attempt. A request that cannot
/// be cloned is sent as is, leaving nothing to replay afterwards.
fn next_request(template: &mut Option<Request>) -> Result<Request> {
    if let Some(request) = template.as_ref().and_then(Request::try_clone) {
        return Ok(request);
    }
    template.take().ok_or(Error::RequestNotReplayable)
}

#[async_trait]
impl Transport for Throttler {
    async fn round_trip(
        &self,
        request: Request,
    ) -> std::result::Result<Response, TransportFailure> {
        // only exhaustion stays retryable for an outer throttler
        self.dispatch(request).await.map_err(|error| match error {
            Error::RetriesExceeded { .. } => TransportFailure::new(error),
            error => TransportFailure::terminal(error),
        })
    }
}

impl std::fmt::Debug for Throttler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttler")
            .field("retry_limit", &self.inner.retry_limit)
            .field("interval", &self.interval())
            .field("retry_marker", &self.retry_marker())
            .field("retry_statuses", &self.inner.classifier.statuses())
            .field("backoff", &self.inner.backoff)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Throttler`]
pub struct ThrottlerBuilder {
    config: ThrottlerConfig,
    backoff: Option<BackoffPolicy>,
    transport: Option<Arc<dyn Transport>>,
    gate: Option<Arc<dyn RateGate>>,
}

impl ThrottlerBuilder {
    /// Start from a configuration
    pub fn from_config(config: ThrottlerConfig) -> Self {
        Self {
            config,
            backoff: None,
            transport: None,
            gate: None,
        }
    }

    /// Set the body marker that forces a retry
    #[must_use]
    pub fn retry_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.retry_marker = Some(marker.into());
        self
    }

    /// Do not inspect bodies at all
    #[must_use]
    pub fn no_retry_marker(mut self) -> Self {
        self.config.retry_marker = None;
        self
    }

    /// Set the statuses retried without reading the body
    #[must_use]
    pub fn retry_statuses(mut self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.config.retry_statuses = statuses.into_iter().map(|s| s.as_u16()).collect();
        self
    }

    /// Set the backoff between attempts
    #[must_use]
    pub fn backoff(
        mut self,
        initial: Duration,
        ceiling: Duration,
        overflow: BackoffOverflow,
    ) -> Self {
        self.backoff = Some(BackoffPolicy::new(initial, ceiling, overflow));
        self
    }

    /// Choose the built-in gate implementation
    #[must_use]
    pub fn gate_kind(mut self, kind: GateKind, burst: u32) -> Self {
        self.config.gate.kind = kind;
        self.config.gate.burst = burst;
        self
    }

    /// Use a custom rate gate
    #[must_use]
    pub fn gate(mut self, gate: impl RateGate + 'static) -> Self {
        self.gate = Some(Arc::new(gate));
        self
    }

    /// Wrap a custom transport instead of the default reqwest one
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Settings for the default reqwest transport
    #[must_use]
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.config.transport = config;
        self
    }

    /// Build the throttler; the rate gate starts ticking now
    pub fn build(self) -> Result<Throttler> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::from_config(&self.config.transport)?),
        };
        let gate = self.gate.unwrap_or_else(|| gate_from_config(&self.config));
        let classifier = Classifier::new(
            self.config.retry_marker.clone(),
            self.config.retry_status_codes()?,
        );
        let backoff = self
            .backoff
            .unwrap_or_else(|| self.config.backoff.policy());

        Ok(Throttler::assemble(
            transport,
            gate,
            classifier,
            backoff,
            self.config.retry_limit,
        ))
    }
}

/// Build the gate a configuration asks for
pub(crate) fn gate_from_config(config: &ThrottlerConfig) -> Arc<dyn RateGate> {
    match config.gate.kind {
        GateKind::Ticker => Arc::new(TickerGate::new(config.interval())),
        GateKind::TokenBucket => {
            Arc::new(TokenBucketGate::new(config.interval(), config.gate.burst))
        }
    }
}
