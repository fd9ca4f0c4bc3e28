//! Tower integration
//!
//! A [`Throttler`] is a `tower::Service<reqwest::Request>`, and
//! [`ThrottleLayer`] wraps any [`Transport`] into one. Every service made by
//! the same layer shares the layer's rate gate.

use super::backoff::BackoffPolicy;
use super::classify::Classifier;
use super::gate::RateGate;
use super::throttler::{gate_from_config, Throttler};
use crate::config::ThrottlerConfig;
use crate::error::{Error, Result};
use crate::http::{Response, Transport};
use futures::future::BoxFuture;
use reqwest::Request;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

impl Service<Request> for Throttler {
    type Response = Response;
    type Error = Error;
    type Future = BoxFuture<'static, Result<Response>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        // waiting happens per call, at the rate gate
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let throttler = self.clone();
        Box::pin(async move { throttler.dispatch(request).await })
    }
}

/// Layer producing throttlers that share one rate gate
#[derive(Clone)]
pub struct ThrottleLayer {
    gate: Arc<dyn RateGate>,
    classifier: Classifier,
    backoff: BackoffPolicy,
    retry_limit: u32,
}

impl ThrottleLayer {
    /// Create a layer from configuration; the gate starts ticking now
    pub fn new(config: &ThrottlerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            gate: gate_from_config(config),
            classifier: Classifier::new(config.retry_marker.clone(), config.retry_status_codes()?),
            backoff: config.backoff.policy(),
            retry_limit: config.retry_limit,
        })
    }

    /// Use a custom rate gate for every wrapped transport
    #[must_use]
    pub fn with_gate(mut self, gate: impl RateGate + 'static) -> Self {
        self.gate = Arc::new(gate);
        self
    }
}

impl<T: Transport + 'static> Layer<T> for ThrottleLayer {
    type Service = Throttler;

    fn layer(&self, inner: T) -> Self::Service {
        Throttler::assemble(
            Arc::new(inner),
            Arc::clone(&self.gate),
            self.classifier.clone(),
            self.backoff,
            self.retry_limit,
        )
    }
}

impl std::fmt::Debug for ThrottleLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottleLayer")
            .field("interval", &self.gate.interval())
            .field("retry_limit", &self.retry_limit)
            .finish_non_exhaustive()
    }
}
