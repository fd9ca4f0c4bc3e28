//! The request-execution seam
//!
//! A [`Transport`] turns a request into a response or a failure. The
//! throttler only consumes this capability; connection handling, TLS and
//! DNS all live behind it.

use super::response::Response;
use crate::config::TransportConfig;
use crate::error::{BoxError, Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Request};
use std::sync::Arc;
use std::time::Duration;

/// A failed exchange.
///
/// Most failures carry no response at all (connection refused, reset,
/// timeout). Some transports still hand back a response alongside the
/// error; the throttler treats those two cases differently. A failure
/// built with [`TransportFailure::terminal`] is never retried.
#[derive(Debug)]
pub struct TransportFailure {
    source: BoxError,
    response: Option<Response>,
    terminal: bool,
}

impl TransportFailure {
    /// Failure with no response object
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
            response: None,
            terminal: false,
        }
    }

    /// Failure reported together with a response
    pub fn with_response(source: impl Into<BoxError>, response: Response) -> Self {
        Self {
            source: source.into(),
            response: Some(response),
            terminal: false,
        }
    }

    /// Failure that ends the call as is, e.g. a nested throttler's final error
    pub fn terminal(error: Error) -> Self {
        Self {
            source: Box::new(error),
            response: None,
            terminal: true,
        }
    }

    /// Whether the failure must be handed to the caller without a retry
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// The response reported with the failure, if any
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Split into the cause and the optional response
    pub fn into_parts(self) -> (BoxError, Option<Response>) {
        (self.source, self.response)
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for TransportFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

/// Executes one HTTP exchange
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return what came back
    async fn round_trip(
        &self,
        request: Request,
    ) -> std::result::Result<Response, TransportFailure>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn round_trip(
        &self,
        request: Request,
    ) -> std::result::Result<Response, TransportFailure> {
        (**self).round_trip(request).await
    }
}

/// Transport backed by a reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with default settings
    pub fn new() -> Result<Self> {
        Self::from_config(&TransportConfig::default())
    }

    /// Create a transport from configuration
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn round_trip(
        &self,
        request: Request,
    ) -> std::result::Result<Response, TransportFailure> {
        self.client
            .execute(request)
            .await
            .map(Response::from)
            .map_err(TransportFailure::new)
    }
}
