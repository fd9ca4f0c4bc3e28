//! Retry classification
//!
//! Decides whether the outcome of one attempt is final or should be
//! retried. Checks run in a fixed order:
//!
//! 1. no response at all: retry
//! 2. transport error reported with a response, or marked terminal: final error
//! 3. status in the retry list: retry, body untouched
//! 4. body contains the retry marker: retry
//!
//! Anything else is delivered to the caller.

use crate::error::{Error, Result};
use crate::http::{Response, TransportFailure};
use bytes::Bytes;
use reqwest::StatusCode;
use tracing::{debug, warn};

/// Why an attempt is being retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    /// The transport failed before producing a response
    NoResponse { cause: String },
    /// The status is in the retry list
    Status(StatusCode),
    /// The body contains the retry marker
    Marker,
}

impl std::fmt::Display for RetryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryReason::NoResponse { cause } => write!(f, "no response ({cause})"),
            RetryReason::Status(status) => write!(f, "status {}", status.as_u16()),
            RetryReason::Marker => write!(f, "retry marker in body"),
        }
    }
}

/// Outcome of classifying one attempt
#[derive(Debug)]
pub enum Verdict {
    /// Back off and try again
    Retry(RetryReason),
    /// Hand this to the caller
    Deliver(Result<Response>),
}

impl Verdict {
    /// Whether this verdict asks for another attempt
    pub fn is_retry(&self) -> bool {
        matches!(self, Verdict::Retry(_))
    }
}

/// Classifies attempt outcomes for one throttler
#[derive(Debug, Clone)]
pub struct Classifier {
    marker: Option<Bytes>,
    statuses: Vec<StatusCode>,
}

impl Classifier {
    /// Create a classifier; `marker = None` skips body inspection
    pub fn new(marker: Option<String>, statuses: Vec<StatusCode>) -> Self {
        Self {
            marker: marker.map(Bytes::from),
            statuses,
        }
    }

    /// Configured marker
    pub fn marker(&self) -> Option<&[u8]> {
        self.marker.as_deref()
    }

    /// Statuses retried without reading the body
    pub fn statuses(&self) -> &[StatusCode] {
        &self.statuses
    }

    /// Classify the outcome of one attempt.
    ///
    /// A delivered response whose body was inspected comes back buffered,
    /// holding exactly the bytes the server sent.
    pub async fn classify(
        &self,
        outcome: std::result::Result<Response, TransportFailure>,
    ) -> Verdict {
        let mut response = match outcome {
            Ok(response) => response,
            Err(failure) if failure.is_terminal() => {
                let (source, _) = failure.into_parts();
                let error = match source.downcast::<Error>() {
                    Ok(error) => *error,
                    Err(source) => Error::Transport { source },
                };
                debug!(error = %error, "transport reported a terminal failure");
                return Verdict::Deliver(Err(error));
            }
            Err(failure) => {
                let (source, response) = failure.into_parts();
                return match response {
                    None => Verdict::Retry(RetryReason::NoResponse {
                        cause: source.to_string(),
                    }),
                    Some(response) => {
                        debug!(
                            status = response.status().as_u16(),
                            "transport reported an error alongside a response"
                        );
                        Verdict::Deliver(Err(Error::Transport { source }))
                    }
                };
            }
        };

        let status = response.status();
        if self.statuses.contains(&status) {
            return Verdict::Retry(RetryReason::Status(status));
        }

        let Some(marker) = &self.marker else {
            return Verdict::Deliver(Ok(response));
        };

        let marked = match response.buffer().await {
            Ok(body) => contains(body, marker),
            Err(e) => {
                warn!(
                    status = status.as_u16(),
                    error = %e,
                    "response body could not be buffered, delivering truncated body"
                );
                false
            }
        };

        if marked {
            Verdict::Retry(RetryReason::Marker)
        } else {
            Verdict::Deliver(Ok(response))
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}
