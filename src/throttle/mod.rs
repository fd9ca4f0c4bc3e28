//! Throttle module
//!
//! Wraps a transport with a shared outbound rate limit and
//! retry-with-backoff for throttled or failed exchanges.
//!
//! # Features
//!
//! - **Rate Gate**: one fixed-interval ticker (or token bucket) per throttler
//! - **Retry Classification**: no response, retry statuses, body marker
//! - **Backoff**: doubling delay that wraps (or caps) at a ceiling
//! - **Cancellation**: every wait races a caller-supplied token
//! - **Tower**: `Service` impl and a `Layer` sharing one gate

mod backoff;
mod classify;
mod gate;
mod service;
mod throttler;

pub use backoff::{Backoff, BackoffPolicy, BACKOFF_CEILING, INITIAL_BACKOFF};
pub use classify::{Classifier, RetryReason, Verdict};
pub use gate::{RateGate, TickerGate, TokenBucketGate};
pub use service::ThrottleLayer;
pub use throttler::{Throttler, ThrottlerBuilder};
