//! # Throttler
//!
//! A rate-limited, retrying HTTP transport decorator.
//!
//! A [`Throttler`] wraps any [`Transport`] and spaces every attempt, across
//! all concurrent callers, by a fixed interval. Attempts that fail without a
//! response, come back with a retryable status (429, 502 by default), or whose
//! body contains a retry marker (`"exceeded"` by default) are retried with
//! exponential backoff until the per-request attempt limit is reached.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use throttler::{Result, Throttler};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // 5 requests per second, at most 3 attempts each
//!     let throttler = Throttler::new(5, 3)?;
//!
//!     let request = reqwest::Request::new(
//!         reqwest::Method::GET,
//!         "https://api.example.com/items".parse()?,
//!     );
//!     let response = throttler.dispatch(request).await?;
//!     println!("{} {}", response.status(), response.text().await?);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Throttler (dispatch / tower Service)            │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌────────────────┬─────────────┴──┬────────────────┬──────────────┐
//! │   Rate Gate    │   Transport    │   Classifier   │   Backoff    │
//! ├────────────────┼────────────────┼────────────────┼──────────────┤
//! │ Ticker         │ reqwest        │ No response    │ 1s doubling  │
//! │ Token bucket   │ Any Transport  │ Retry statuses │ Wrap / Cap   │
//! │ Shared by all  │ (nestable)     │ Body marker    │ Cancellable  │
//! └────────────────┴────────────────┴────────────────┴──────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common enums shared by config and CLI
pub mod types;

/// Throttler configuration
pub mod config;

/// Transport abstraction and response type
pub mod http;

/// Rate gate, classification, backoff and the throttler itself
pub mod throttle;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{BoxError, Error, Result};
pub use types::*;

pub use config::{BackoffConfig, GateConfig, ThrottlerConfig, TransportConfig};
pub use http::{ReqwestTransport, Response, Transport, TransportFailure};
pub use throttle::{
    BackoffPolicy, RateGate, TickerGate, TokenBucketGate, ThrottleLayer, Throttler,
    ThrottlerBuilder,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
