//! HTTP module
//!
//! Provides the transport seam the throttler decorates and the response
//! type that flows through it.
//!
//! # Features
//!
//! - **Transport trait**: one async `round_trip` per exchange
//! - **Reqwest transport**: default implementation over a reqwest client
//! - **Peekable bodies**: buffer a body once, inspect it, hand it back intact

mod response;
mod transport;

pub use response::Response;
pub use transport::{ReqwestTransport, Transport, TransportFailure};
