//! CLI module
//!
//! Command-line interface for sending requests through a throttler.
//!
//! # Commands
//!
//! - `fetch` - Dispatch one or more concurrent copies of a request
//! - `config` - Print the effective configuration

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::{build_request, Runner};
