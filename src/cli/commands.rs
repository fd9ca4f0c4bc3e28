//! CLI commands and argument parsing

use crate::types::{LogLevel, Method};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rate-limited, retrying HTTP fetcher
#[derive(Parser, Debug)]
#[command(name = "throttler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML, or JSON with a .json extension)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Requests per second shared by all requests
    #[arg(long, global = true)]
    pub rps: Option<u32>,

    /// Maximum attempts per request
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// Body substring that forces a retry
    #[arg(long, global = true, conflicts_with = "no_marker")]
    pub marker: Option<String>,

    /// Do not inspect response bodies
    #[arg(long, global = true)]
    pub no_marker: bool,

    /// Default log level (RUST_LOG takes precedence)
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a request through the throttler
    Fetch {
        /// Target URL
        url: String,

        /// HTTP method
        #[arg(short = 'X', long, value_enum, default_value = "GET")]
        method: Method,

        /// Extra header, as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(short, long)]
        data: Option<String>,

        /// Number of concurrent copies of the request
        #[arg(short = 'n', long, default_value = "1")]
        repeat: usize,

        /// Include response bodies in the output
        #[arg(long)]
        print_body: bool,
    },

    /// Print the effective configuration as YAML
    Config,
}
