//! Throttler CLI
//!
//! Sends requests through a rate-limited, retrying transport

use clap::Parser;
use throttler::cli::{Cli, Runner};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays one JSON line per request
    let level: tracing::Level = cli.log_level.into();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    let runner = Runner::new(cli);

    match runner.run().await {
        Ok(0) => {}
        Ok(failed) => {
            eprintln!("Error: {failed} request(s) failed");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
