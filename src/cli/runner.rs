//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::config::ThrottlerConfig;
use crate::error::{Error, Result};
use crate::throttle::Throttler;
use crate::types::Method;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Request;
use serde_json::{json, Value};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command, returning how many requests failed
    pub async fn run(&self) -> Result<usize> {
        match &self.cli.command {
            Commands::Fetch {
                url,
                method,
                headers,
                data,
                repeat,
                print_body,
            } => {
                let request = build_request(url, *method, headers, data.as_deref())?;
                self.fetch(request, *repeat, *print_body).await
            }
            Commands::Config => {
                let config = self.effective_config()?;
                print!("{}", serde_yaml::to_string(&config)?);
                Ok(0)
            }
        }
    }

    /// Config file (if any) with command-line overrides applied
    pub fn effective_config(&self) -> Result<ThrottlerConfig> {
        let mut config = match &self.cli.config {
            Some(path) => ThrottlerConfig::load(path)?,
            None => ThrottlerConfig::default(),
        };

        if let Some(rps) = self.cli.rps {
            config.requests_per_second = rps;
        }
        if let Some(retries) = self.cli.retries {
            config.retry_limit = retries;
        }
        if let Some(marker) = &self.cli.marker {
            config.retry_marker = Some(marker.clone());
        }
        if self.cli.no_marker {
            config.retry_marker = None;
        }

        config.validate()?;
        Ok(config)
    }

    /// Dispatch `repeat` copies of `request` concurrently, one JSON line each
    async fn fetch(&self, request: Request, repeat: usize, print_body: bool) -> Result<usize> {
        let config = self.effective_config()?;
        let throttler = Throttler::from_config(&config)?;
        info!(
            requests_per_second = config.requests_per_second,
            retry_limit = config.retry_limit,
            repeat,
            "starting fetch"
        );

        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, cancelling outstanding requests");
                    cancel.cancel();
                }
            })
        };

        let started = Instant::now();
        let mut pending: FuturesUnordered<_> = (0..repeat)
            .map(|index| {
                let throttler = throttler.clone();
                let cancel = cancel.clone();
                let request = request.try_clone();
                async move {
                    let outcome = match request {
                        Some(request) => throttler.dispatch_with_cancel(request, &cancel).await,
                        None => Err(Error::RequestNotReplayable),
                    };
                    report(index, outcome, started, print_body).await
                }
            })
            .collect();

        let mut failed = 0;
        while let Some((line, ok)) = pending.next().await {
            println!("{line}");
            if !ok {
                failed += 1;
            }
        }

        interrupt.abort();
        Ok(failed)
    }
}

/// Build a request from command-line pieces
pub fn build_request(
    url: &str,
    method: Method,
    headers: &[String],
    data: Option<&str>,
) -> Result<Request> {
    let url = Url::parse(url)?;
    let mut request = Request::new(method.into(), url);

    for raw in headers {
        let (name, value) = raw.split_once(':').ok_or_else(|| {
            Error::invalid_value("header", format!("expected 'Name: value', got '{raw}'"))
        })?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| Error::invalid_value("header", e.to_string()))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| Error::invalid_value("header", e.to_string()))?;
        request.headers_mut().append(name, value);
    }

    if let Some(data) = data {
        *request.body_mut() = Some(data.to_owned().into());
    }

    Ok(request)
}

async fn report(
    index: usize,
    outcome: Result<crate::http::Response>,
    started: Instant,
    print_body: bool,
) -> (Value, bool) {
    let response = match outcome {
        Ok(response) => response,
        Err(e) => {
            let line = json!({
                "index": index,
                "error": e.to_string(),
                "elapsed_ms": started.elapsed().as_millis() as u64,
            });
            return (line, false);
        }
    };

    let status = response.status().as_u16();
    match response.bytes().await {
        Ok(body) => {
            let mut line = json!({
                "index": index,
                "status": status,
                "bytes": body.len(),
                "elapsed_ms": started.elapsed().as_millis() as u64,
            });
            if print_body {
                line["body"] = Value::String(String::from_utf8_lossy(&body).into_owned());
            }
            (line, true)
        }
        Err(e) => {
            let line = json!({
                "index": index,
                "status": status,
                "error": e.to_string(),
                "elapsed_ms": started.elapsed().as_millis() as u64,
            });
            (line, false)
        }
    }
}
