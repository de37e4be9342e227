//! httpagent CLI entry point.
//!
//! This binary is the composition root for the workspace. Responsibilities:
//!
//! 1. **Parse configuration**: command-line flags with environment fallbacks
//!    (see [`config::Cli`]).
//! 2. **Wire observability**: configure `tracing-subscriber` with a pretty or
//!    JSON layer and, when an endpoint is given, an OpenTelemetry OTLP
//!    exporter. Spans and events from every crate flow through here.
//! 3. **Construct infrastructure**: create the reqwest-backed
//!    [`transport::HttpTransport`], inject it into an [`agent::HttpAgent`],
//!    and install the built-in stages.
//! 4. **Run one command**: `call`, `query` or `request-status`.

mod commands;
mod config;
mod observability;

use clap::Parser;

use crate::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let telemetry = observability::init(&cli.observability)?;

    let result = commands::run(&cli).await;
    if let Err(err) = &result {
        tracing::error!(error = %err, "command failed");
    }

    telemetry.shutdown();
    result
}
