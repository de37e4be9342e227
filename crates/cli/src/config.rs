//! Command-line configuration.

use std::time::Duration;

use agent::{AgentConfig, HeaderTransform, HttpAgent, IngressExpiryTransform, NonceTransform};
use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use protocol::{ApiVersion, Blob, CanisterId, RequestId, Transport};
use transport::HttpTransport;

#[derive(Debug, Parser)]
#[command(
    name = "httpagent",
    version,
    about = "Send calls, queries and status lookups to a replica"
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub observability: ObservabilityArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// Replica base URL
    #[arg(long, global = true, env = "HTTPAGENT_URL", default_value = "http://localhost:8000")]
    pub url: String,

    /// Major API version used in endpoint routes
    #[arg(long, global = true, env = "HTTPAGENT_API_VERSION", default_value_t = ApiVersion::V1)]
    pub api_version: ApiVersion,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "HTTPAGENT_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Extra header sent with every request (NAME=VALUE, repeatable)
    #[arg(long = "header", global = true, value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Ingress expiry window in seconds
    #[arg(long, global = true, env = "HTTPAGENT_INGRESS_EXPIRY", default_value_t = 300)]
    pub ingress_expiry: u64,
}

#[derive(Debug, Args)]
pub struct ObservabilityArgs {
    /// Log output format
    #[arg(
        long,
        global = true,
        env = "HTTPAGENT_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; spans are exported only when set
    #[arg(long, global = true, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Reply bytes as lowercase hex
    Raw,
    /// The whole response as JSON
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit an update call
    Call {
        /// Target canister id (hex)
        canister: CanisterId,
        /// Method to call
        method: String,
        /// Argument bytes (hex)
        #[arg(long, default_value = "")]
        arg: Blob,
    },
    /// Run a read-only query
    Query {
        /// Target canister id (hex)
        canister: CanisterId,
        /// Method to query
        method: String,
        /// Argument bytes (hex)
        #[arg(long, default_value = "")]
        arg: Blob,
        #[arg(long, value_enum, default_value_t = OutputFormat::Raw)]
        output: OutputFormat,
    },
    /// Look up the status of a submitted request
    RequestStatus {
        /// Request id (64 hex characters)
        request_id: RequestId,
        #[arg(long, value_enum, default_value_t = OutputFormat::Raw)]
        output: OutputFormat,
    },
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in '{raw}'"));
    }
    Ok((name.to_owned(), value.trim().to_owned()))
}

impl ConnectionArgs {
    /// Builds an agent bound to the configured replica with the built-in
    /// stages installed.
    pub fn agent(&self) -> anyhow::Result<HttpAgent> {
        let transport =
            HttpTransport::with_timeout(&self.url, Duration::from_secs(self.timeout_secs))
                .with_context(|| format!("failed to create transport for {}", self.url))?;
        self.agent_with(transport)
    }

    /// Builds an agent over `transport` with the built-in stages installed.
    ///
    /// Every installed stage leaves a request alone once the field it sets is
    /// present, so running the pipeline twice gives the same body.
    pub fn agent_with<T: Transport + 'static>(&self, transport: T) -> anyhow::Result<HttpAgent> {
        let mut agent = HttpAgent::builder()
            .with_transport(transport)
            .with_config(AgentConfig {
                api_version: self.api_version,
            })
            .build()?;

        agent.add_transform(IngressExpiryTransform::new(Duration::from_secs(
            self.ingress_expiry,
        )));
        agent.add_transform(NonceTransform);
        if !self.headers.is_empty() {
            let headers = self
                .headers
                .iter()
                .fold(HeaderTransform::new(), |stage, (name, value)| {
                    stage.header(name, value)
                });
            agent.add_transform(headers);
        }
        Ok(agent)
    }
}
