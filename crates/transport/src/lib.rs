//! HTTP agent network transport.
//!
//! Implements the [`protocol::Transport`] trait over `reqwest`: each call
//! joins the agent's route (e.g. `/api/v1/read`) onto a configured replica
//! base URL and sends the request skeleton as built by the pipeline.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Connection handling, TLS and timeouts live here. The
//! `agent` crate sees only [`protocol::Transport`].
//!
//! ## Status handling
//!
//! A response with a non-2xx status becomes [`AgentError::HttpStatus`]
//! carrying the raw body; connection-level failures become
//! [`AgentError::Transport`]. Neither is retried.

use std::time::Duration;

use async_trait::async_trait;
use protocol::{AgentError, HeaderMap, HttpMethod, HttpRequest, HttpResponse, Transport};
use reqwest::{Client, Method, Url};
use tracing::{debug, instrument, warn};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`Transport`] that sends requests to a replica over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Creates a transport for the replica at `base_url` with [`DEFAULT_TIMEOUT`].
    pub fn new(base_url: &str) -> Result<Self, AgentError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a transport for the replica at `base_url` with a custom timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let mut base_url = Url::parse(base_url).map_err(|err| {
            AgentError::configuration(format!("invalid replica URL '{base_url}': {err}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AgentError::configuration(format!(
                "replica URL '{base_url}' cannot carry a path"
            )));
        }
        // Keep any path prefix when routes are joined.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                AgentError::configuration(format!("failed to build HTTP client: {err}"))
            })?;

        Ok(Self { client, base_url })
    }

    /// The replica base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full URL for `route`.
    pub fn url_for(&self, route: &str) -> Result<Url, AgentError> {
        self.base_url
            .join(route.trim_start_matches('/'))
            .map_err(|err| AgentError::Transport {
                route: route.to_owned(),
                message: format!("invalid route: {err}"),
            })
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method))]
    async fn call(&self, route: &str, request: HttpRequest) -> Result<HttpResponse, AgentError> {
        let url = self.url_for(route)?;
        let transport_error = |err: reqwest::Error| AgentError::Transport {
            route: route.to_owned(),
            message: err.to_string(),
        };

        let mut builder = self.client.request(method(request.method), url.clone());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        debug!(%url, "sending request");
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers: HeaderMap = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value)))
            .collect();
        let body = response.bytes().await.map_err(transport_error)?.to_vec();

        if !(200..300).contains(&status) {
            warn!(%url, status, bytes = body.len(), "replica returned failure status");
            return Err(AgentError::HttpStatus {
                route: route.to_owned(),
                status,
                body,
            });
        }

        debug!(%url, status, bytes = body.len(), "received response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
