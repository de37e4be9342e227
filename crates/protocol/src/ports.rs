//! Port traits: the seams third parties plug into.
//!
//! - [`Transform`] — a request-shaping stage (signing, nonces, headers, ...).
//! - [`Transport`] — carries an [`HttpRequest`] to a route and returns the response.
//! - [`RequestIdDeriver`] — derives the content identifier of a submit request.
//!
//! All three are `async_trait`s so they can be stored as trait objects.

use async_trait::async_trait;

use crate::errors::AgentError;
use crate::http::{HttpRequest, HttpResponse};
use crate::identifiers::RequestId;
use crate::types::{Endpoint, RequestBody, SubmitRequest};

/// The envelope that flows through the transform pipeline.
///
/// Stages may enrich `request` and annotate `body`, but must leave the body's
/// kind matching `endpoint`; the dispatcher rejects an envelope that breaks
/// this after the pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpAgentRequest {
    /// Transport skeleton.
    pub request: HttpRequest,
    /// Target route.
    pub endpoint: Endpoint,
    /// Logical body, not yet encoded.
    pub body: RequestBody,
}

impl HttpAgentRequest {
    /// Builds an envelope whose endpoint is taken from the body's kind.
    pub fn new(request: HttpRequest, body: RequestBody) -> Self {
        Self {
            request,
            endpoint: body.endpoint(),
            body,
        }
    }

    /// Returns `true` if the body kind still matches the endpoint.
    pub fn is_consistent(&self) -> bool {
        self.body.endpoint() == self.endpoint
    }
}

/// A request-shaping stage in the agent's pipeline.
///
/// A stage receives the envelope produced by the previous stage and returns
/// either a replacement or `None` to pass the envelope on unchanged. Returning
/// an error aborts the request before anything is sent.
#[async_trait]
pub trait Transform: Send + Sync {
    /// Applies the stage.
    async fn apply(&self, request: &HttpAgentRequest)
        -> Result<Option<HttpAgentRequest>, AgentError>;

    /// Priority used when the stage is registered without an explicit one.
    /// Higher priorities run first.
    fn priority(&self) -> i32 {
        0
    }

    /// Name used in logs and in [`AgentError::Transform`].
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Sends a request to a route.
///
/// Implementations report connection problems as [`AgentError::Transport`]
/// and failure statuses as [`AgentError::HttpStatus`]; the agent passes both
/// through untouched.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` to `route` (e.g. `/api/v1/read`).
    async fn call(&self, route: &str, request: HttpRequest) -> Result<HttpResponse, AgentError>;
}

/// Derives the identifier of a submit request.
#[async_trait]
pub trait RequestIdDeriver: Send + Sync {
    /// Derives the identifier. Must be deterministic over the request's fields.
    async fn derive(&self, request: &SubmitRequest) -> Result<RequestId, AgentError>;
}
