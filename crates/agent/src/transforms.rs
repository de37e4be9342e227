//! Built-in transform stages.
//!
//! | Stage | Effect |
//! |-------|--------|
//! | [`HeaderTransform`] | Sets fixed headers on the transport skeleton |
//! | [`NonceTransform`] | Adds a random nonce to call requests that lack one |
//! | [`IngressExpiryTransform`] | Stamps calls and queries with an expiry time |
//! | [`FnTransform`] | Wraps an async closure, see [`transform_fn`] |

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use protocol::{
    AgentError, Blob, HttpAgentRequest, ReadRequest, RequestBody, SubmitRequest, Transform,
};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// Sets a fixed list of headers on every request.
#[derive(Debug, Clone, Default)]
pub struct HeaderTransform {
    headers: Vec<(String, String)>,
    priority: i32,
}

impl HeaderTransform {
    /// Creates a stage with no headers at priority 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header to set.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the declared priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl Transform for HeaderTransform {
    async fn apply(
        &self,
        request: &HttpAgentRequest,
    ) -> Result<Option<HttpAgentRequest>, AgentError> {
        if self.headers.is_empty() {
            return Ok(None);
        }
        let mut next = request.clone();
        for (name, value) in &self.headers {
            next.request.headers.insert(name, value.clone());
        }
        Ok(Some(next))
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn name(&self) -> &str {
        "headers"
    }
}

// ---------------------------------------------------------------------------
// Nonce
// ---------------------------------------------------------------------------

/// Gives each call request a random 16-byte nonce, so two otherwise
/// identical calls are distinct messages on the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonceTransform;

#[async_trait]
impl Transform for NonceTransform {
    async fn apply(
        &self,
        request: &HttpAgentRequest,
    ) -> Result<Option<HttpAgentRequest>, AgentError> {
        let RequestBody::Submit(SubmitRequest::Call { nonce: None, .. }) = &request.body else {
            return Ok(None);
        };
        let mut next = request.clone();
        if let RequestBody::Submit(SubmitRequest::Call { nonce, .. }) = &mut next.body {
            *nonce = Some(Blob::new(Uuid::new_v4().as_bytes().to_vec()));
        }
        Ok(Some(next))
    }

    fn name(&self) -> &str {
        "nonce"
    }
}

// ---------------------------------------------------------------------------
// Ingress expiry
// ---------------------------------------------------------------------------

/// Stamps calls and queries that have no expiry with `now + duration`, in
/// nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy)]
pub struct IngressExpiryTransform {
    duration: Duration,
}

impl IngressExpiryTransform {
    /// Five minutes, the longest expiry replicas accept.
    pub const DEFAULT_DURATION: Duration = Duration::from_secs(5 * 60);

    /// Creates a stage using `duration` as the validity window.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    fn expiry(&self) -> Result<u64, AgentError> {
        let window = chrono::Duration::from_std(self.duration)
            .map_err(|err| AgentError::transform(self.name(), err.to_string()))?;
        (Utc::now() + window)
            .timestamp_nanos_opt()
            .and_then(|nanos| u64::try_from(nanos).ok())
            .ok_or_else(|| AgentError::transform(self.name(), "expiry is out of range"))
    }
}

impl Default for IngressExpiryTransform {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DURATION)
    }
}

#[async_trait]
impl Transform for IngressExpiryTransform {
    async fn apply(
        &self,
        request: &HttpAgentRequest,
    ) -> Result<Option<HttpAgentRequest>, AgentError> {
        let mut next = request.clone();
        let slot = match &mut next.body {
            RequestBody::Submit(SubmitRequest::Call { ingress_expiry, .. }) => ingress_expiry,
            RequestBody::Read(ReadRequest::Query { ingress_expiry, .. }) => ingress_expiry,
            RequestBody::Read(ReadRequest::RequestStatus { .. }) => return Ok(None),
        };
        if slot.is_some() {
            return Ok(None);
        }
        *slot = Some(self.expiry()?);
        Ok(Some(next))
    }

    fn name(&self) -> &str {
        "ingress_expiry"
    }
}

// ---------------------------------------------------------------------------
// Closures
// ---------------------------------------------------------------------------

/// A stage backed by an async closure. Build one with [`transform_fn`].
pub struct FnTransform<F, Fut> {
    name: String,
    priority: i32,
    f: F,
    _future: PhantomData<fn() -> Fut>,
}

/// Wraps `f` as a stage named `name` with declared priority `priority`.
///
/// The closure receives its own copy of the envelope and returns the
/// replacement, or `None` to leave the envelope unchanged.
pub fn transform_fn<F, Fut>(name: impl Into<String>, priority: i32, f: F) -> FnTransform<F, Fut>
where
    F: Fn(HttpAgentRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<HttpAgentRequest>, AgentError>> + Send,
{
    FnTransform {
        name: name.into(),
        priority,
        f,
        _future: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> Transform for FnTransform<F, Fut>
where
    F: Fn(HttpAgentRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<HttpAgentRequest>, AgentError>> + Send,
{
    async fn apply(
        &self,
        request: &HttpAgentRequest,
    ) -> Result<Option<HttpAgentRequest>, AgentError> {
        (self.f)(request.clone()).await
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F, Fut> std::fmt::Debug for FnTransform<F, Fut> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTransform")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
