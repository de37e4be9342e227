//! The HTTP agent: dispatcher and facade operations.
//!
//! Every request follows the same path: wrap the logical body in an
//! [`HttpAgentRequest`] envelope, run it through the [`TransformPipeline`],
//! encode the resulting body with the [`Codec`], and hand it to the
//! [`Transport`]. Submits also derive the request id from the caller's
//! original request while the network call is in flight.
//!
//! Nothing here retries, classifies or rewrites errors; whatever a stage, the
//! transport, or the codec returns reaches the caller unchanged.

use std::sync::Arc;

use protocol::{
    AgentError, CallFields, CanisterId, CborCodec, Codec, Endpoint, HttpAgentRequest, HttpRequest,
    QueryFields, QueryResponse, ReadRequest, RequestBody, RequestIdDeriver, RequestStatusFields,
    RequestStatusResponse, Sha256RequestIdDeriver, SubmitRequest, SubmitResponse, Transform,
    Transport, Value,
};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, Instrument, Span};

use crate::config::AgentConfig;
use crate::pipeline::TransformPipeline;

/// A low-level client for the submit and read endpoints.
///
/// Configuration is fixed at construction except for the pipeline, which
/// grows through [`HttpAgent::add_transform`]. Registering stages needs
/// `&mut self`, so it cannot overlap with a request running on the same
/// agent.
pub struct HttpAgent {
    pipeline: TransformPipeline,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn Codec>,
    deriver: Arc<dyn RequestIdDeriver>,
    config: AgentConfig,
}

impl HttpAgent {
    /// Starts building an agent.
    pub fn builder() -> HttpAgentBuilder {
        HttpAgentBuilder::default()
    }

    /// Registers a stage at its declared priority.
    pub fn add_transform<T: Transform + 'static>(&mut self, transform: T) {
        self.pipeline.add(transform);
    }

    /// Registers a stage at an explicit priority.
    pub fn add_transform_with_priority<T: Transform + 'static>(
        &mut self,
        transform: T,
        priority: i32,
    ) {
        self.pipeline.add_with_priority(transform, priority);
    }

    /// The agent's pipeline.
    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }

    /// The agent's configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Sends a submit request.
    ///
    /// The transport call and the request-id derivation run as separate tasks
    /// started together. The submit completes once both have finished and
    /// fails with the first error observed; the other task is left to run to
    /// completion. The id is derived from `request` as given, not from the
    /// pipeline's output.
    #[instrument(
        skip_all,
        fields(endpoint = %Endpoint::Submit, request_type = request.request_type().as_str())
    )]
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitResponse, AgentError> {
        let envelope = self
            .pipeline
            .apply(self.envelope(RequestBody::Submit(request.clone())))
            .await?;
        let http_request = self.serialize(envelope, Endpoint::Submit)?;
        let route = self.config.route(Endpoint::Submit);

        let transport = Arc::clone(&self.transport);
        let call: JoinHandle<_> = tokio::spawn(
            async move {
                let response = transport.call(&route, http_request).await;
                if let Ok(response) = &response {
                    debug!(%route, status = response.status, "submit answered");
                }
                response
            }
            .instrument(Span::current()),
        );

        let deriver = Arc::clone(&self.deriver);
        let derive: JoinHandle<_> = tokio::spawn(
            async move { deriver.derive(&request).await }.instrument(Span::current()),
        );

        let (response, request_id) =
            futures::future::try_join(joined(call), joined(derive)).await?;
        debug!(%request_id, "submit complete");
        Ok(SubmitResponse {
            request_id,
            response,
        })
    }

    /// Sends a read request and decodes the response body.
    #[instrument(
        skip_all,
        fields(endpoint = %Endpoint::Read, request_type = request.request_type().as_str())
    )]
    pub async fn read(&self, request: ReadRequest) -> Result<Value, AgentError> {
        let envelope = self
            .pipeline
            .apply(self.envelope(RequestBody::Read(request)))
            .await?;
        let http_request = self.serialize(envelope, Endpoint::Read)?;
        let route = self.config.route(Endpoint::Read);

        let response = self.transport.call(&route, http_request).await?;
        debug!(%route, status = response.status, bytes = response.body.len(), "read answered");
        self.codec.decode(&response.body)
    }

    /// Calls `fields.method_name` on `canister_id`.
    pub async fn call(
        &self,
        canister_id: CanisterId,
        fields: CallFields,
    ) -> Result<SubmitResponse, AgentError> {
        self.submit(SubmitRequest::call(canister_id, fields)).await
    }

    /// Queries `fields.method_name` on `canister_id`.
    pub async fn query(
        &self,
        canister_id: CanisterId,
        fields: QueryFields,
    ) -> Result<QueryResponse, AgentError> {
        let value = self.read(ReadRequest::query(canister_id, fields)).await?;
        QueryResponse::try_from(value)
    }

    /// Looks up the status of a previously submitted request.
    pub async fn request_status(
        &self,
        fields: RequestStatusFields,
    ) -> Result<RequestStatusResponse, AgentError> {
        let value = self.read(ReadRequest::request_status(fields)).await?;
        RequestStatusResponse::try_from(value)
    }

    fn envelope(&self, body: RequestBody) -> HttpAgentRequest {
        HttpAgentRequest::new(HttpRequest::post(self.codec.content_type()), body)
    }

    /// Encodes the envelope's body into its transport skeleton.
    fn serialize(
        &self,
        envelope: HttpAgentRequest,
        expected: Endpoint,
    ) -> Result<HttpRequest, AgentError> {
        if envelope.endpoint != expected || !envelope.is_consistent() {
            return Err(AgentError::transform(
                "pipeline",
                format!(
                    "request kind changed: expected a {expected} request, \
                     got endpoint {} with a {} body",
                    envelope.endpoint,
                    envelope.body.endpoint()
                ),
            ));
        }
        let body = self.codec.encode(&envelope.body.to_value())?;
        debug!(bytes = body.len(), "encoded request body");
        let mut request = envelope.request;
        request.body = Some(body);
        Ok(request)
    }
}

async fn joined<T>(handle: JoinHandle<Result<T, AgentError>>) -> Result<T, AgentError> {
    handle.await.map_err(|err| AgentError::TaskFailed {
        message: err.to_string(),
    })?
}

impl std::fmt::Debug for HttpAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAgent")
            .field("pipeline", &self.pipeline)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Builder for [`HttpAgent`].
///
/// Each port resolves once in [`HttpAgentBuilder::build`], in this order:
/// the explicit override, then the parent's, then the built-in default.
/// The transport has no built-in default: with neither an override nor a
/// parent, building fails with [`AgentError::Configuration`].
#[derive(Default)]
pub struct HttpAgentBuilder {
    parent: Option<Inherited>,
    transport: Option<Arc<dyn Transport>>,
    codec: Option<Arc<dyn Codec>>,
    deriver: Option<Arc<dyn RequestIdDeriver>>,
    config: Option<AgentConfig>,
}

/// Snapshot of a parent agent taken when it is attached to a builder.
struct Inherited {
    pipeline: TransformPipeline,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn Codec>,
    deriver: Arc<dyn RequestIdDeriver>,
    config: AgentConfig,
}

impl HttpAgentBuilder {
    /// Copies `parent`'s current pipeline and ports.
    ///
    /// The copy is taken now; stages registered on the parent afterwards are
    /// not seen by the child, and vice versa.
    pub fn with_parent(mut self, parent: &HttpAgent) -> Self {
        self.parent = Some(Inherited {
            pipeline: parent.pipeline.clone(),
            transport: Arc::clone(&parent.transport),
            codec: Arc::clone(&parent.codec),
            deriver: Arc::clone(&parent.deriver),
            config: parent.config.clone(),
        });
        self
    }

    /// Uses `transport` for every call.
    pub fn with_transport<T: Transport + 'static>(self, transport: T) -> Self {
        self.with_shared_transport(Arc::new(transport))
    }

    /// Uses an already-shared transport for every call.
    pub fn with_shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the default CBOR codec.
    pub fn with_codec<C: Codec + 'static>(mut self, codec: C) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Replaces the default SHA-256 request-id deriver.
    pub fn with_request_id_deriver<D: RequestIdDeriver + 'static>(mut self, deriver: D) -> Self {
        self.deriver = Some(Arc::new(deriver));
        self
    }

    /// Sets the agent configuration.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Result<HttpAgent, AgentError> {
        let HttpAgentBuilder {
            parent,
            transport,
            codec,
            deriver,
            config,
        } = self;

        let transport = match (transport, &parent) {
            (Some(transport), _) => transport,
            (None, Some(parent)) => Arc::clone(&parent.transport),
            (None, None) => {
                return Err(AgentError::configuration(
                    "no transport configured: supply one with `with_transport` \
                     or inherit one with `with_parent`",
                ))
            }
        };

        let (pipeline, parent_codec, parent_deriver, parent_config) = match parent {
            Some(parent) => (
                parent.pipeline,
                Some(parent.codec),
                Some(parent.deriver),
                Some(parent.config),
            ),
            None => (TransformPipeline::new(), None, None, None),
        };

        let agent = HttpAgent {
            pipeline,
            transport,
            codec: codec
                .or(parent_codec)
                .unwrap_or_else(|| Arc::new(CborCodec)),
            deriver: deriver
                .or(parent_deriver)
                .unwrap_or_else(|| Arc::new(Sha256RequestIdDeriver)),
            config: config.or(parent_config).unwrap_or_default(),
        };
        debug!(
            stages = agent.pipeline.len(),
            api_version = %agent.config.api_version,
            "agent built"
        );
        Ok(agent)
    }
}
