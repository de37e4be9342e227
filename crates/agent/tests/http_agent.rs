//! End-to-end behaviour of the agent against in-memory transport doubles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent::{transform_fn, HeaderTransform, HttpAgent, NonceTransform};
use async_trait::async_trait;
use protocol::{
    AgentError, Blob, CallFields, CanisterId, CborCodec, Codec, HeaderMap, HttpAgentRequest,
    HttpMethod, HttpRequest, HttpResponse, QueryFields, QueryResponse, ReadRequest, RequestBody,
    RequestId, RequestIdDeriver, RequestStatusFields, RequestStatusResponse,
    Sha256RequestIdDeriver, SubmitRequest, Transform, Transport, Value,
};

// ============================================================================
// Doubles
// ============================================================================

/// Records every call and answers with a fixed body after an optional delay.
#[derive(Clone, Default)]
struct RecordingTransport {
    calls: Arc<Mutex<Vec<(String, HttpRequest)>>>,
    body: Vec<u8>,
    delay: Option<Duration>,
    finished: Arc<AtomicBool>,
}

impl RecordingTransport {
    fn answering(body: Vec<u8>) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> Vec<(String, HttpRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn call(&self, route: &str, request: HttpRequest) -> Result<HttpResponse, AgentError> {
        self.calls.lock().unwrap().push((route.to_owned(), request));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.finished.store(true, Ordering::SeqCst);
        Ok(HttpResponse {
            status: 202,
            headers: HeaderMap::new(),
            body: self.body.clone(),
        })
    }
}

struct FailingDeriver;

#[async_trait]
impl RequestIdDeriver for FailingDeriver {
    async fn derive(&self, _request: &SubmitRequest) -> Result<RequestId, AgentError> {
        Err(AgentError::RequestId {
            message: "hasher unavailable".into(),
        })
    }
}

/// Fails every request it sees.
struct Rejecting;

#[async_trait]
impl Transform for Rejecting {
    async fn apply(
        &self,
        _request: &HttpAgentRequest,
    ) -> Result<Option<HttpAgentRequest>, AgentError> {
        Err(AgentError::transform("rejecting", "no signing key"))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn canister() -> CanisterId {
    CanisterId::new(vec![0, 0, 0, 0, 0, 0, 4, 210])
}

fn query_fields(arg: &[u8]) -> QueryFields {
    QueryFields {
        method_name: "m".into(),
        arg: Blob::new(arg.to_vec()),
    }
}

fn call_fields() -> CallFields {
    CallFields {
        method_name: "store".into(),
        arg: Blob::new(b"DIDL\x00\x00".to_vec()),
    }
}

fn replied(arg: &[u8]) -> Vec<u8> {
    let response = QueryResponse::Replied {
        arg: Blob::new(arg.to_vec()),
    };
    CborCodec.encode(&response.to_value()).unwrap()
}

fn agent_with(transport: &RecordingTransport) -> HttpAgent {
    HttpAgent::builder()
        .with_transport(transport.clone())
        .build()
        .unwrap()
}

// ============================================================================
// Pipeline scenarios
// ============================================================================

#[tokio::test]
async fn header_and_body_stages_shape_the_outbound_query() {
    let transport = RecordingTransport::answering(replied(b"ok"));
    let mut agent = agent_with(&transport);

    let fixed = ReadRequest::query(CanisterId::new(vec![0xaa]), query_fields(b"fixed"));
    let fixed_body = fixed.clone();
    agent.add_transform_with_priority(
        transform_fn("set-body", 0, move |mut request: HttpAgentRequest| {
            let body = fixed_body.clone();
            async move {
                request.body = RequestBody::Read(body);
                Ok::<_, AgentError>(Some(request))
            }
        }),
        0,
    );
    agent.add_transform_with_priority(HeaderTransform::new().header("X-Test", "1"), 10);

    for input in [b"x".as_slice(), b"something else".as_slice()] {
        agent.query(canister(), query_fields(input)).await.unwrap();
    }

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    let expected_body = CborCodec.encode(&fixed.to_value()).unwrap();
    for (route, request) in calls {
        assert_eq!(route, "/api/v1/read");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.headers.get("X-Test"), Some("1"));
        assert_eq!(request.headers.get("content-type"), Some("application/cbor"));
        assert_eq!(request.body.as_deref(), Some(expected_body.as_slice()));
    }
}

#[tokio::test]
async fn stage_returning_nothing_passes_its_input_on() {
    let transport = RecordingTransport::answering(replied(b""));
    let mut agent = agent_with(&transport);

    let seen = Arc::new(Mutex::new(Vec::new()));
    for (name, priority) in [("first", 2), ("second", 1)] {
        let seen = Arc::clone(&seen);
        agent.add_transform(transform_fn(name, priority, move |request: HttpAgentRequest| {
            seen.lock().unwrap().push(request);
            async { Ok::<Option<HttpAgentRequest>, AgentError>(None) }
        }));
    }

    agent.query(canister(), query_fields(b"x")).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
}

#[tokio::test]
async fn child_pipeline_is_a_copy_of_the_parent() {
    let transport = RecordingTransport::answering(replied(b""));
    let mut parent = agent_with(&transport);
    parent.add_transform(HeaderTransform::new().header("a", "1"));
    parent.add_transform(NonceTransform);

    let mut child = HttpAgent::builder().with_parent(&parent).build().unwrap();
    child.add_transform(HeaderTransform::new().header("b", "2"));

    assert_eq!(parent.pipeline().len(), 2);
    assert_eq!(child.pipeline().len(), 3);

    // The child still reaches the parent's transport.
    child.query(canister(), query_fields(b"x")).await.unwrap();
    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.headers.get("b"), Some("2"));
}

#[tokio::test]
async fn failing_stage_aborts_before_the_network() {
    let transport = RecordingTransport::answering(replied(b""));
    let mut agent = agent_with(&transport);
    agent.add_transform(Rejecting);

    let err = agent.call(canister(), call_fields()).await.unwrap_err();
    assert!(matches!(err, AgentError::Transform { ref stage, .. } if stage == "rejecting"));

    let err = agent
        .query(canister(), query_fields(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Transform { .. }));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn stage_may_not_change_the_request_kind() {
    let transport = RecordingTransport::answering(replied(b""));
    let mut agent = agent_with(&transport);
    agent.add_transform(transform_fn("swap", 0, |mut request: HttpAgentRequest| async move {
        request.body = RequestBody::Read(ReadRequest::query(
            CanisterId::new(vec![1]),
            QueryFields {
                method_name: "m".into(),
                arg: Blob::default(),
            },
        ));
        Ok::<_, AgentError>(Some(request))
    }));

    let err = agent.call(canister(), call_fields()).await.unwrap_err();
    assert!(matches!(err, AgentError::Transform { ref stage, .. } if stage == "pipeline"));
    assert!(transport.calls().is_empty());
}

// ============================================================================
// Submit
// ============================================================================

#[tokio::test]
async fn submit_posts_to_submit_route_and_returns_the_id() {
    let transport = RecordingTransport::answering(Vec::new());
    let agent = agent_with(&transport);

    let response = agent.call(canister(), call_fields()).await.unwrap();

    let original = SubmitRequest::call(canister(), call_fields());
    let expected = Sha256RequestIdDeriver.derive(&original).await.unwrap();
    assert_eq!(response.request_id, expected);
    assert_eq!(response.response.status, 202);

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "/api/v1/submit");
    let sent = CborCodec
        .decode(calls[0].1.body.as_deref().unwrap())
        .unwrap();
    assert_eq!(sent, original.to_value());
}

#[tokio::test]
async fn request_id_comes_from_the_caller_request() {
    let transport = RecordingTransport::answering(Vec::new());
    let mut agent = agent_with(&transport);
    agent.add_transform(NonceTransform);

    let response = agent.call(canister(), call_fields()).await.unwrap();

    let original = SubmitRequest::call(canister(), call_fields());
    let expected = Sha256RequestIdDeriver.derive(&original).await.unwrap();
    assert_eq!(response.request_id, expected);

    // The wire body carries the nonce the id was not derived from.
    let sent = CborCodec
        .decode(transport.calls()[0].1.body.as_deref().unwrap())
        .unwrap();
    assert!(matches!(sent.get("nonce"), Some(Value::Bytes(n)) if n.len() == 16));
}

#[tokio::test(start_paused = true)]
async fn submit_waits_for_the_slower_transport() {
    let delay = Duration::from_millis(250);
    let transport = RecordingTransport::answering(Vec::new()).delayed(delay);
    let agent = agent_with(&transport);

    let started = tokio::time::Instant::now();
    agent.call(canister(), call_fields()).await.unwrap();

    assert!(started.elapsed() >= delay);
    assert!(transport.finished.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn failing_deriver_fails_submit_without_cancelling_transport() {
    let delay = Duration::from_millis(250);
    let transport = RecordingTransport::answering(Vec::new()).delayed(delay);
    let agent = HttpAgent::builder()
        .with_transport(transport.clone())
        .with_request_id_deriver(FailingDeriver)
        .build()
        .unwrap();

    let err = agent.call(canister(), call_fields()).await.unwrap_err();
    assert!(matches!(err, AgentError::RequestId { .. }));

    // The transport task keeps running after the submit has failed.
    tokio::time::sleep(delay * 2).await;
    assert!(transport.finished.load(Ordering::SeqCst));
    assert_eq!(transport.calls().len(), 1);
}

// ============================================================================
// Read
// ============================================================================

#[tokio::test]
async fn read_returns_the_decoded_response() {
    let known = Value::map([
        ("status", Value::from("replied")),
        ("reply", Value::map([("arg", Value::Bytes(vec![1, 2, 3]))])),
        ("extra", Value::Array(vec![Value::Nat(7), Value::Int(-7)])),
    ]);
    let transport = RecordingTransport::answering(CborCodec.encode(&known).unwrap());
    let agent = agent_with(&transport);

    let value = agent
        .read(ReadRequest::query(canister(), query_fields(b"x")))
        .await
        .unwrap();
    assert_eq!(value, known);
}

#[tokio::test]
async fn request_status_narrows_the_response() {
    let status = RequestStatusResponse::Replied {
        reply: Blob::new(b"done".to_vec()),
    };
    let transport = RecordingTransport::answering(CborCodec.encode(&status.to_value()).unwrap());
    let agent = agent_with(&transport);
    let request_id = RequestId::new(&[3; 32]);

    let response = agent
        .request_status(RequestStatusFields { request_id })
        .await
        .unwrap();
    assert_eq!(response, status);

    let sent = CborCodec
        .decode(transport.calls()[0].1.body.as_deref().unwrap())
        .unwrap();
    assert_eq!(sent.get("request_type"), Some(&Value::from("request_status")));
    assert_eq!(sent.get("request_id"), Some(&Value::Bytes(vec![3; 32])));
}

#[tokio::test]
async fn malformed_response_is_a_decode_error() {
    let transport = RecordingTransport::answering(b"<html>".to_vec());
    let agent = agent_with(&transport);

    let err = agent
        .query(canister(), query_fields(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Decode { .. }));
}

#[tokio::test]
async fn one_network_call_per_operation() {
    let counter = Arc::new(AtomicUsize::new(0));

    struct Counting(Arc<AtomicUsize>, Vec<u8>);

    #[async_trait]
    impl Transport for Counting {
        async fn call(
            &self,
            _route: &str,
            _request: HttpRequest,
        ) -> Result<HttpResponse, AgentError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse {
                status: 200,
                headers: HeaderMap::new(),
                body: self.1.clone(),
            })
        }
    }

    let agent = HttpAgent::builder()
        .with_transport(Counting(Arc::clone(&counter), replied(b"r")))
        .build()
        .unwrap();

    agent.call(canister(), call_fields()).await.unwrap();
    agent.query(canister(), query_fields(b"x")).await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}
