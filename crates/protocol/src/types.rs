//! Logical requests and responses.
//!
//! Requests are sum types discriminated by their request kind. Each kind
//! lowers to a [`Value`] map carrying a `request_type` field; the match at the
//! point of lowering is exhaustive, so adding a kind is a compile-checked
//! decision. Responses are parsed from a decoded [`Value`] by their `status`
//! field.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;
use crate::http::HttpResponse;
use crate::identifiers::{Blob, CanisterId, RequestId};
use crate::value::Value;

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// The two routes a request can be dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// State-changing calls.
    Submit,
    /// Side-effect-free reads.
    Read,
}

impl Endpoint {
    /// Route suffix for this endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Submit => "submit",
            Endpoint::Read => "read",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------

/// Version segment of the API path prefix (`/api/v1/`).
///
/// Fixed when an agent is constructed; never chosen per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApiVersion(u32);

impl ApiVersion {
    /// The version spoken by current replicas.
    pub const V1: ApiVersion = ApiVersion(1);

    /// Creates an [`ApiVersion`] from its number.
    pub fn new(major: u32) -> Self {
        Self(major)
    }

    /// Returns the version number.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Full route for `endpoint` under this version, e.g. `/api/v1/read`.
    pub fn route(self, endpoint: Endpoint) -> String {
        format!("/api/{self}/{endpoint}")
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::V1
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for ApiVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('v')
            .unwrap_or(s)
            .parse::<u32>()
            .map(ApiVersion)
            .map_err(|_| format!("invalid API version '{s}', expected e.g. 'v1'"))
    }
}

// ---------------------------------------------------------------------------
// Request kinds
// ---------------------------------------------------------------------------

/// Discriminator of a [`SubmitRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmitRequestType {
    /// A state-changing method call.
    Call,
}

impl SubmitRequestType {
    /// Wire value of the discriminator.
    pub fn as_str(self) -> &'static str {
        match self {
            SubmitRequestType::Call => "call",
        }
    }
}

/// Discriminator of a [`ReadRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadRequestType {
    /// A side-effect-free method call.
    Query,
    /// A status lookup for a previously submitted request.
    RequestStatus,
}

impl ReadRequestType {
    /// Wire value of the discriminator.
    pub fn as_str(self) -> &'static str {
        match self {
            ReadRequestType::Query => "query",
            ReadRequestType::RequestStatus => "request_status",
        }
    }
}

// ---------------------------------------------------------------------------

/// A request sent to the submit endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitRequest {
    /// Calls `method_name` on `canister_id` with `arg`.
    Call {
        /// Target canister.
        canister_id: CanisterId,
        /// Method to call.
        method_name: String,
        /// Opaque, already-encoded argument bytes.
        arg: Blob,
        /// Optional nonce, set by a transform stage to make repeated calls distinct.
        nonce: Option<Blob>,
        /// Optional expiry in nanoseconds since the Unix epoch.
        ingress_expiry: Option<u64>,
    },
}

impl SubmitRequest {
    /// Builds a call request with no annotations.
    pub fn call(canister_id: CanisterId, fields: CallFields) -> Self {
        SubmitRequest::Call {
            canister_id,
            method_name: fields.method_name,
            arg: fields.arg,
            nonce: None,
            ingress_expiry: None,
        }
    }

    /// The request's discriminator.
    pub fn request_type(&self) -> SubmitRequestType {
        match self {
            SubmitRequest::Call { .. } => SubmitRequestType::Call,
        }
    }

    /// Lowers the request to its wire map. Absent annotations are omitted.
    pub fn to_value(&self) -> Value {
        match self {
            SubmitRequest::Call {
                canister_id,
                method_name,
                arg,
                nonce,
                ingress_expiry,
            } => {
                let mut entries = vec![
                    ("request_type", Value::from(self.request_type().as_str())),
                    ("canister_id", Value::Bytes(canister_id.as_slice().to_vec())),
                    ("method_name", Value::from(method_name.as_str())),
                    ("arg", Value::from(arg)),
                ];
                if let Some(nonce) = nonce {
                    entries.push(("nonce", Value::from(nonce)));
                }
                if let Some(expiry) = ingress_expiry {
                    entries.push(("ingress_expiry", Value::Nat(*expiry)));
                }
                Value::map(entries)
            }
        }
    }
}

/// A request sent to the read endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadRequest {
    /// Runs `method_name` on `canister_id` without committing state.
    Query {
        /// Target canister.
        canister_id: CanisterId,
        /// Method to query.
        method_name: String,
        /// Opaque, already-encoded argument bytes.
        arg: Blob,
        /// Optional expiry in nanoseconds since the Unix epoch.
        ingress_expiry: Option<u64>,
    },
    /// Looks up the status of a submitted request.
    RequestStatus {
        /// Identifier returned by `submit`.
        request_id: RequestId,
    },
}

impl ReadRequest {
    /// Builds a query request with no annotations.
    pub fn query(canister_id: CanisterId, fields: QueryFields) -> Self {
        ReadRequest::Query {
            canister_id,
            method_name: fields.method_name,
            arg: fields.arg,
            ingress_expiry: None,
        }
    }

    /// Builds a status lookup.
    pub fn request_status(fields: RequestStatusFields) -> Self {
        ReadRequest::RequestStatus {
            request_id: fields.request_id,
        }
    }

    /// The request's discriminator.
    pub fn request_type(&self) -> ReadRequestType {
        match self {
            ReadRequest::Query { .. } => ReadRequestType::Query,
            ReadRequest::RequestStatus { .. } => ReadRequestType::RequestStatus,
        }
    }

    /// Lowers the request to its wire map. Absent annotations are omitted.
    pub fn to_value(&self) -> Value {
        let request_type = Value::from(self.request_type().as_str());
        match self {
            ReadRequest::Query {
                canister_id,
                method_name,
                arg,
                ingress_expiry,
            } => {
                let mut entries = vec![
                    ("request_type", request_type),
                    ("canister_id", Value::Bytes(canister_id.as_slice().to_vec())),
                    ("method_name", Value::from(method_name.as_str())),
                    ("arg", Value::from(arg)),
                ];
                if let Some(expiry) = ingress_expiry {
                    entries.push(("ingress_expiry", Value::Nat(*expiry)));
                }
                Value::map(entries)
            }
            ReadRequest::RequestStatus { request_id } => Value::map([
                ("request_type", request_type),
                ("request_id", Value::Bytes(request_id.as_bytes().to_vec())),
            ]),
        }
    }
}

/// The logical body carried by a request envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Body of a submit-endpoint request.
    Submit(SubmitRequest),
    /// Body of a read-endpoint request.
    Read(ReadRequest),
}

impl RequestBody {
    /// The endpoint this body belongs to.
    pub fn endpoint(&self) -> Endpoint {
        match self {
            RequestBody::Submit(_) => Endpoint::Submit,
            RequestBody::Read(_) => Endpoint::Read,
        }
    }

    /// Lowers the body to its wire map.
    pub fn to_value(&self) -> Value {
        match self {
            RequestBody::Submit(request) => request.to_value(),
            RequestBody::Read(request) => request.to_value(),
        }
    }
}

// ---------------------------------------------------------------------------
// Facade inputs
// ---------------------------------------------------------------------------

/// Fields of a `call` facade operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFields {
    /// Method to call.
    pub method_name: String,
    /// Opaque argument bytes.
    pub arg: Blob,
}

/// Fields of a `query` facade operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFields {
    /// Method to query.
    pub method_name: String,
    /// Opaque argument bytes.
    pub arg: Blob,
}

/// Fields of a `request_status` facade operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestStatusFields {
    /// Identifier returned by a previous `call`.
    pub request_id: RequestId,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Result of a submit: the locally derived identifier and the raw transport
/// response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    /// Identifier derived from the caller-supplied request.
    pub request_id: RequestId,
    /// Response returned by the transport.
    pub response: HttpResponse,
}

/// Reason class of a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectCode {
    /// Fatal system error; retrying is unlikely to help.
    SysFatal,
    /// Transient system error; retrying may help.
    SysTransient,
    /// The destination canister does not exist or is unreachable.
    DestinationInvalid,
    /// The canister explicitly rejected the message.
    CanisterReject,
    /// The canister trapped or otherwise failed.
    CanisterError,
    /// A code this client does not know.
    Unknown(u64),
}

impl From<u64> for RejectCode {
    fn from(code: u64) -> Self {
        match code {
            1 => RejectCode::SysFatal,
            2 => RejectCode::SysTransient,
            3 => RejectCode::DestinationInvalid,
            4 => RejectCode::CanisterReject,
            5 => RejectCode::CanisterError,
            other => RejectCode::Unknown(other),
        }
    }
}

impl From<RejectCode> for u64 {
    fn from(code: RejectCode) -> Self {
        match code {
            RejectCode::SysFatal => 1,
            RejectCode::SysTransient => 2,
            RejectCode::DestinationInvalid => 3,
            RejectCode::CanisterReject => 4,
            RejectCode::CanisterError => 5,
            RejectCode::Unknown(other) => other,
        }
    }
}

/// Response to a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResponse {
    /// The query ran and produced a reply.
    Replied {
        /// Reply bytes.
        arg: Blob,
    },
    /// The query was rejected.
    Rejected {
        /// Reject class.
        reject_code: RejectCode,
        /// Human-readable reason.
        reject_message: String,
    },
}

impl QueryResponse {
    /// Lowers the response to its wire map.
    pub fn to_value(&self) -> Value {
        match self {
            QueryResponse::Replied { arg } => replied_value(arg),
            QueryResponse::Rejected {
                reject_code,
                reject_message,
            } => rejected_value(*reject_code, reject_message),
        }
    }
}

impl TryFrom<Value> for QueryResponse {
    type Error = AgentError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        const EXPECTED: &str = "query";
        match status_of(&value, EXPECTED)? {
            "replied" => Ok(QueryResponse::Replied {
                arg: reply_arg(&value, EXPECTED)?,
            }),
            "rejected" => {
                let (reject_code, reject_message) = reject_fields(&value, EXPECTED)?;
                Ok(QueryResponse::Rejected {
                    reject_code,
                    reject_message,
                })
            }
            other => Err(AgentError::invalid_response(
                EXPECTED,
                format!("unexpected status '{other}'"),
            )),
        }
    }
}

/// Response to a status lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStatusResponse {
    /// The request was received but not yet scheduled.
    Received,
    /// The request is executing.
    Processing,
    /// The replica has no record of the request.
    Unknown,
    /// The request completed with a reply.
    Replied {
        /// Reply bytes.
        reply: Blob,
    },
    /// The request was rejected.
    Rejected {
        /// Reject class.
        reject_code: RejectCode,
        /// Human-readable reason.
        reject_message: String,
    },
}

impl RequestStatusResponse {
    /// Wire value of the `status` field.
    pub fn status(&self) -> &'static str {
        match self {
            RequestStatusResponse::Received => "received",
            RequestStatusResponse::Processing => "processing",
            RequestStatusResponse::Unknown => "unknown",
            RequestStatusResponse::Replied { .. } => "replied",
            RequestStatusResponse::Rejected { .. } => "rejected",
        }
    }

    /// Lowers the response to its wire map.
    pub fn to_value(&self) -> Value {
        match self {
            RequestStatusResponse::Replied { reply } => replied_value(reply),
            RequestStatusResponse::Rejected {
                reject_code,
                reject_message,
            } => rejected_value(*reject_code, reject_message),
            _ => Value::map([("status", Value::from(self.status()))]),
        }
    }
}

impl TryFrom<Value> for RequestStatusResponse {
    type Error = AgentError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        const EXPECTED: &str = "request status";
        match status_of(&value, EXPECTED)? {
            "received" => Ok(RequestStatusResponse::Received),
            "processing" => Ok(RequestStatusResponse::Processing),
            "unknown" => Ok(RequestStatusResponse::Unknown),
            "replied" => Ok(RequestStatusResponse::Replied {
                reply: reply_arg(&value, EXPECTED)?,
            }),
            "rejected" => {
                let (reject_code, reject_message) = reject_fields(&value, EXPECTED)?;
                Ok(RequestStatusResponse::Rejected {
                    reject_code,
                    reject_message,
                })
            }
            other => Err(AgentError::invalid_response(
                EXPECTED,
                format!("unexpected status '{other}'"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Response field helpers
// ---------------------------------------------------------------------------

fn replied_value(arg: &Blob) -> Value {
    Value::map([
        ("status", Value::from("replied")),
        ("reply", Value::map([("arg", Value::from(arg))])),
    ])
}

fn rejected_value(code: RejectCode, message: &str) -> Value {
    Value::map([
        ("status", Value::from("rejected")),
        ("reject_code", Value::Nat(code.into())),
        ("reject_message", Value::from(message)),
    ])
}

fn status_of<'a>(value: &'a Value, expected: &'static str) -> Result<&'a str, AgentError> {
    if !matches!(value, Value::Map(_)) {
        return Err(AgentError::invalid_response(
            expected,
            format!("expected a map, found {}", value.kind()),
        ));
    }
    value
        .get("status")
        .and_then(Value::as_text)
        .ok_or_else(|| AgentError::invalid_response(expected, "missing text field 'status'"))
}

fn reply_arg(value: &Value, expected: &'static str) -> Result<Blob, AgentError> {
    value
        .get("reply")
        .and_then(|reply| reply.get("arg"))
        .and_then(Value::as_bytes)
        .map(Blob::from)
        .ok_or_else(|| AgentError::invalid_response(expected, "missing bytes field 'reply.arg'"))
}

fn reject_fields(
    value: &Value,
    expected: &'static str,
) -> Result<(RejectCode, String), AgentError> {
    let code = value
        .get("reject_code")
        .and_then(Value::as_nat)
        .ok_or_else(|| AgentError::invalid_response(expected, "missing nat field 'reject_code'"))?;
    let message = value
        .get("reject_message")
        .and_then(Value::as_text)
        .ok_or_else(|| {
            AgentError::invalid_response(expected, "missing text field 'reject_message'")
        })?;
    Ok((RejectCode::from(code), message.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canister() -> CanisterId {
        CanisterId::new(vec![0, 0, 0, 0, 0, 0, 4, 210])
    }

    #[test]
    fn routes_use_version_prefix() {
        assert_eq!(ApiVersion::V1.route(Endpoint::Submit), "/api/v1/submit");
        assert_eq!(ApiVersion::new(2).route(Endpoint::Read), "/api/v2/read");
        assert_eq!("v3".parse::<ApiVersion>().unwrap(), ApiVersion::new(3));
        assert!("vx".parse::<ApiVersion>().is_err());
    }

    #[test]
    fn call_lowers_to_tagged_map_without_absent_annotations() {
        let request = SubmitRequest::call(
            canister(),
            CallFields {
                method_name: "greet".into(),
                arg: Blob::new(b"DIDL".to_vec()),
            },
        );
        let value = request.to_value();
        assert_eq!(value.get("request_type"), Some(&Value::from("call")));
        assert_eq!(value.get("method_name"), Some(&Value::from("greet")));
        assert_eq!(value.get("nonce"), None);
        assert_eq!(value.get("ingress_expiry"), None);
    }

    #[test]
    fn request_status_lowers_request_id_as_bytes() {
        let request = ReadRequest::request_status(RequestStatusFields {
            request_id: RequestId::new(&[7; 32]),
        });
        assert_eq!(request.request_type(), ReadRequestType::RequestStatus);
        assert_eq!(
            request.to_value().get("request_id"),
            Some(&Value::Bytes(vec![7; 32]))
        );
    }

    #[test]
    fn body_endpoint_follows_kind() {
        let query = ReadRequest::query(
            canister(),
            QueryFields {
                method_name: "m".into(),
                arg: Blob::default(),
            },
        );
        assert_eq!(RequestBody::Read(query).endpoint(), Endpoint::Read);
    }

    #[test]
    fn query_response_parses_reply_and_reject() {
        let replied = QueryResponse::Replied {
            arg: Blob::new(vec![1, 2, 3]),
        };
        assert_eq!(QueryResponse::try_from(replied.to_value()).unwrap(), replied);

        let rejected = QueryResponse::Rejected {
            reject_code: RejectCode::CanisterReject,
            reject_message: "no".into(),
        };
        assert_eq!(
            QueryResponse::try_from(rejected.to_value()).unwrap(),
            rejected
        );
    }

    #[test]
    fn request_status_response_covers_every_status() {
        for status in [
            RequestStatusResponse::Received,
            RequestStatusResponse::Processing,
            RequestStatusResponse::Unknown,
            RequestStatusResponse::Replied {
                reply: Blob::new(vec![9]),
            },
            RequestStatusResponse::Rejected {
                reject_code: RejectCode::Unknown(42),
                reject_message: "odd".into(),
            },
        ] {
            assert_eq!(
                RequestStatusResponse::try_from(status.to_value()).unwrap(),
                status
            );
        }
    }

    #[test]
    fn narrowing_rejects_wrong_shapes() {
        let err = QueryResponse::try_from(Value::Nat(1)).unwrap_err();
        assert!(matches!(
            err,
            AgentError::InvalidResponse {
                expected: "query",
                ..
            }
        ));

        let err = QueryResponse::try_from(Value::map([("status", Value::from("processing"))]))
            .unwrap_err();
        assert!(err.to_string().contains("unexpected status 'processing'"));

        let err = RequestStatusResponse::try_from(Value::map([("status", Value::from("replied"))]))
            .unwrap_err();
        assert!(err.to_string().contains("reply.arg"));
    }
}
