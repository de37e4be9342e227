//! Protocol domain for the HTTP agent.
//!
//! This crate contains every wire concept, newtype identifier, request and
//! response shape, and the error type shared by the rest of the workspace.
//! Infrastructure crates implement the port traits defined here; they never
//! add protocol rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is sent and *how it is shaped*; the `agent` crate decides
//! when, and infrastructure crates decide how bytes reach the network.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`Blob`, `CanisterId`, `RequestId`) |
//! | [`types`] | Logical requests, responses, endpoints, API version |
//! | [`http`] | Transport skeleton (`HttpRequest`, `HttpResponse`, `HeaderMap`) |
//! | [`value`] | The tree-shaped [`Value`] every request and response passes through |
//! | [`codec`] | [`Codec`] trait and the default [`CborCodec`] |
//! | [`request_id`] | Representation-independent request-id hashing |
//! | [`ports`] | [`Transport`], [`Transform`], [`RequestIdDeriver`] traits and the request envelope |
//! | [`errors`] | [`AgentError`] |

pub mod codec;
pub mod errors;
pub mod http;
pub mod identifiers;
pub mod ports;
pub mod request_id;
pub mod types;
pub mod value;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use codec::{CborCodec, Codec};
pub use errors::AgentError;
pub use http::{HeaderMap, HttpMethod, HttpRequest, HttpResponse};
pub use identifiers::{Blob, CanisterId, ParseRequestIdError, RequestId};
pub use ports::{HttpAgentRequest, RequestIdDeriver, Transform, Transport};
pub use request_id::{request_id_of, Sha256RequestIdDeriver};
pub use types::{
    ApiVersion, CallFields, Endpoint, QueryFields, QueryResponse, ReadRequest, ReadRequestType,
    RejectCode, RequestBody, RequestStatusFields, RequestStatusResponse, SubmitRequest,
    SubmitRequestType, SubmitResponse,
};
pub use value::Value;
