//! Error type shared by every layer of the HTTP agent.
//!
//! [`AgentError`] is the single error surfaced by submit, read, the facade
//! operations, and agent construction. Nothing in the agent swallows,
//! retries, or translates an error: a variant produced by a transform stage,
//! a transport, or the codec reaches the caller exactly as it was built.
//!
//! ## Taxonomy
//!
//! | Class | Variants |
//! |-------|----------|
//! | Pipeline stage failure | [`AgentError::Transform`] |
//! | Transport failure | [`AgentError::Transport`], [`AgentError::HttpStatus`] |
//! | Codec failure | [`AgentError::Encode`], [`AgentError::Decode`], [`AgentError::InvalidResponse`] |
//! | Configuration failure | [`AgentError::Configuration`] |
//! | Identifier derivation | [`AgentError::RequestId`] |

use thiserror::Error;

/// Errors produced while constructing an agent or dispatching a request.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A registered transform stage failed, or returned an envelope whose
    /// request kind no longer matches its endpoint.
    ///
    /// Produced before any network call is made.
    #[error("Transform stage '{stage}' failed: {message}")]
    Transform {
        /// Name of the failing stage.
        stage: String,
        /// Human-readable description of the failure.
        message: String,
    },

    /// The transport could not complete the call (connection refused, DNS,
    /// timeout, malformed URL, ...).
    #[error("Transport error calling '{route}': {message}")]
    Transport {
        /// Route the request was sent to.
        route: String,
        /// Human-readable description of the failure.
        message: String,
    },

    /// The remote end answered with a failure-indicating HTTP status.
    #[error("HTTP status {status} from '{route}'")]
    HttpStatus {
        /// Route the request was sent to.
        route: String,
        /// The HTTP status code returned.
        status: u16,
        /// Raw response body, kept for diagnostics.
        body: Vec<u8>,
    },

    /// A value could not be encoded to the wire format.
    #[error("Failed to encode request body: {message}")]
    Encode {
        /// Description of the encoding problem.
        message: String,
    },

    /// Response bytes could not be decoded from the wire format.
    #[error("Failed to decode response body: {message}")]
    Decode {
        /// Description of the decoding problem.
        message: String,
    },

    /// A decoded response did not have the shape expected by the caller.
    #[error("Invalid {expected} response: {message}")]
    InvalidResponse {
        /// Name of the expected response shape (e.g. `"query"`).
        expected: &'static str,
        /// Description of the mismatch.
        message: String,
    },

    /// The request identifier could not be derived.
    #[error("Failed to derive request id: {message}")]
    RequestId {
        /// Description of the failure.
        message: String,
    },

    /// The agent could not be constructed from the supplied configuration.
    ///
    /// Produced by `build()`; an agent never fails with this at call time.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A task spawned to run part of a request panicked or was aborted.
    #[error("Request task failed: {message}")]
    TaskFailed {
        /// Description of the failure reported by the runtime.
        message: String,
    },
}

impl AgentError {
    /// Builds an [`AgentError::Transform`] for the named stage.
    pub fn transform(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Builds an [`AgentError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Builds an [`AgentError::Decode`].
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Builds an [`AgentError::InvalidResponse`].
    pub fn invalid_response(expected: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            expected,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_stage_name() {
        let err = AgentError::transform("sign", "missing key");
        assert_eq!(err.to_string(), "Transform stage 'sign' failed: missing key");
    }

    #[test]
    fn http_status_display_omits_body() {
        let err = AgentError::HttpStatus {
            route: "/api/v1/read".into(),
            status: 503,
            body: b"overloaded".to_vec(),
        };
        assert_eq!(err.to_string(), "HTTP status 503 from '/api/v1/read'");
    }
}
