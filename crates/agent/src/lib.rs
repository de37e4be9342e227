//! HTTP agent orchestration.
//!
//! This crate provides the [`HttpAgent`]: the request transform pipeline, the
//! two dispatch operations (`submit`, `read`), and the `call` / `query` /
//! `request_status` facade built on them.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The agent sequences calls between the protocol
//! rules in the [`protocol`] crate and the injected ports ([`protocol::Transport`],
//! [`protocol::Codec`], [`protocol::RequestIdDeriver`]). It holds no protocol
//! rules of its own and never opens a socket itself.
//!
//! ## Pipeline
//!
//! Signing, nonce generation, expiry stamping and similar request-shaping
//! concerns are registered as [`protocol::Transform`] stages so the agent can
//! stay small while third parties extend it. See [`pipeline`] for ordering
//! rules and [`transforms`] for the built-in stages.

pub mod config;
pub mod http_agent;
pub mod pipeline;
pub mod transforms;

pub use config::AgentConfig;
pub use http_agent::{HttpAgent, HttpAgentBuilder};
pub use pipeline::TransformPipeline;
pub use transforms::{
    transform_fn, FnTransform, HeaderTransform, IngressExpiryTransform, NonceTransform,
};
