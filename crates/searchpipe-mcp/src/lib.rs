//! searchpipe: multi-provider search/scrape/knowledge tools over MCP.
//!
//! The binary wires a transport-agnostic [`gateway::ToolGateway`] to two
//! transports (rmcp stdio, axum HTTP/SSE) under a bounded restart policy.

pub mod gateway;
pub mod http;
pub mod notes;
pub mod service;
pub mod supervise;
