//! HTTP boundary for the browser enhancer.
//!
//! Thin axum route handlers that reshape JSON, log, and call the
//! conversational agent.

pub mod api;
pub mod config;
pub mod http_server;
