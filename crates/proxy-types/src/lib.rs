//! Common types module for the RPC fallback proxy.
//!
//! This module defines the data types shared by the configuration layer, the
//! fallback dispatcher and the HTTP service, so that every crate agrees on
//! what an endpoint, a JSON-RPC envelope and an API error look like.

/// API types for the HTTP surface and its error bodies.
pub mod api;
/// Environment variable names and other fixed values.
pub mod constants;
/// Upstream provider endpoint type.
pub mod endpoint;
/// Helpers for inspecting JSON-RPC envelopes without interpreting them.
pub mod jsonrpc;
/// URL wrapper that keeps provider credentials out of logs.
pub mod secret_url;

// Re-export all types for convenient access
pub use api::*;
pub use constants::*;
pub use endpoint::ProviderEndpoint;
pub use jsonrpc::{envelope_error, JsonRpcErrorInfo};
pub use secret_url::SecretUrl;
