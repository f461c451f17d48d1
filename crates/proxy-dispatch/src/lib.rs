//! Fallback dispatch module for the RPC proxy.
//!
//! [`FallbackDispatcher`] takes one JSON-RPC request and tries the configured
//! upstream providers strictly one after another, in priority order, until one
//! of them produces a usable response. Each attempt is bounded by a timeout.
//! If every provider fails, the per-provider reasons are returned in the order
//! the providers were tried.
//!
//! Providers are never raced: a concurrent fan-out would spend request quota
//! on every provider for every call, including the common case where the first
//! one answers.

use async_trait::async_trait;
use bytes::Bytes;
use proxy_types::{
	ProviderEndpoint, SecretUrl, PRIVATE_RPC_URL_1_ENV, PRIVATE_RPC_URL_2_ENV, PUBLIC_RPC_URL_ENV,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

mod attempt;

/// Re-export implementations
pub mod implementations {
	pub mod http;
}

pub use attempt::{try_provider, AttemptFailure, AttemptRecord};

/// Errors that can occur while sending a request to a provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
	/// The request could not be sent or no response arrived.
	#[error("Network error: {0}")]
	Network(String),
	/// The response started but its body could not be read.
	#[error("Failed to read response body: {0}")]
	Body(String),
}

/// A fully read upstream HTTP response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
	pub status: u16,
	/// Canonical reason phrase for `status`.
	pub status_text: String,
	pub body: Bytes,
}

impl TransportResponse {
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Trait defining how a JSON body is POSTed to an upstream provider.
///
/// Implementations must be cancel-safe: the dispatcher drops the returned
/// future when the attempt deadline elapses, and dropping it must abort the
/// request.
#[async_trait]
pub trait RpcTransport: Send + Sync {
	/// POSTs `body` with `Content-Type: application/json` and reads the whole
	/// response.
	async fn post_json(
		&self,
		url: &SecretUrl,
		body: Bytes,
	) -> Result<TransportResponse, TransportError>;
}

/// Errors returned by [`FallbackDispatcher`].
#[derive(Debug, Error)]
pub enum DispatchError {
	/// The inbound body is not JSON. No provider was contacted.
	#[error("Invalid JSON in request body")]
	InvalidRequest(#[source] serde_json::Error),
	/// The provider list is empty. No provider was contacted.
	#[error(
		"No RPC providers configured. Please set {p1}, {p2}, or {public}",
		p1 = PRIVATE_RPC_URL_1_ENV,
		p2 = PRIVATE_RPC_URL_2_ENV,
		public = PUBLIC_RPC_URL_ENV
	)]
	NoProvidersConfigured,
	/// Every configured provider was tried and failed.
	#[error("All RPC providers unavailable")]
	AllProvidersFailed { attempts: Vec<AttemptRecord> },
	/// A fault unrelated to the request or the providers.
	#[error("Internal error: {0}")]
	Internal(String),
}

impl DispatchError {
	/// Per-provider diagnostics, in attempt order. Empty unless every provider failed.
	pub fn details(&self) -> Vec<String> {
		match self {
			DispatchError::AllProvidersFailed { attempts } => {
				attempts.iter().map(AttemptRecord::diagnostic).collect()
			},
			_ => Vec::new(),
		}
	}
}

/// A successful dispatch.
#[derive(Debug, Clone)]
pub struct DispatchSuccess {
	/// Name of the provider that answered.
	pub provider: String,
	/// The provider's response body, byte for byte.
	pub body: Bytes,
	/// Every attempt made for this request, the successful one last.
	pub attempts: Vec<AttemptRecord>,
}

impl DispatchSuccess {
	/// Attempts that failed before the successful one.
	pub fn failed_attempts(&self) -> impl Iterator<Item = &AttemptRecord> {
		self.attempts.iter().filter(|a| !a.is_success())
	}
}

/// Tunables for [`FallbackDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchSettings {
	/// Deadline for a single provider attempt.
	pub attempt_timeout: Duration,
}

impl Default for DispatchSettings {
	fn default() -> Self {
		Self {
			attempt_timeout: Duration::from_millis(proxy_types::DEFAULT_ATTEMPT_TIMEOUT_MS),
		}
	}
}

/// Sequential, priority-ordered dispatcher over unreliable upstreams.
///
/// Holds only read-only state, so a single instance can be shared behind an
/// `Arc` by every concurrent inbound request.
pub struct FallbackDispatcher {
	/// Providers in priority order; unconfigured entries already removed.
	endpoints: Vec<ProviderEndpoint>,
	transport: Arc<dyn RpcTransport>,
	settings: DispatchSettings,
}

impl FallbackDispatcher {
	/// Creates a dispatcher over `endpoints`, keeping their order and dropping
	/// any entry without a URL.
	pub fn new(
		endpoints: Vec<ProviderEndpoint>,
		transport: Arc<dyn RpcTransport>,
		settings: DispatchSettings,
	) -> Self {
		let endpoints = endpoints
			.into_iter()
			.filter(ProviderEndpoint::is_configured)
			.collect();
		Self {
			endpoints,
			transport,
			settings,
		}
	}

	pub fn endpoints(&self) -> &[ProviderEndpoint] {
		&self.endpoints
	}

	pub fn attempt_timeout(&self) -> Duration {
		self.settings.attempt_timeout
	}

	/// Handles a raw inbound body.
	///
	/// The body must be valid JSON; its shape is not checked any further.
	pub async fn handle(&self, body: &[u8]) -> Result<DispatchSuccess, DispatchError> {
		let request: Value = serde_json::from_slice(body).map_err(|e| {
			tracing::debug!("Rejecting request with invalid JSON body: {}", e);
			DispatchError::InvalidRequest(e)
		})?;
		self.dispatch(&request).await
	}

	/// Forwards an already parsed JSON-RPC request.
	///
	/// Providers are tried in order; the first success is returned and no
	/// later provider is contacted. A provider is never retried within one
	/// call. JSON-RPC errors fall through to the next provider just like
	/// transport errors, since another node may be able to serve the call.
	pub async fn dispatch(&self, request: &Value) -> Result<DispatchSuccess, DispatchError> {
		if self.endpoints.is_empty() {
			tracing::error!("No RPC providers configured");
			return Err(DispatchError::NoProvidersConfigured);
		}

		let body = serde_json::to_vec(request)
			.map(Bytes::from)
			.map_err(|e| DispatchError::Internal(format!("Failed to encode request: {}", e)))?;

		let mut attempts = Vec::with_capacity(self.endpoints.len());

		for endpoint in &self.endpoints {
			let started = Instant::now();
			let outcome = try_provider(
				self.transport.as_ref(),
				endpoint,
				body.clone(),
				self.settings.attempt_timeout,
			)
			.await;
			let elapsed = started.elapsed();

			match outcome {
				Ok(response) => {
					tracing::info!(
						provider = %endpoint.name,
						elapsed_ms = elapsed.as_millis() as u64,
						"✓ {} succeeded",
						endpoint.name
					);
					attempts.push(AttemptRecord {
						provider: endpoint.name.clone(),
						outcome: Ok(()),
						elapsed,
					});
					return Ok(DispatchSuccess {
						provider: endpoint.name.clone(),
						body: response,
						attempts,
					});
				},
				Err(failure) => {
					tracing::warn!(
						provider = %endpoint.name,
						elapsed_ms = elapsed.as_millis() as u64,
						"✗ {} failed: {}",
						endpoint.name,
						failure
					);
					attempts.push(AttemptRecord {
						provider: endpoint.name.clone(),
						outcome: Err(failure),
						elapsed,
					});
				},
			}
		}

		tracing::error!("All {} RPC providers failed", attempts.len());
		Err(DispatchError::AllProvidersFailed { attempts })
	}
}
