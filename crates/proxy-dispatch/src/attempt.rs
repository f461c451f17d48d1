//! A single attempt against a single provider.
//!
//! An attempt succeeds only when the provider answers with a 2xx status AND a
//! JSON body that carries no top-level `error`. Everything else (non-2xx, an
//! in-band JSON-RPC error, an unparseable body, a transport failure or the
//! deadline elapsing) is an [`AttemptFailure`].

use crate::{RpcTransport, TransportError, TransportResponse};
use bytes::Bytes;
use proxy_types::{envelope_error, JsonRpcErrorInfo, ProviderEndpoint};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Why a provider attempt did not produce a usable response.
///
/// The `Display` output is the reason string used in diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptFailure {
	/// The deadline elapsed and the in-flight call was dropped.
	#[error("Request timeout after {timeout_ms}ms")]
	Timeout { timeout_ms: u64 },
	/// The provider answered with a non-2xx status.
	#[error("HTTP {status}: {status_text}")]
	Http { status: u16, status_text: String },
	/// HTTP succeeded but the JSON-RPC envelope reports an error.
	#[error("JSON-RPC error {0}")]
	JsonRpc(JsonRpcErrorInfo),
	/// HTTP succeeded but the body is not JSON.
	#[error("Invalid JSON response: {0}")]
	InvalidResponse(String),
	/// The request never produced a response.
	#[error(transparent)]
	Transport(#[from] TransportError),
}

impl AttemptFailure {
	pub fn is_timeout(&self) -> bool {
		matches!(self, AttemptFailure::Timeout { .. })
	}
}

/// Outcome of one attempt, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
	/// Provider display name.
	pub provider: String,
	pub outcome: Result<(), AttemptFailure>,
	pub elapsed: Duration,
}

impl AttemptRecord {
	/// `"✗ {provider} failed: {reason}"` for failures, `"✓ {provider} succeeded"` otherwise.
	pub fn diagnostic(&self) -> String {
		match &self.outcome {
			Ok(()) => format!("✓ {} succeeded", self.provider),
			Err(failure) => format!("✗ {} failed: {}", self.provider, failure),
		}
	}

	pub fn is_success(&self) -> bool {
		self.outcome.is_ok()
	}
}

/// Sends `body` to one provider and classifies the result.
///
/// The whole exchange (connect, send, read body) runs under `timeout`. When the
/// deadline wins, the transport future is dropped, which aborts the request;
/// the timer itself is owned by the timeout future and goes away with it on
/// every path.
pub async fn try_provider(
	transport: &dyn RpcTransport,
	endpoint: &ProviderEndpoint,
	body: Bytes,
	timeout: Duration,
) -> Result<Bytes, AttemptFailure> {
	let response = match tokio::time::timeout(timeout, transport.post_json(&endpoint.url, body)).await
	{
		Ok(result) => result?,
		Err(_elapsed) => {
			return Err(AttemptFailure::Timeout {
				timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
			});
		},
	};

	classify(response)
}

fn classify(response: TransportResponse) -> Result<Bytes, AttemptFailure> {
	if !response.is_success() {
		return Err(AttemptFailure::Http {
			status: response.status,
			status_text: response.status_text,
		});
	}

	let parsed: Value = serde_json::from_slice(&response.body)
		.map_err(|e| AttemptFailure::InvalidResponse(e.to_string()))?;

	if let Some(error) = envelope_error(&parsed) {
		return Err(AttemptFailure::JsonRpc(error));
	}

	Ok(response.body)
}
