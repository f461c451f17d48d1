//! JSON-RPC forwarding endpoint.
//!
//! Runs the fallback dispatcher for one inbound body and maps its errors onto
//! the API error bodies browser clients expect.

use bytes::Bytes;
use proxy_dispatch::{DispatchError, FallbackDispatcher};
use proxy_types::APIError;
use tracing::Instrument;
use uuid::Uuid;

/// Forwards one inbound JSON-RPC body and returns the winning provider's
/// response body unchanged.
pub async fn process_rpc_request(
	body: &[u8],
	dispatcher: &FallbackDispatcher,
) -> Result<Bytes, APIError> {
	let request_id = Uuid::new_v4();
	let span = tracing::info_span!("rpc_request", %request_id);

	async move {
		match dispatcher.handle(body).await {
			Ok(success) => {
				for attempt in success.failed_attempts() {
					tracing::debug!("{}", attempt.diagnostic());
				}
				tracing::debug!(
					provider = %success.provider,
					attempts = success.attempts.len(),
					"Forwarding upstream response"
				);
				Ok(success.body)
			},
			Err(e) => Err(dispatch_error_to_api(e)),
		}
	}
	.instrument(span)
	.await
}

/// Maps dispatcher errors onto HTTP API errors.
pub fn dispatch_error_to_api(err: DispatchError) -> APIError {
	match err {
		DispatchError::InvalidRequest(_) => APIError::BadRequest {
			message: err.to_string(),
		},
		DispatchError::NoProvidersConfigured => APIError::InternalServerError {
			message: err.to_string(),
		},
		DispatchError::AllProvidersFailed { .. } => APIError::ServiceUnavailable {
			details: err.details(),
			message: err.to_string(),
		},
		DispatchError::Internal(ref reason) => {
			tracing::error!("Unexpected dispatch fault: {}", reason);
			APIError::internal()
		},
	}
}
