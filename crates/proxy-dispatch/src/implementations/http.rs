//! HTTP transport backed by a pooled `reqwest` client.

use crate::{RpcTransport, TransportError, TransportResponse};
use async_trait::async_trait;
use bytes::Bytes;
use proxy_types::SecretUrl;
use reqwest::header::CONTENT_TYPE;
use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

/// Transport that POSTs to providers over HTTP(S).
///
/// The client is shared across all inbound requests so connections to the
/// providers are pooled. Neither a request nor a connect timeout is set on the
/// client: the per-attempt deadline covers connecting too, so a hung connect
/// is reported as a timeout.
pub struct HttpTransport {
	client: reqwest::Client,
}

impl HttpTransport {
	/// Creates a transport with a pooled client.
	pub fn new() -> Result<Self, TransportError> {
		let client = reqwest::Client::builder()
			.pool_idle_timeout(Duration::from_secs(90))
			.pool_max_idle_per_host(10)
			.build()
			.map_err(|e| TransportError::Network(describe(e)))?;
		Ok(Self { client })
	}

	/// Wraps an existing client.
	pub fn with_client(client: reqwest::Client) -> Self {
		Self { client }
	}
}

#[async_trait]
impl RpcTransport for HttpTransport {
	async fn post_json(
		&self,
		url: &SecretUrl,
		body: Bytes,
	) -> Result<TransportResponse, TransportError> {
		let response = url
			.with_exposed(|url| self.client.post(url))
			.header(CONTENT_TYPE, "application/json")
			.body(body)
			.send()
			.await
			.map_err(|e| TransportError::Network(describe(e)))?;

		let status = response.status();
		let body = response
			.bytes()
			.await
			.map_err(|e| TransportError::Body(describe(e)))?;

		Ok(TransportResponse {
			status: status.as_u16(),
			status_text: status
				.canonical_reason()
				.unwrap_or("Unknown Status")
				.to_string(),
			body,
		})
	}
}

/// Renders a reqwest error with its causes but without the request URL,
/// which may carry an API key.
fn describe(err: reqwest::Error) -> String {
	let err = err.without_url();
	let mut message = err.to_string();
	let mut source = err.source();
	while let Some(cause) = source {
		message.push_str(": ");
		message.push_str(&cause.to_string());
		source = cause.source();
	}
	message
}

/// Factory function to create the default HTTP transport.
pub fn create_transport() -> Result<Arc<dyn RpcTransport>, TransportError> {
	Ok(Arc::new(HttpTransport::new()?))
}
