//! Upstream provider endpoint type.

use crate::SecretUrl;
use serde::{Deserialize, Serialize};

/// A named upstream JSON-RPC endpoint.
///
/// The name identifies the provider in logs and diagnostics; the URL is only
/// handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProviderEndpoint {
	pub name: String,
	pub url: SecretUrl,
}

impl ProviderEndpoint {
	pub fn new(name: impl Into<String>, url: impl Into<SecretUrl>) -> Self {
		Self {
			name: name.into(),
			url: url.into(),
		}
	}

	/// Returns true if this endpoint has a URL and can be attempted.
	pub fn is_configured(&self) -> bool {
		!self.url.is_empty()
	}
}
