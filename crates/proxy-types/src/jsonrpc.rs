//! JSON-RPC envelope inspection.
//!
//! The proxy never interprets `method`, `params` or `result`. The only thing it
//! looks at is whether a response carries a top-level `error` member, because
//! JSON-RPC reports failures in-band on an HTTP 200.

use serde_json::Value;
use std::fmt;

/// The `code` and `message` of a JSON-RPC error object, when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonRpcErrorInfo {
	pub code: Option<i64>,
	pub message: Option<String>,
}

impl fmt::Display for JsonRpcErrorInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.code {
			Some(code) => write!(f, "{}", code)?,
			None => write!(f, "unknown")?,
		}
		write!(
			f,
			": {}",
			self.message.as_deref().unwrap_or("unknown error")
		)
	}
}

/// Returns the error carried by a JSON-RPC response, if any.
///
/// Only a top-level, non-null `error` member counts. Batch responses (arrays)
/// are passed through untouched, as are any non-object bodies.
pub fn envelope_error(response: &Value) -> Option<JsonRpcErrorInfo> {
	let error = response.as_object()?.get("error")?;
	if error.is_null() {
		return None;
	}

	let code = error.get("code").and_then(Value::as_i64);
	let message = match error.get("message") {
		Some(Value::String(s)) => Some(s.clone()),
		Some(Value::Null) | None => None,
		Some(other) => Some(other.to_string()),
	};
	// A bare string error (`"error": "rate limited"`) is still an error.
	let message = message.or_else(|| error.as_str().map(str::to_string));

	Some(JsonRpcErrorInfo { code, message })
}
