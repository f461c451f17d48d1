//! API types for the proxy HTTP surface.
//!
//! Error bodies are deliberately minimal (`error` plus optional `details`) so
//! that browser clients can show the message directly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Human-readable summary
	pub error: String,
	/// Per-provider diagnostics, in attempt order
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Vec<String>>,
}

/// Response of the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: String,
	/// Configured provider names in priority order
	pub providers: Vec<String>,
	pub attempt_timeout_ms: u64,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request (400)
	BadRequest { message: String },
	/// Every upstream failed (503)
	ServiceUnavailable {
		message: String,
		details: Vec<String>,
	},
	/// Internal server error (500)
	InternalServerError { message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest { message } | APIError::InternalServerError { message } => {
				ErrorResponse {
					error: message.clone(),
					details: None,
				}
			},
			APIError::ServiceUnavailable { message, details } => ErrorResponse {
				error: message.clone(),
				details: Some(details.clone()),
			},
		}
	}

	/// The generic 500 used when a fault has no better description.
	pub fn internal() -> Self {
		APIError::InternalServerError {
			message: "Internal server error".to_string(),
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message } => write!(f, "Bad Request: {}", message),
			APIError::ServiceUnavailable { message, details } => {
				write!(f, "Service Unavailable: {} ({} attempts)", message, details.len())
			},
			APIError::InternalServerError { message } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = match self.status_code() {
			400 => StatusCode::BAD_REQUEST,
			503 => StatusCode::SERVICE_UNAVAILABLE,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		};

		let error_response = self.to_error_response();
		(status, Json(error_response)).into_response()
	}
}
