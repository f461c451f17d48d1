//! HTTP server for the RPC proxy.
//!
//! Exposes the JSON-RPC forwarding route and a health route, with a request
//! size limit, permissive CORS for browser callers, HTTP tracing and panic
//! containment.

use axum::{
	extract::{DefaultBodyLimit, State},
	http::{header::CONTENT_TYPE, StatusCode},
	response::{IntoResponse, Json, Response},
	routing::{get, post},
	Router,
};
use bytes::Bytes;
use proxy_config::ApiConfig;
use proxy_dispatch::FallbackDispatcher;
use proxy_types::{APIError, HealthResponse};
use std::any::Any;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Dispatcher shared by every inbound request.
	pub dispatcher: Arc<FallbackDispatcher>,
}

/// Builds the router with all routes and middleware.
pub fn build_router(api_config: &ApiConfig, dispatcher: Arc<FallbackDispatcher>) -> Router {
	let app_state = AppState { dispatcher };

	Router::new()
		.route(&api_config.path, post(handle_rpc))
		.route("/health", get(handle_health))
		.layer(DefaultBodyLimit::max(api_config.max_request_size))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CatchPanicLayer::custom(handle_panic))
				.layer(CorsLayer::permissive()),
		)
		.with_state(app_state)
}

/// Starts the HTTP server and runs it until Ctrl-C.
pub async fn start_server(
	api_config: ApiConfig,
	dispatcher: Arc<FallbackDispatcher>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = build_router(&api_config, dispatcher);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!(
		"RPC proxy listening on {} (POST {})",
		bind_address,
		api_config.path
	);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!("Failed to listen for shutdown signal: {}", e);
		std::future::pending::<()>().await;
	}
	tracing::info!("Shutdown signal received");
}

/// Handles POST requests on the configured JSON-RPC path.
///
/// The body is taken as raw bytes so that malformed JSON produces the proxy's
/// own 400 body rather than the extractor's rejection.
async fn handle_rpc(State(state): State<AppState>, body: Bytes) -> Result<Response, APIError> {
	match crate::apis::rpc::process_rpc_request(&body, &state.dispatcher).await {
		Ok(upstream) => Ok((
			StatusCode::OK,
			[(CONTENT_TYPE, "application/json")],
			upstream,
		)
			.into_response()),
		Err(e) => {
			tracing::warn!("RPC request failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /health requests.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(crate::apis::health::health_report(&state.dispatcher))
}

/// Turns a handler panic into the generic 500 body.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
	let detail = err
		.downcast_ref::<String>()
		.map(String::as_str)
		.or_else(|| err.downcast_ref::<&str>().copied())
		.unwrap_or("unknown panic");
	tracing::error!("Request handler panicked: {}", detail);
	APIError::internal().into_response()
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::Request;
	use proxy_dispatch::{implementations::http::HttpTransport, DispatchSettings};
	use proxy_types::ProviderEndpoint;
	use serde_json::{json, Value};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;
	use tower::ServiceExt;

	/// Serves `router` on an ephemeral loopback port and returns its RPC URL.
	async fn spawn_upstream(router: Router) -> String {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, router).await.unwrap();
		});
		format!("http://{}/rpc", addr)
	}

	/// Upstream that always answers with `status` and `body`, counting hits.
	async fn upstream(status: StatusCode, body: Value, hits: Arc<AtomicUsize>) -> String {
		let router = Router::new().route(
			"/rpc",
			post(move || {
				let hits = hits.clone();
				let body = body.clone();
				async move {
					hits.fetch_add(1, Ordering::SeqCst);
					(status, Json(body))
				}
			}),
		);
		spawn_upstream(router).await
	}

	/// Upstream that answers only after `delay`.
	async fn slow_upstream(delay: Duration, hits: Arc<AtomicUsize>) -> String {
		let router = Router::new().route(
			"/rpc",
			post(move || {
				let hits = hits.clone();
				async move {
					hits.fetch_add(1, Ordering::SeqCst);
					tokio::time::sleep(delay).await;
					Json(json!({"jsonrpc": "2.0", "id": 1, "result": "0xslow"}))
				}
			}),
		);
		spawn_upstream(router).await
	}

	fn proxy(endpoints: Vec<ProviderEndpoint>, timeout_ms: u64) -> Router {
		let dispatcher = FallbackDispatcher::new(
			endpoints,
			Arc::new(HttpTransport::new().unwrap()),
			DispatchSettings {
				attempt_timeout: Duration::from_millis(timeout_ms),
			},
		);
		build_router(&ApiConfig::default(), Arc::new(dispatcher))
	}

	fn rpc_request(body: &str) -> Request<Body> {
		Request::builder()
			.method("POST")
			.uri("/api/rpc/base")
			.header(CONTENT_TYPE, "application/json")
			.body(Body::from(body.to_string()))
			.unwrap()
	}

	async fn send(app: Router, request: Request<Body>) -> (StatusCode, Bytes) {
		let response = app.oneshot(request).await.unwrap();
		let status = response.status();
		let body = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		(status, body)
	}

	const BLOCK_NUMBER: &str = r#"{"jsonrpc":"2.0","method":"eth_blockNumber","params":[],"id":1}"#;

	#[tokio::test]
	async fn test_success_is_forwarded_and_later_providers_untouched() {
		let hits_a = Arc::new(AtomicUsize::new(0));
		let hits_b = Arc::new(AtomicUsize::new(0));
		let a = upstream(
			StatusCode::OK,
			json!({"jsonrpc": "2.0", "id": 1, "result": "0x12a05f200"}),
			hits_a.clone(),
		)
		.await;
		let b = upstream(StatusCode::OK, json!({"result": "0xb"}), hits_b.clone()).await;

		let app = proxy(
			vec![ProviderEndpoint::new("A", a), ProviderEndpoint::new("B", b)],
			5000,
		);
		let (status, body) = send(app, rpc_request(BLOCK_NUMBER)).await;

		assert_eq!(status, StatusCode::OK);
		let body: Value = serde_json::from_slice(&body).unwrap();
		assert_eq!(body, json!({"jsonrpc": "2.0", "id": 1, "result": "0x12a05f200"}));
		assert_eq!(hits_a.load(Ordering::SeqCst), 1);
		assert_eq!(hits_b.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_timeout_then_rpc_error_then_success() {
		let hits_a = Arc::new(AtomicUsize::new(0));
		let hits_b = Arc::new(AtomicUsize::new(0));
		let hits_c = Arc::new(AtomicUsize::new(0));
		let a = slow_upstream(Duration::from_millis(500), hits_a).await;
		let b = upstream(
			StatusCode::OK,
			json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "method not found"}}),
			hits_b.clone(),
		)
		.await;
		let c = upstream(StatusCode::OK, json!({"result": "0x1"}), hits_c.clone()).await;

		let app = proxy(
			vec![
				ProviderEndpoint::new("A", a),
				ProviderEndpoint::new("B", b),
				ProviderEndpoint::new("C", c),
			],
			50,
		);
		let (status, body) = send(app, rpc_request(BLOCK_NUMBER)).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"result": "0x1"}));
		assert_eq!(hits_b.load(Ordering::SeqCst), 1);
		assert_eq!(hits_c.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_all_providers_failing_returns_503_with_details() {
		let hits = Arc::new(AtomicUsize::new(0));
		let a = upstream(StatusCode::INTERNAL_SERVER_ERROR, json!({}), hits.clone()).await;
		let b = upstream(StatusCode::INTERNAL_SERVER_ERROR, json!({}), hits.clone()).await;

		let app = proxy(
			vec![ProviderEndpoint::new("A", a), ProviderEndpoint::new("B", b)],
			5000,
		);
		let (status, body) = send(app, rpc_request(BLOCK_NUMBER)).await;

		assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
		let body: Value = serde_json::from_slice(&body).unwrap();
		assert_eq!(
			body,
			json!({
				"error": "All RPC providers unavailable",
				"details": [
					"✗ A failed: HTTP 500: Internal Server Error",
					"✗ B failed: HTTP 500: Internal Server Error"
				]
			})
		);
	}

	#[tokio::test]
	async fn test_unreachable_provider_falls_through() {
		let hits = Arc::new(AtomicUsize::new(0));
		// Bind then drop to get a loopback port nothing listens on.
		let dead = {
			let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
			format!("http://{}/rpc", listener.local_addr().unwrap())
		};
		let live = upstream(StatusCode::OK, json!({"result": "0x2"}), hits.clone()).await;

		let app = proxy(
			vec![
				ProviderEndpoint::new("Dead", dead),
				ProviderEndpoint::new("Live", live),
			],
			5000,
		);
		let (status, body) = send(app, rpc_request(BLOCK_NUMBER)).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(serde_json::from_slice::<Value>(&body).unwrap()["result"], "0x2");
	}

	#[tokio::test]
	async fn test_no_providers_returns_500() {
		let app = proxy(vec![ProviderEndpoint::new("Private RPC 1", "")], 5000);
		let (status, body) = send(app, rpc_request(BLOCK_NUMBER)).await;

		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		let body: Value = serde_json::from_slice(&body).unwrap();
		assert_eq!(
			body,
			json!({"error": "No RPC providers configured. Please set BASE_RPC_PRIVATE_URL_1, BASE_RPC_PRIVATE_URL_2, or BASE_RPC_PUBLIC_URL"})
		);
	}

	#[tokio::test]
	async fn test_invalid_json_returns_400_without_upstream_calls() {
		let hits = Arc::new(AtomicUsize::new(0));
		let a = upstream(StatusCode::OK, json!({"result": "0x1"}), hits.clone()).await;

		let app = proxy(vec![ProviderEndpoint::new("A", a)], 5000);
		let (status, body) = send(app, rpc_request("not json")).await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(
			serde_json::from_slice::<Value>(&body).unwrap(),
			json!({"error": "Invalid JSON in request body"})
		);
		assert_eq!(hits.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_oversized_body_rejected() {
		let dispatcher = FallbackDispatcher::new(
			vec![],
			Arc::new(HttpTransport::new().unwrap()),
			DispatchSettings::default(),
		);
		let api_config = ApiConfig {
			max_request_size: 16,
			..ApiConfig::default()
		};
		let app = build_router(&api_config, Arc::new(dispatcher));

		let (status, _) = send(app, rpc_request(BLOCK_NUMBER)).await;
		assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
	}

	#[tokio::test]
	async fn test_health_lists_provider_names_only() {
		let app = proxy(
			vec![
				ProviderEndpoint::new("Alchemy", "https://base-mainnet.g.alchemy.com/v2/secret"),
				ProviderEndpoint::new("Private RPC 2", ""),
				ProviderEndpoint::new("Public RPC", "https://mainnet.base.org"),
			],
			750,
		);
		let request = Request::builder()
			.uri("/health")
			.body(Body::empty())
			.unwrap();
		let (status, body) = send(app, request).await;

		assert_eq!(status, StatusCode::OK);
		let text = String::from_utf8(body.to_vec()).unwrap();
		assert!(!text.contains("secret"));
		let body: Value = serde_json::from_str(&text).unwrap();
		assert_eq!(
			body,
			json!({"status": "ok", "providers": ["Alchemy", "Public RPC"], "attempt_timeout_ms": 750})
		);
	}

	#[tokio::test]
	async fn test_panic_maps_to_internal_error() {
		let response = handle_panic(Box::new("boom"));
		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
		let body = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		assert_eq!(
			serde_json::from_slice::<Value>(&body).unwrap(),
			json!({"error": "Internal server error"})
		);
	}
}
