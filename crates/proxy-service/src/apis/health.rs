//! Health endpoint: reports which providers are in rotation, by name only.

use proxy_dispatch::FallbackDispatcher;
use proxy_types::HealthResponse;

pub fn health_report(dispatcher: &FallbackDispatcher) -> HealthResponse {
	let providers: Vec<String> = dispatcher
		.endpoints()
		.iter()
		.map(|e| e.name.clone())
		.collect();
	let status = if providers.is_empty() {
		"unconfigured"
	} else {
		"ok"
	};

	HealthResponse {
		status: status.to_string(),
		providers,
		attempt_timeout_ms: u64::try_from(dispatcher.attempt_timeout().as_millis())
			.unwrap_or(u64::MAX),
	}
}
