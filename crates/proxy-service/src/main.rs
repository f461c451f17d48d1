//! Main entry point for the RPC fallback proxy.
//!
//! This binary serves a single JSON-RPC endpoint that forwards each request to
//! a prioritized list of upstream providers, falling back to the next provider
//! whenever one times out, errors, or answers with a JSON-RPC error.

use clap::Parser;
use proxy_config::Config;
use proxy_dispatch::{implementations::http::create_transport, DispatchSettings, FallbackDispatcher};
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

/// Command-line arguments for the proxy service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file. Without one, configuration is read from
	/// BASE_RPC_PRIVATE_URL_1, BASE_RPC_PRIVATE_URL_2 and BASE_RPC_PUBLIC_URL.
	#[arg(short, long, env = "RPC_PROXY_CONFIG")]
	config: Option<PathBuf>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started RPC proxy");

	let config = load_config(args.config.as_deref()).await?;
	let dispatcher = Arc::new(build_dispatcher(&config)?);

	if dispatcher.endpoints().is_empty() {
		tracing::warn!("No RPC providers configured; every request will fail until one is set");
	} else {
		let names: Vec<&str> = dispatcher
			.endpoints()
			.iter()
			.map(|e| e.name.as_str())
			.collect();
		tracing::info!(
			"Provider order: {} (attempt timeout {}ms)",
			names.join(" -> "),
			config.dispatch.attempt_timeout_ms
		);
	}

	server::start_server(config.api.clone(), dispatcher).await?;

	tracing::info!("Stopped RPC proxy");
	Ok(())
}

/// Loads configuration from `path`, or from the environment when absent.
async fn load_config(path: Option<&std::path::Path>) -> Result<Config, Box<dyn std::error::Error>> {
	let config = match path {
		Some(path) => {
			let path = path
				.to_str()
				.ok_or_else(|| format!("Config path is not valid UTF-8: {}", path.display()))?;
			let config = Config::from_file(path).await?;
			tracing::info!("Loaded configuration from {}", path);
			config
		},
		None => {
			let config = Config::from_env()?;
			tracing::info!("Loaded configuration from environment");
			config
		},
	};
	Ok(config)
}

/// Builds the dispatcher from configuration.
///
/// Endpoints come from the config as an explicit list; the dispatcher itself
/// never reads the environment.
fn build_dispatcher(config: &Config) -> Result<FallbackDispatcher, Box<dyn std::error::Error>> {
	let transport = create_transport()?;
	let settings = DispatchSettings {
		attempt_timeout: config.dispatch.attempt_timeout(),
	};
	Ok(FallbackDispatcher::new(
		config.providers.endpoints(),
		transport,
		settings,
	))
}
