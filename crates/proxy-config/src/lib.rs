//! Configuration module for the RPC fallback proxy.
//!
//! This module provides structures and utilities for managing proxy
//! configuration. It supports loading configuration from TOML files with
//! `${VAR}` / `${VAR:-default}` environment substitution, and building the
//! same configuration purely from environment variables when no file is given.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["providers.toml", "api.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

use proxy_types::{
	ProviderEndpoint, SecretUrl, DEFAULT_ATTEMPT_TIMEOUT_MS, DEFAULT_PRIVATE_1_NAME,
	DEFAULT_PRIVATE_2_NAME, DEFAULT_PUBLIC_NAME, PRIVATE_RPC_URL_1_ENV, PRIVATE_RPC_URL_2_ENV,
	PUBLIC_RPC_URL_ENV,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub use loader::ConfigLoader;

/// Upper bound for the per-attempt timeout.
const MAX_ATTEMPT_TIMEOUT_MS: u64 = 60_000;

/// Optional environment overrides used when no file is supplied.
const ATTEMPT_TIMEOUT_ENV: &str = "RPC_ATTEMPT_TIMEOUT_MS";
const API_HOST_ENV: &str = "RPC_PROXY_HOST";
const API_PORT_ENV: &str = "RPC_PROXY_PORT";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the proxy.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
	/// Upstream provider slots.
	#[serde(default)]
	pub providers: ProvidersConfig,
	/// Fallback dispatch settings.
	#[serde(default)]
	pub dispatch: DispatchConfig,
	/// HTTP server settings.
	#[serde(default)]
	pub api: ApiConfig,
}

/// The three provider slots, in fixed priority order.
///
/// A slot that is absent, or whose URL is empty, is left out of the rotation
/// entirely.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
	pub private_1: Option<ProviderSlot>,
	pub private_2: Option<ProviderSlot>,
	pub public: Option<ProviderSlot>,
}

/// A single provider slot.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSlot {
	/// Display name used in logs and diagnostics.
	pub name: Option<String>,
	/// Endpoint URL; may embed an API key.
	#[serde(default)]
	pub url: SecretUrl,
}

impl ProvidersConfig {
	/// Returns the configured endpoints in priority order, skipping empty slots.
	pub fn endpoints(&self) -> Vec<ProviderEndpoint> {
		self.slots()
			.into_iter()
			.filter_map(|(default_name, slot)| {
				let slot = slot.as_ref()?;
				let name = slot
					.name
					.as_deref()
					.map(str::trim)
					.filter(|n| !n.is_empty())
					.unwrap_or(default_name);
				let endpoint = ProviderEndpoint::new(name, slot.url.clone());
				endpoint.is_configured().then_some(endpoint)
			})
			.collect()
	}

	fn slots(&self) -> [(&'static str, &Option<ProviderSlot>); 3] {
		[
			(DEFAULT_PRIVATE_1_NAME, &self.private_1),
			(DEFAULT_PRIVATE_2_NAME, &self.private_2),
			(DEFAULT_PUBLIC_NAME, &self.public),
		]
	}
}

/// Fallback dispatch settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
	/// Maximum duration of a single provider attempt, in milliseconds.
	#[serde(default = "default_attempt_timeout_ms")]
	pub attempt_timeout_ms: u64,
}

impl DispatchConfig {
	pub fn attempt_timeout(&self) -> Duration {
		Duration::from_millis(self.attempt_timeout_ms)
	}
}

impl Default for DispatchConfig {
	fn default() -> Self {
		Self {
			attempt_timeout_ms: default_attempt_timeout_ms(),
		}
	}
}

fn default_attempt_timeout_ms() -> u64 {
	DEFAULT_ATTEMPT_TIMEOUT_MS
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// Route the JSON-RPC endpoint is mounted on.
	#[serde(default = "default_rpc_path")]
	pub path: String,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			host: default_api_host(),
			port: default_api_port(),
			max_request_size: default_max_request_size(),
			path: default_rpc_path(),
		}
	}
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

fn default_rpc_path() -> String {
	"/api/rpc/base".to_string()
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	resolve_vars(input, |name| std::env::var(name).ok())
}

/// Resolves `${VAR}` references using an arbitrary lookup.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_vars<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match lookup(var_name) {
			Some(v) => v,
			None => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

/// Returns the trimmed value of `var`, or `None` when unset or blank.
fn non_blank<F>(lookup: &F, var: &str) -> Option<String>
where
	F: Fn(&str) -> Option<String>,
{
	lookup(var)
		.map(|value| value.trim().to_string())
		.filter(|value| !value.is_empty())
}

/// Parses `var` when it is set to a non-blank value.
fn parse_var<F, T>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
	F: Fn(&str) -> Option<String>,
	T: FromStr,
	T::Err: Display,
{
	let Some(value) = non_blank(lookup, var) else {
		return Ok(None);
	};
	value.parse().map(Some).map_err(|e| {
		ConfigError::Validation(format!("{} must be a number (got '{}'): {}", var, value, e))
	})
}

impl Config {
	/// Loads configuration from a file, resolving environment variables and
	/// following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Builds configuration from the process environment only.
	///
	/// Reads `BASE_RPC_PRIVATE_URL_1`, `BASE_RPC_PRIVATE_URL_2` and
	/// `BASE_RPC_PUBLIC_URL`, plus the optional `RPC_ATTEMPT_TIMEOUT_MS`,
	/// `RPC_PROXY_HOST` and `RPC_PROXY_PORT`.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Builds environment-only configuration from an arbitrary lookup.
	///
	/// Unset or blank variables fall back to their defaults; an unset provider
	/// variable leaves that slot empty.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let slot = |var: &str| {
			lookup(var).map(|url| ProviderSlot {
				name: None,
				url: SecretUrl::new(url),
			})
		};

		let config = Config {
			providers: ProvidersConfig {
				private_1: slot(PRIVATE_RPC_URL_1_ENV),
				private_2: slot(PRIVATE_RPC_URL_2_ENV),
				public: slot(PUBLIC_RPC_URL_ENV),
			},
			dispatch: DispatchConfig {
				attempt_timeout_ms: parse_var(&lookup, ATTEMPT_TIMEOUT_ENV)?
					.unwrap_or_else(default_attempt_timeout_ms),
			},
			api: ApiConfig {
				host: non_blank(&lookup, API_HOST_ENV).unwrap_or_else(default_api_host),
				port: parse_var(&lookup, API_PORT_ENV)?.unwrap_or_else(default_api_port),
				..ApiConfig::default()
			},
		};

		config.validate()?;
		Ok(config)
	}

	fn parse_resolved(resolved: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(resolved)?;
		config.validate()?;
		Ok(config)
	}

	/// Validates the configuration.
	///
	/// An empty provider set is accepted here; the dispatcher reports it per
	/// request so that a misconfigured deployment still answers with a clear
	/// error instead of failing to boot.
	fn validate(&self) -> Result<(), ConfigError> {
		for (slot, provider) in [
			("private_1", &self.providers.private_1),
			("private_2", &self.providers.private_2),
			("public", &self.providers.public),
		] {
			let Some(provider) = provider else {
				continue;
			};
			if provider.url.is_empty() {
				continue;
			}
			let url = provider.url.parse().map_err(|e| {
				ConfigError::Validation(format!(
					"Provider '{}' url is not a valid URL: {}",
					slot, e
				))
			})?;
			if url.scheme() != "http" && url.scheme() != "https" {
				return Err(ConfigError::Validation(format!(
					"Provider '{}' url must use http:// or https:// (got {})",
					slot,
					url.scheme()
				)));
			}
			if url.host_str().is_none_or(str::is_empty) {
				return Err(ConfigError::Validation(format!(
					"Provider '{}' url has no host",
					slot
				)));
			}
		}

		if self.dispatch.attempt_timeout_ms == 0 {
			return Err(ConfigError::Validation(
				"dispatch.attempt_timeout_ms must be greater than 0".into(),
			));
		}
		if self.dispatch.attempt_timeout_ms > MAX_ATTEMPT_TIMEOUT_MS {
			return Err(ConfigError::Validation(format!(
				"dispatch.attempt_timeout_ms cannot exceed {}",
				MAX_ATTEMPT_TIMEOUT_MS
			)));
		}

		if self.api.max_request_size == 0 {
			return Err(ConfigError::Validation(
				"api.max_request_size must be greater than 0".into(),
			));
		}
		if !self.api.path.starts_with('/') {
			return Err(ConfigError::Validation(format!(
				"api.path must start with '/' (got '{}')",
				self.api.path
			)));
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating the
/// result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		Self::parse_resolved(&resolved)
	}
}
