//! Configuration loader for split configuration files.
//!
//! A deployment usually keeps provider URLs (which carry API keys) in a file
//! separate from the server settings. The loader follows `include` directives
//! and rejects any top-level section defined in more than one file.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration loader that handles multi-file configurations with includes.
pub struct ConfigLoader {
	/// Base path for resolving relative includes
	base_path: PathBuf,
	/// Files already loaded, to detect circular includes
	loaded_files: HashSet<PathBuf>,
	/// Which file each top-level section came from, for error reporting
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	/// Creates a new ConfigLoader with the given base path.
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file and all its includes.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;

		let main_content = self.load_file(&config_path).await?;
		let mut main_toml: toml::Table = toml::from_str(&main_content)?;

		let includes = Self::extract_includes(&mut main_toml)?;

		for (key, _) in main_toml.iter() {
			self.section_sources.insert(key.clone(), config_path.clone());
		}

		for include_path in includes {
			let resolved_path = self.resolve_path(&include_path)?;
			let include_content = self.load_file(&resolved_path).await?;
			let include_toml: toml::Table = toml::from_str(&include_content)?;

			for (key, value) in include_toml {
				if let Some(existing_source) = self.section_sources.get(&key) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						key,
						existing_source.display(),
						resolved_path.display()
					)));
				}
				self.section_sources
					.insert(key.clone(), resolved_path.clone());
				main_toml.insert(key, value);
			}
		}

		let config: Config = toml::Value::Table(main_toml).try_into()?;
		config.validate()?;
		Ok(config)
	}

	/// Reads a file and resolves environment variables.
	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical_path = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	/// Removes and returns the `include` directive, if any.
	fn extract_includes(toml: &mut toml::Table) -> Result<Vec<PathBuf>, ConfigError> {
		let Some(include_value) = toml.remove("include") else {
			return Ok(Vec::new());
		};

		match include_value {
			toml::Value::String(path_str) => Ok(vec![PathBuf::from(path_str)]),
			toml::Value::Array(items) => items
				.into_iter()
				.map(|item| match item {
					toml::Value::String(path_str) => Ok(PathBuf::from(path_str)),
					_ => Err(ConfigError::Validation(
						"Include array must contain only strings".into(),
					)),
				})
				.collect(),
			_ => Err(ConfigError::Validation(
				"Include must be a string or array of strings".into(),
			)),
		}
	}

	/// Resolves a path relative to the base path.
	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();

		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");

		let config_content = r#"
[providers.private_1]
name = "Alchemy"
url = "https://base-mainnet.g.alchemy.com/v2/key"

[providers.public]
url = "https://mainnet.base.org"

[api]
port = 8080
"#;

		fs::write(&config_path, config_content).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.providers.endpoints().len(), 2);
		assert_eq!(config.api.port, 8080);
		assert_eq!(config.dispatch.attempt_timeout_ms, 5000);
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = ["providers.toml"]

[api]
host = "0.0.0.0"
port = 9000
"#;

		let providers_config = r#"
[providers.private_2]
name = "QuickNode"
url = "https://base.quiknode.example/key"

[providers.public]
url = "https://mainnet.base.org"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("providers.toml"), providers_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		let names: Vec<_> = config
			.providers
			.endpoints()
			.into_iter()
			.map(|e| e.name)
			.collect();
		assert_eq!(names, vec!["QuickNode", "Public RPC"]);
		assert_eq!(config.api.host, "0.0.0.0");
	}

	#[tokio::test]
	async fn test_include_resolves_env_vars() {
		let temp_dir = TempDir::new().unwrap();
		std::env::set_var("PROXY_LOADER_TEST_URL", "https://rpc.loader.example/k");

		fs::write(
			temp_dir.path().join("main.toml"),
			"include = \"providers.toml\"\n",
		)
		.unwrap();
		fs::write(
			temp_dir.path().join("providers.toml"),
			"[providers.public]\nurl = \"${PROXY_LOADER_TEST_URL}\"\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();
		let endpoints = config.providers.endpoints();
		assert_eq!(endpoints[0].url.expose_secret(), "https://rpc.loader.example/k");

		std::env::remove_var("PROXY_LOADER_TEST_URL");
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = ["duplicate.toml"]

[dispatch]
attempt_timeout_ms = 1000
"#;

		let duplicate_config = r#"
[dispatch]
attempt_timeout_ms = 2000
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("duplicate.toml"), duplicate_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("main.toml").await;

		assert!(result.is_err());
		let error_msg = result.unwrap_err().to_string();
		assert!(error_msg.contains("Duplicate section 'dispatch'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();

		let config = r#"
include = ["self.toml"]

[api]
port = 3001
"#;

		fs::write(temp_dir.path().join("self.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("self.toml").await;

		assert!(result.is_err());
		let error_msg = result.unwrap_err().to_string();
		assert!(error_msg.contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(temp_dir.path().join("main.toml"), "include = [\"nope.toml\"]\n").unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(matches!(err, ConfigError::Io(_)));
	}
}
