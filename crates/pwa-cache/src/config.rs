//! Configuration loading and management

use anyhow::{Context, Result};
use pwa_core::{ControllerConfig, DEFAULT_MANIFEST};
use pwa_storage::MatchOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Server hosting the application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub url: String,
    #[serde(default)]
    pub skip_tls_verify: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            skip_tls_verify: false,
        }
    }
}

/// Cache policy of the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Public origin of the application, as its pages see it
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Bumping this purges every other bucket on the next activation
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub base_path: String,
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,
    #[serde(default = "default_sync_tags")]
    pub sync_tags: Vec<String>,
    /// Ignore query strings when matching same-origin assets
    #[serde(default = "default_ignore_search")]
    pub ignore_search: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            version: default_version(),
            base_path: String::new(),
            cache_prefix: default_cache_prefix(),
            manifest: default_manifest(),
            sync_tags: default_sync_tags(),
            ignore_search: default_ignore_search(),
        }
    }
}

impl AgentConfig {
    /// Build the controller configuration, validating it
    pub fn controller_config(&self) -> Result<ControllerConfig> {
        let origin = Url::parse(&self.origin)
            .with_context(|| format!("Invalid agent origin: {}", self.origin))?;

        let config = ControllerConfig {
            version: self.version.clone(),
            base_path: self.base_path.clone(),
            manifest_paths: self.manifest.clone(),
            origin,
            cache_prefix: self.cache_prefix.clone(),
            sync_tags: self.sync_tags.clone(),
            asset_match: MatchOptions {
                ignore_search: self.ignore_search,
                ignore_method: false,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "local" or "memory"
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub local: LocalStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local: LocalStorageConfig::default(),
        }
    }
}

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_local_path")]
    pub path: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            path: default_local_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5080
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_origin() -> String {
    "http://localhost:5080".to_string()
}

fn default_version() -> String {
    "v1.0.1".to_string()
}

fn default_cache_prefix() -> String {
    "cadastro-produtor-rural".to_string()
}

fn default_manifest() -> Vec<String> {
    DEFAULT_MANIFEST.iter().map(|p| p.to_string()).collect()
}

fn default_sync_tags() -> Vec<String> {
    vec!["sync-produtores".to_string()]
}

fn default_ignore_search() -> bool {
    true
}

fn default_backend() -> String {
    "local".to_string()
}

fn default_local_path() -> String {
    "./data/buckets".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        // Check if config file exists
        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config file: {}", path))
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;

        match config.storage.backend.as_str() {
            "local" | "memory" => {}
            other => anyhow::bail!("Unknown storage backend '{}'", other),
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            agent: AgentConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 5080);
        assert_eq!(config.agent.version, "v1.0.1");
        assert_eq!(config.agent.manifest.len(), DEFAULT_MANIFEST.len());
        assert_eq!(config.storage.backend, "local");
    }

    #[test]
    fn test_agent_section() {
        let config = Config::parse(
            r#"
            [agent]
            origin = "https://cadastro.example.org"
            version = "v2.0.0"
            base_path = "/cadastro"
            manifest = ["./", "index.html"]
            ignore_search = false
            "#,
        )
        .unwrap();

        let controller = config.agent.controller_config().unwrap();
        assert_eq!(controller.bucket_name(), "cadastro-produtor-rural-v2.0.0");
        assert!(!controller.asset_match.ignore_search);
        assert_eq!(
            controller.shell_url().unwrap().as_str(),
            "https://cadastro.example.org/cadastro/index.html"
        );
    }

    #[test]
    fn test_invalid_agent_is_rejected() {
        let mut agent = AgentConfig::default();
        agent.origin = "not a url".to_string();
        assert!(agent.controller_config().is_err());

        let mut agent = AgentConfig::default();
        agent.version = String::new();
        assert!(agent.controller_config().is_err());
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result = Config::parse(
            r#"
            [storage]
            backend = "s3"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.logging.level, "info");
    }
}
