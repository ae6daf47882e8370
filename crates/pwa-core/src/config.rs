//! Controller configuration
//!
//! The version string, deployment base path and precache manifest are
//! handed to the controller at construction instead of living in globals,
//! so every policy decision can be exercised against injected fixtures.

use pwa_storage::MatchOptions;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;

/// Assets precached by default, relative to the deployment scope
pub const DEFAULT_MANIFEST: &[&str] = &[
    "./",
    "index.html",
    "manifest.webmanifest",
    "static/icon.png",
    "static/css/bootstrap.min.css",
    "static/css/bootstrap-icons.css",
    "static/js/bootstrap.bundle.min.js",
    "static/js/alpine.min.js",
    "static/js/jszip.min.js",
    "static/fonts/bootstrap-icons.woff2",
    "static/fonts/bootstrap-icons.woff",
];

/// Document served to navigations when the network is down
pub const SHELL_DOCUMENT: &str = "index.html";

/// Immutable configuration of a cache policy controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Version tag embedded in the bucket name
    pub version: String,
    /// Deployment path prefix, empty for the origin root (e.g. "/cadastro")
    #[serde(default)]
    pub base_path: String,
    /// Precache manifest, relative to the deployment scope
    pub manifest_paths: Vec<String>,
    /// Origin the controller answers for
    pub origin: Url,
    /// Bucket name prefix; the bucket is `<prefix>-<version>`
    pub cache_prefix: String,
    /// Background signal tags that are recognized
    #[serde(default)]
    pub sync_tags: Vec<String>,
    /// Key normalization used for same-origin asset lookups
    #[serde(default = "default_asset_match")]
    pub asset_match: MatchOptions,
}

fn default_asset_match() -> MatchOptions {
    MatchOptions::ignoring_search()
}

impl ControllerConfig {
    /// Check the configuration before any bucket is touched
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.version.trim().is_empty() {
            return Err(CoreError::InvalidConfig("version must not be empty".to_string()));
        }

        if self.cache_prefix.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "cache prefix must not be empty".to_string(),
            ));
        }

        if !matches!(self.origin.scheme(), "http" | "https") || !self.origin.has_host() {
            return Err(CoreError::InvalidConfig(format!(
                "origin must be an absolute http(s) URL: {}",
                self.origin
            )));
        }

        if !self.base_path.is_empty() && !self.base_path.starts_with('/') {
            return Err(CoreError::InvalidConfig(format!(
                "base path must start with '/': {}",
                self.base_path
            )));
        }

        self.manifest_urls()?;
        Ok(())
    }

    /// Name of the bucket owned by this version
    pub fn bucket_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    /// Registered scope: origin plus base path, with a trailing slash
    pub fn scope(&self) -> Result<Url, CoreError> {
        let base = self.base_path.trim_end_matches('/');
        self.origin
            .join(&format!("{}/", base))
            .map_err(|e| CoreError::InvalidConfig(format!("invalid base path {}: {}", self.base_path, e)))
    }

    /// Resolve a path against the scope
    pub fn resolve(&self, path: &str) -> Result<Url, CoreError> {
        self.scope()?
            .join(path)
            .map_err(|e| CoreError::InvalidConfig(format!("invalid path {}: {}", path, e)))
    }

    /// Absolute URLs of the precache manifest, in order
    pub fn manifest_urls(&self) -> Result<Vec<Url>, CoreError> {
        self.manifest_paths.iter().map(|p| self.resolve(p)).collect()
    }

    /// Absolute URL of the offline shell document
    pub fn shell_url(&self) -> Result<Url, CoreError> {
        self.resolve(SHELL_DOCUMENT)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            version: "v1.0.1".to_string(),
            base_path: String::new(),
            manifest_paths: DEFAULT_MANIFEST.iter().map(|p| p.to_string()).collect(),
            origin: Url::parse("http://localhost:5000").expect("static origin is valid"),
            cache_prefix: "cadastro-produtor-rural".to_string(),
            sync_tags: vec!["sync-produtores".to_string()],
            asset_match: default_asset_match(),
        }
    }
}
