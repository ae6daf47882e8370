//! Cache policy controller implementation

use async_trait::async_trait;
use futures::future::join_all;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use parking_lot::RwLock;
use pwa_proxy::{FetchedResponse, Fetcher, InterceptedRequest, RequestMode};
use pwa_storage::{BucketStore, CachedResponse, MatchOptions, RequestKey};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::{Origin, Url};

use super::policy::{is_cacheable, RequestClass, ResponseSource};
use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::lifecycle::{
    ActivateContext, ActivateReport, FetchContext, InstallContext, InstallReport,
    InterceptOutcome, LifecycleHandler, SignalContext, SignalOutcome,
};

/// Counters kept by a controller
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControllerStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub navigation_fallbacks: u64,
    pub network_errors: u64,
    pub cache_writes: u64,
}

/// Cache policy controller
///
/// Owns one versioned bucket. Navigations go network first with the
/// offline shell as fallback, same-origin resources go cache first with
/// write-through, everything else is left alone.
pub struct CachePolicyController {
    config: ControllerConfig,
    bucket: String,
    origin: Origin,
    assets: Vec<Url>,
    shell: Url,
    store: Arc<dyn BucketStore>,
    fetcher: Arc<dyn Fetcher>,
    stats: RwLock<ControllerStats>,
}

impl CachePolicyController {
    /// Create a new controller
    pub fn new(
        config: ControllerConfig,
        store: Arc<dyn BucketStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let bucket = config.bucket_name();
        let assets = config.manifest_urls()?;
        let shell = config.shell_url()?;

        info!(
            "Initializing cache policy controller (bucket: {}, assets: {}, shell: {})",
            bucket,
            assets.len(),
            shell
        );

        Ok(Self {
            origin: config.origin.origin(),
            config,
            bucket,
            assets,
            shell,
            store,
            fetcher,
            stats: RwLock::new(ControllerStats::default()),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    pub fn assets(&self) -> &[Url] {
        &self.assets
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats.read().clone()
    }

    pub fn classify(&self, request: &InterceptedRequest) -> RequestClass {
        RequestClass::of(request, &self.origin)
    }

    /// Fetch and store every manifest asset. One failing asset is logged
    /// and does not stop the others.
    pub async fn precache(&self) -> Result<InstallReport, CoreError> {
        self.store.open(&self.bucket).await?;

        let results = join_all(self.assets.iter().map(|url| self.precache_one(url))).await;

        let mut report = InstallReport {
            bucket: self.bucket.clone(),
            ..InstallReport::default()
        };
        for (url, result) in self.assets.iter().zip(results) {
            match result {
                Ok(()) => report.cached.push(url.to_string()),
                Err(reason) => {
                    error!("Precache failed for {}: {}", url, reason);
                    report.failed.push(url.to_string());
                }
            }
        }

        if report.is_complete() {
            info!("Precache ok ({} assets in {})", report.cached.len(), self.bucket);
        } else {
            warn!(
                "Precache incomplete: {} cached, {} failed",
                report.cached.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }

    async fn precache_one(&self, url: &Url) -> Result<(), String> {
        let request = InterceptedRequest::get(url.clone(), RequestMode::NoCors);
        let response = self.fetcher.fetch(&request).await.map_err(|e| e.to_string())?;

        // A manifest asset must load successfully to count as precached
        if !response.status.is_success() {
            return Err(format!("unexpected status {}", response.status));
        }

        self.store
            .put(&self.bucket, RequestKey::get(url.clone()), to_cached(&response))
            .await
            .map_err(|e| e.to_string())
    }

    /// Delete every bucket other than ours
    pub async fn purge_stale(&self) -> Result<Vec<String>, CoreError> {
        let mut deleted = Vec::new();

        for name in self.store.keys().await? {
            if name != self.bucket && self.store.delete(&name).await? {
                info!("Deleted stale bucket {}", name);
                deleted.push(name);
            }
        }

        Ok(deleted)
    }

    /// Network first; the precached shell when the network is unreachable
    async fn navigate(&self, request: &InterceptedRequest) -> Result<InterceptOutcome, CoreError> {
        let error = match self.fetcher.fetch(request).await {
            Ok(response) => {
                return Ok(InterceptOutcome::Respond {
                    response,
                    source: ResponseSource::Network,
                });
            }
            Err(e) => e,
        };

        warn!("Navigation to {} failed ({}), serving offline shell", request.url, error);

        let shell = self
            .store
            .match_request(&self.bucket, &RequestKey::get(self.shell.clone()), MatchOptions::default())
            .await?;

        match shell {
            Some(cached) => {
                self.stats.write().navigation_fallbacks += 1;
                Ok(InterceptOutcome::Respond {
                    response: to_fetched(cached),
                    source: ResponseSource::Fallback,
                })
            }
            None => {
                warn!("Offline shell {} is not cached", self.shell);
                self.stats.write().network_errors += 1;
                Ok(InterceptOutcome::NetworkError)
            }
        }
    }

    /// Cache first, populating the bucket from the network on a miss
    async fn cache_first(&self, request: &InterceptedRequest) -> Result<InterceptOutcome, CoreError> {
        let key = RequestKey::new(request.method.as_str(), request.url.clone());

        if let Some(cached) = self
            .store
            .match_request(&self.bucket, &key, self.config.asset_match)
            .await?
        {
            debug!("Cache hit for {}", request.url);
            self.stats.write().cache_hits += 1;
            return Ok(InterceptOutcome::Respond {
                response: to_fetched(cached),
                source: ResponseSource::Cache,
            });
        }

        debug!("Cache miss for {}, fetching", request.url);
        self.stats.write().cache_misses += 1;

        let response = match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Fetch failed for {}: {}", request.url, e);
                self.stats.write().network_errors += 1;
                return Ok(InterceptOutcome::NetworkError);
            }
        };

        if key.is_get() && is_cacheable(response.status) {
            self.write_through(key, &response).await;
        }

        Ok(InterceptOutcome::Respond {
            response,
            source: ResponseSource::Network,
        })
    }

    /// Store a copy of a fresh response; failures are logged only
    async fn write_through(&self, key: RequestKey, response: &FetchedResponse) {
        let result = match self.store.open(&self.bucket).await {
            Ok(()) => self.store.put(&self.bucket, key.clone(), to_cached(response)).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                debug!("Cached {}", key);
                self.stats.write().cache_writes += 1;
            }
            Err(e) => warn!("Failed to cache {}: {}", key, e),
        }
    }
}

#[async_trait]
impl LifecycleHandler for CachePolicyController {
    fn version(&self) -> &str {
        &self.config.version
    }

    async fn on_install(&self, ctx: &InstallContext) -> Result<InstallReport, CoreError> {
        let report = self.precache().await?;
        ctx.skip_waiting();
        Ok(report)
    }

    async fn on_activate(&self, ctx: &ActivateContext) -> Result<ActivateReport, CoreError> {
        let deleted = self.purge_stale().await?;
        let claimed = ctx.clients().claim(&self.config.version);

        info!(
            "Activated {} ({} stale bucket(s) deleted, {} client(s) claimed)",
            self.bucket,
            deleted.len(),
            claimed
        );

        Ok(ActivateReport {
            bucket: self.bucket.clone(),
            deleted,
            claimed,
        })
    }

    async fn on_intercept(&self, ctx: &FetchContext) -> Result<InterceptOutcome, CoreError> {
        let request = &ctx.request;
        match self.classify(request) {
            RequestClass::Navigation => self.navigate(request).await,
            RequestClass::SameOrigin => self.cache_first(request).await,
            RequestClass::Foreign => Ok(InterceptOutcome::Passthrough),
        }
    }

    async fn on_background_signal(&self, ctx: &SignalContext) -> Result<SignalOutcome, CoreError> {
        if self.config.sync_tags.iter().any(|t| *t == ctx.tag) {
            info!("Background sync attempt ({})", ctx.tag);
            Ok(SignalOutcome::Handled)
        } else {
            debug!("Ignoring background signal {}", ctx.tag);
            Ok(SignalOutcome::Ignored)
        }
    }
}

fn to_cached(response: &FetchedResponse) -> CachedResponse {
    let headers = response
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    CachedResponse::new(response.status.as_u16(), headers, response.body.clone())
}

fn to_fetched(cached: CachedResponse) -> FetchedResponse {
    let mut headers = HeaderMap::new();
    for (name, value) in &cached.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => debug!("Dropping unparsable cached header {}", name),
        }
    }

    let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK);
    FetchedResponse::new(status, headers, cached.body)
}
