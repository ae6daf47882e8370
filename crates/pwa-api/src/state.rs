//! Application state

use pwa_core::{CachePolicyController, Registration};
use pwa_proxy::Fetcher;
use pwa_storage::BucketStore;
use std::sync::Arc;

/// Prometheus render handle served on `/metrics`
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registration: Arc<Registration>,
    pub controller: Arc<CachePolicyController>,
    pub store: Arc<dyn BucketStore>,
    pub fetcher: Arc<dyn Fetcher>,
}

impl AppState {
    pub fn new(
        registration: Arc<Registration>,
        controller: Arc<CachePolicyController>,
        store: Arc<dyn BucketStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            registration,
            controller,
            store,
            fetcher,
        }
    }
}
