//! Prometheus metrics endpoint and agent counters

use axum::{Router, extract::State, response::IntoResponse, routing::get};
use pwa_core::{InstallReport, InterceptOutcome, RequestClass, ResponseSource};
use std::sync::Arc;

use crate::state::MetricsHandle;

/// Create metrics routes with the Prometheus handle
pub fn routes(handle: Arc<MetricsHandle>) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .with_state(handle)
}

/// GET /metrics - Prometheus metrics endpoint
async fn get_metrics(State(handle): State<Arc<MetricsHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Count an interception outcome
pub fn record_outcome(class: RequestClass, outcome: &InterceptOutcome) {
    ::metrics::counter!("pwa_cache_requests_total", "class" => class.as_str()).increment(1);

    match outcome {
        InterceptOutcome::Respond { source, .. } => match (class, source) {
            (_, ResponseSource::Cache) => {
                ::metrics::counter!("pwa_cache_hits_total").increment(1);
            }
            (_, ResponseSource::Fallback) => {
                ::metrics::counter!("pwa_cache_navigation_fallbacks_total").increment(1);
            }
            (RequestClass::SameOrigin, ResponseSource::Network) => {
                ::metrics::counter!("pwa_cache_misses_total").increment(1);
            }
            _ => {}
        },
        InterceptOutcome::NetworkError => {
            ::metrics::counter!("pwa_cache_network_errors_total").increment(1);
        }
        InterceptOutcome::Passthrough => {}
    }
}

/// Count the precache outcome of an install
pub fn record_install(report: &InstallReport) {
    ::metrics::counter!("pwa_cache_precached_total").increment(report.cached.len() as u64);
    ::metrics::counter!("pwa_cache_precache_failures_total").increment(report.failed.len() as u64);
}
