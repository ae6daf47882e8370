//! API routes

mod agent;
mod health;
mod intercept;
pub mod metrics;

use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;

use crate::state::{AppState, MetricsHandle};

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        // Health check
        .merge(health::routes())
        // Agent lifecycle and client endpoints
        .merge(agent::routes())
        // Everything else is intercepted - must be last
        .fallback(intercept::intercept)
        .with_state(state)
        // Form posts and exports from the application pass through
        .layer(DefaultBodyLimit::max(64 * 1024 * 1024));

    // Add metrics endpoint if handle is provided
    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::Request;
    use pwa_core::{CachePolicyController, ControllerConfig, Registration};
    use pwa_proxy::{FetchedResponse, ScriptedFetcher};
    use pwa_storage::{BucketStore, MemoryStore};
    use std::sync::Arc;
    use url::Url;

    use crate::state::AppState;

    pub const ORIGIN: &str = "https://app.local";

    /// State with an installed and active controller over a scripted network
    pub async fn state() -> (AppState, Arc<ScriptedFetcher>) {
        state_with(Arc::new(MemoryStore::new())).await
    }

    /// Same as [`state`], over the given bucket store
    pub async fn state_with(store: Arc<dyn BucketStore>) -> (AppState, Arc<ScriptedFetcher>) {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.route("https://app.local/", FetchedResponse::ok("<html>root</html>"));
        fetcher.route("https://app.local/index.html", FetchedResponse::ok("<html>shell</html>"));
        fetcher.route("https://app.local/static/icon.png", FetchedResponse::ok("PNG"));

        let config = ControllerConfig {
            origin: Url::parse(ORIGIN).unwrap(),
            manifest_paths: vec![
                "./".to_string(),
                "index.html".to_string(),
                "static/icon.png".to_string(),
            ],
            ..ControllerConfig::default()
        };

        let controller = Arc::new(
            CachePolicyController::new(config, store.clone(), fetcher.clone()).unwrap(),
        );
        let registration = Arc::new(Registration::new());
        registration.update(controller.clone()).await.unwrap();

        (
            AppState::new(registration, controller, store, fetcher.clone()),
            fetcher,
        )
    }

    pub fn get(uri: &str, host: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("host", host)
            .body(Body::empty())
            .unwrap()
    }

    pub async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
