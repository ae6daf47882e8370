//! Scripted network for tests

use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::ProxyError;
use crate::fetcher::Fetcher;
use crate::request::{FetchedResponse, InterceptedRequest};

/// In-memory fetcher serving canned responses by exact URL
///
/// Can be switched offline to simulate a lost connection. Unknown URLs
/// answer 404. Counts every call that reached the "network".
#[derive(Default)]
pub struct ScriptedFetcher {
    routes: RwLock<HashMap<String, FetchedResponse>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the response for a URL
    pub fn route(&self, url: &str, response: FetchedResponse) {
        self.routes.write().insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetches attempted so far, online or not
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<FetchedResponse, ProxyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(ProxyError::Offline(request.url.to_string()));
        }

        Ok(self
            .routes
            .read()
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| FetchedResponse::new(StatusCode::NOT_FOUND, HeaderMap::new(), "")))
    }
}
