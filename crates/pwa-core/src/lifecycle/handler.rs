//! Lifecycle handler trait and event contexts

use async_trait::async_trait;
use pwa_proxy::{FetchedResponse, InterceptedRequest};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::clients::ClientRegistry;
use crate::cache::ResponseSource;
use crate::error::CoreError;

/// Context handed to the install phase
#[derive(Debug, Default)]
pub struct InstallContext {
    skip_waiting: AtomicBool,
}

impl InstallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask to become active without waiting for old clients to close
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }
}

/// Context handed to the activate phase
pub struct ActivateContext {
    clients: Arc<ClientRegistry>,
}

impl ActivateContext {
    pub fn new(clients: Arc<ClientRegistry>) -> Self {
        Self { clients }
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }
}

/// Context handed to request interception
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub request: InterceptedRequest,
}

impl FetchContext {
    pub fn new(request: InterceptedRequest) -> Self {
        Self { request }
    }
}

/// Context handed to a background signal
#[derive(Debug, Clone)]
pub struct SignalContext {
    pub tag: String,
}

impl SignalContext {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

/// Result of the install phase
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub bucket: String,
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of the activate phase
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivateReport {
    pub bucket: String,
    pub deleted: Vec<String>,
    pub claimed: usize,
}

/// What to do with an intercepted request
#[derive(Debug, Clone, PartialEq)]
pub enum InterceptOutcome {
    /// Answer with this response
    Respond {
        response: FetchedResponse,
        source: ResponseSource,
    },
    /// Answer with a generic network error
    NetworkError,
    /// Not intercepted; default network handling applies
    Passthrough,
}

/// Result of a background signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalOutcome {
    Handled,
    Ignored,
}

/// One method per lifecycle phase
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    /// Version identifying this handler
    fn version(&self) -> &str;

    async fn on_install(&self, ctx: &InstallContext) -> Result<InstallReport, CoreError>;

    async fn on_activate(&self, ctx: &ActivateContext) -> Result<ActivateReport, CoreError>;

    async fn on_intercept(&self, ctx: &FetchContext) -> Result<InterceptOutcome, CoreError>;

    async fn on_background_signal(&self, ctx: &SignalContext) -> Result<SignalOutcome, CoreError>;
}
