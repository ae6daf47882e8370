//! Controller registration and phase ordering

use parking_lot::RwLock;
use pwa_proxy::InterceptedRequest;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::clients::{ClientId, ClientRegistry};
use super::handler::{
    ActivateContext, ActivateReport, FetchContext, InstallContext, InstallReport,
    InterceptOutcome, LifecycleHandler, SignalContext, SignalOutcome,
};
use crate::error::CoreError;

/// What happened to a controller passed to [`Registration::update`]
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum UpdateOutcome {
    /// Installed and activated
    Activated {
        install: InstallReport,
        activate: ActivateReport,
    },
    /// Installed, waiting for the active controller's clients to close
    Waiting { install: InstallReport },
}

/// Snapshot of the registration
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationStatus {
    pub active_version: Option<String>,
    pub waiting_version: Option<String>,
    pub clients: usize,
}

/// Hosts controllers the way a browser hosts service worker versions
///
/// Phase transitions are serialized: an install always finishes before the
/// matching activate starts, and two updates never interleave.
pub struct Registration {
    clients: Arc<ClientRegistry>,
    active: RwLock<Option<Arc<dyn LifecycleHandler>>>,
    waiting: RwLock<Option<Arc<dyn LifecycleHandler>>>,
    transition: Mutex<()>,
}

impl Default for Registration {
    fn default() -> Self {
        Self::new()
    }
}

impl Registration {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(ClientRegistry::new()),
            active: RwLock::new(None),
            waiting: RwLock::new(None),
            transition: Mutex::new(()),
        }
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn active(&self) -> Option<Arc<dyn LifecycleHandler>> {
        self.active.read().clone()
    }

    pub fn status(&self) -> RegistrationStatus {
        RegistrationStatus {
            active_version: self.active.read().as_ref().map(|h| h.version().to_string()),
            waiting_version: self.waiting.read().as_ref().map(|h| h.version().to_string()),
            clients: self.clients.len(),
        }
    }

    /// Install a controller, then activate it unless it has to wait
    pub async fn update(&self, handler: Arc<dyn LifecycleHandler>) -> Result<UpdateOutcome, CoreError> {
        let _guard = self.transition.lock().await;
        info!("Installing controller {}", handler.version());

        let ctx = InstallContext::new();
        let install = handler.on_install(&ctx).await?;

        let blocked_by = self
            .active()
            .map(|active| self.clients.controlled_by(active.version()))
            .unwrap_or(0);

        if ctx.skip_waiting_requested() || blocked_by == 0 {
            let activate = self.activate(handler).await?;
            return Ok(UpdateOutcome::Activated { install, activate });
        }

        info!(
            "Controller {} installed, waiting on {} client(s)",
            handler.version(),
            blocked_by
        );
        *self.waiting.write() = Some(handler);
        Ok(UpdateOutcome::Waiting { install })
    }

    async fn activate(&self, handler: Arc<dyn LifecycleHandler>) -> Result<ActivateReport, CoreError> {
        info!("Activating controller {}", handler.version());

        let ctx = ActivateContext::new(self.clients.clone());
        let report = handler.on_activate(&ctx).await?;

        {
            let mut waiting = self.waiting.write();
            if waiting.as_ref().is_some_and(|w| w.version() == handler.version()) {
                *waiting = None;
            }
        }
        *self.active.write() = Some(handler);
        Ok(report)
    }

    /// Open a client context under the active controller
    pub fn register_client(&self) -> ClientId {
        let active = self.active();
        self.clients.register(active.as_ref().map(|h| h.version()))
    }

    /// Close a client context; promotes a waiting controller once the
    /// active one no longer governs any client
    pub async fn release_client(&self, id: &ClientId) -> Result<Option<ActivateReport>, CoreError> {
        if !self.clients.release(id) {
            return Ok(None);
        }

        let _guard = self.transition.lock().await;
        let waiting = self.waiting.read().clone();
        let Some(waiting) = waiting else {
            return Ok(None);
        };

        let still_controlled = self
            .active()
            .map(|active| self.clients.controlled_by(active.version()))
            .unwrap_or(0);
        if still_controlled > 0 {
            debug!("{} client(s) still hold the active controller", still_controlled);
            return Ok(None);
        }

        self.activate(waiting).await.map(Some)
    }

    /// Route an intercepted request to the active controller
    pub async fn dispatch_fetch(&self, request: InterceptedRequest) -> Result<InterceptOutcome, CoreError> {
        match self.active() {
            Some(handler) => handler.on_intercept(&FetchContext::new(request)).await,
            None => Ok(InterceptOutcome::Passthrough),
        }
    }

    /// Route a background signal to the active controller
    pub async fn dispatch_signal(&self, tag: &str) -> Result<SignalOutcome, CoreError> {
        match self.active() {
            Some(handler) => handler.on_background_signal(&SignalContext::new(tag)).await,
            None => Ok(SignalOutcome::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records phase calls; optionally asks to skip waiting
    struct Probe {
        version: String,
        skip_waiting: bool,
        installs: AtomicUsize,
        activations: AtomicUsize,
    }

    impl Probe {
        fn new(version: &str, skip_waiting: bool) -> Arc<Self> {
            Arc::new(Self {
                version: version.to_string(),
                skip_waiting,
                installs: AtomicUsize::new(0),
                activations: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LifecycleHandler for Probe {
        fn version(&self) -> &str {
            &self.version
        }

        async fn on_install(&self, ctx: &InstallContext) -> Result<InstallReport, CoreError> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            if self.skip_waiting {
                ctx.skip_waiting();
            }
            Ok(InstallReport::default())
        }

        async fn on_activate(&self, ctx: &ActivateContext) -> Result<ActivateReport, CoreError> {
            assert_eq!(self.installs.load(Ordering::SeqCst), 1);
            self.activations.fetch_add(1, Ordering::SeqCst);
            Ok(ActivateReport {
                claimed: ctx.clients().claim(&self.version),
                ..ActivateReport::default()
            })
        }

        async fn on_intercept(&self, _ctx: &FetchContext) -> Result<InterceptOutcome, CoreError> {
            Ok(InterceptOutcome::NetworkError)
        }

        async fn on_background_signal(&self, _ctx: &SignalContext) -> Result<SignalOutcome, CoreError> {
            Ok(SignalOutcome::Handled)
        }
    }

    fn request() -> InterceptedRequest {
        InterceptedRequest::get(
            url::Url::parse("https://app.local/").unwrap(),
            pwa_proxy::RequestMode::Navigate,
        )
    }

    #[tokio::test]
    async fn test_first_controller_activates_immediately() {
        let registration = Registration::new();
        assert_eq!(
            registration.dispatch_fetch(request()).await.unwrap(),
            InterceptOutcome::Passthrough
        );

        let probe = Probe::new("v1", false);
        let outcome = registration.update(probe.clone()).await.unwrap();

        assert!(matches!(outcome, UpdateOutcome::Activated { .. }));
        assert_eq!(probe.activations.load(Ordering::SeqCst), 1);
        assert_eq!(registration.status().active_version.as_deref(), Some("v1"));
        assert_eq!(
            registration.dispatch_fetch(request()).await.unwrap(),
            InterceptOutcome::NetworkError
        );
    }

    #[tokio::test]
    async fn test_new_version_waits_for_clients() {
        let registration = Registration::new();
        registration.update(Probe::new("v1", false)).await.unwrap();
        let client = registration.register_client();

        let v2 = Probe::new("v2", false);
        let outcome = registration.update(v2.clone()).await.unwrap();
        assert!(matches!(outcome, UpdateOutcome::Waiting { .. }));
        assert_eq!(registration.status().waiting_version.as_deref(), Some("v2"));
        assert_eq!(v2.activations.load(Ordering::SeqCst), 0);

        let promoted = registration.release_client(&client).await.unwrap();
        assert!(promoted.is_some());
        let status = registration.status();
        assert_eq!(status.active_version.as_deref(), Some("v2"));
        assert!(status.waiting_version.is_none());
    }

    #[tokio::test]
    async fn test_skip_waiting_claims_open_clients() {
        let registration = Registration::new();
        registration.update(Probe::new("v1", false)).await.unwrap();
        registration.register_client();
        registration.register_client();

        let outcome = registration.update(Probe::new("v2", true)).await.unwrap();
        match outcome {
            UpdateOutcome::Activated { activate, .. } => assert_eq!(activate.claimed, 2),
            other => panic!("expected activation, got {:?}", other),
        }
        assert_eq!(registration.clients().controlled_by("v2"), 2);
    }

    #[tokio::test]
    async fn test_signal_without_active_is_ignored() {
        let registration = Registration::new();
        assert_eq!(
            registration.dispatch_signal("sync-produtores").await.unwrap(),
            SignalOutcome::Ignored
        );
    }
}
