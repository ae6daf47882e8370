//! PWA Cache Core Business Logic
//!
//! This crate provides the cache policy controller of the offline agent,
//! the lifecycle dispatcher it implements, and the registration runtime
//! that orders install, activate and fetch events.

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;

pub use cache::{is_cacheable, CachePolicyController, ControllerStats, RequestClass, ResponseSource};
pub use config::{ControllerConfig, DEFAULT_MANIFEST, SHELL_DOCUMENT};
pub use error::CoreError;
pub use lifecycle::{
    ActivateContext, ActivateReport, ClientId, ClientInfo, ClientRegistry, FetchContext,
    InstallContext, InstallReport, InterceptOutcome, LifecycleHandler, Registration,
    RegistrationStatus, SignalContext, SignalOutcome, UpdateOutcome,
};
