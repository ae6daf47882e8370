//! Lifecycle dispatching
//!
//! The controller only sees lifecycle events through [`LifecycleHandler`].
//! [`Registration`] drives those events in the order a hosting runtime
//! guarantees: install completes before activate, and fetches reach the
//! active controller only.

mod clients;
mod handler;
mod registration;

pub use clients::{ClientId, ClientInfo, ClientRegistry};
pub use handler::{
    ActivateContext, ActivateReport, FetchContext, InstallContext, InstallReport,
    InterceptOutcome, LifecycleHandler, SignalContext, SignalOutcome,
};
pub use registration::{Registration, RegistrationStatus, UpdateOutcome};
